//! 설정 및 와이어링 통합 테스트.
//!
//! 설정 파일 → 디스크 SQLite → 라우터 구성 검증.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use ilo_core::clock::now_timestamp;
use ilo_core::config::AppConfig;
use ilo_core::config_manager::ConfigManager;
use ilo_core::models::collection::GroupingSettings;
use ilo_core::ports::storage::UrlMetricsStorage;
use ilo_core::slug::url_metrics_slug;
use ilo_storage::sqlite::SqliteStorage;
use ilo_web::nonce::{url_metrics_storage_action, NonceService};
use ilo_web::{build_router, AppState, WebServer};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

#[test]
fn config_defaults_are_valid() {
    let config = AppConfig::default_config();

    assert!(!config.url_metrics.breakpoints.is_empty());
    assert!(config.url_metrics.sample_size > 0);
    assert!(config.url_metrics.freshness_ttl_secs > 0);
    assert!(config.storage.keep_days > 0);
    assert!(config.nonce.lifetime_secs >= 2);

    // 기본값은 그룹 설정 검증을 통과해야 함
    assert!(GroupingSettings::from_config(&config.url_metrics).is_ok());
}

#[test]
fn generated_config_builds_web_server() {
    let temp_dir = TempDir::new().unwrap();
    let manager = ConfigManager::with_path(temp_dir.path().join("config.json")).unwrap();
    let config = manager.get();

    let storage = Arc::new(SqliteStorage::open(&temp_dir.path().join("url-metrics.db"), 30).unwrap());
    let server = WebServer::new(storage, &config).unwrap();
    assert!(server.url().ends_with("/image-loading-optimization/v1"));
}

#[test]
fn invalid_breakpoints_fail_wiring() {
    let mut config = AppConfig::default_config();
    config.nonce.secret = "secret".to_string();
    config.url_metrics.breakpoints = vec![0];

    let storage = Arc::new(SqliteStorage::open_in_memory(30).unwrap());
    assert!(AppState::new(storage, &config).is_err());
}

#[tokio::test]
async fn stored_metric_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("url-metrics.db");

    let mut config = AppConfig::default_config();
    config.web.site_url = "http://example.org".to_string();
    config.nonce.secret = "wiring-secret".to_string();

    let slug = url_metrics_slug(&BTreeMap::from([("p".to_string(), json!(42))]));
    let nonce = NonceService::new(&config.nonce.secret, config.nonce_lifetime())
        .unwrap()
        .create(&url_metrics_storage_action(&slug), now_timestamp());

    {
        let storage = Arc::new(SqliteStorage::open(&db_path, 30).unwrap());
        let router = build_router(AppState::new(storage, &config).unwrap());

        let body = json!({
            "url": "http://example.org/?p=42",
            "slug": slug,
            "nonce": nonce,
            "viewport": {"width": 390, "height": 844},
            "elements": [{
                "isLCP": true,
                "isLCPCandidate": true,
                "xpath": "/*[0][self::HTML]/*[1][self::BODY]/*[0][self::IMG]",
                "intersectionRatio": 1.0
            }]
        });
        let response = router
            .oneshot(
                Request::post("/image-loading-optimization/v1/url-metrics:store")
                    .header("content-type", "application/json")
                    .header("x-forwarded-for", "198.51.100.7")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({"success": true}));
    }

    let reopened = SqliteStorage::open(&db_path, 30).unwrap();
    let stored = reopened.get_url_metrics(&slug).await.unwrap().unwrap();
    assert_eq!(stored.url, "http://example.org/?p=42");
    assert_eq!(stored.url_metrics.len(), 1);
    assert_eq!(stored.url_metrics[0].viewport_width(), 390);
}
