//! URL 메트릭 저장 엔드포인트 통합 테스트.
//!
//! 인메모리 SQLite 위에 라우터를 구성하고 `oneshot`으로 요청을 보낸다.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use ilo_core::config::AppConfig;
use ilo_core::ports::storage::{StorageLock, UrlMetricsStorage};
use ilo_storage::sqlite::SqliteStorage;
use ilo_web::visitor::VisitorKey;
use ilo_web::{build_router, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

const SLUG: &str = "0123456789abcdef0123456789abcdef";
const STORE_PATH: &str = "/image-loading-optimization/v1/url-metrics:store";
const XPATH: &str = "/*[0][self::HTML]/*[1][self::BODY]/*[0][self::DIV]/*[1][self::IMG]";

struct TestApp {
    router: Router,
    storage: Arc<SqliteStorage>,
}

fn test_config(lock_ttl_secs: u64) -> AppConfig {
    let mut config = AppConfig::default_config();
    config.web.site_url = "http://example.org".to_string();
    config.nonce.secret = "integration-secret".to_string();
    config.url_metrics.breakpoints = vec![480];
    config.url_metrics.sample_size = 3;
    config.url_metrics.storage_lock_ttl_secs = lock_ttl_secs;
    config
}

fn app(lock_ttl_secs: u64) -> TestApp {
    let storage = Arc::new(SqliteStorage::open_in_memory(30).unwrap());
    let state = AppState::new(storage.clone(), &test_config(lock_ttl_secs)).unwrap();
    TestApp {
        router: build_router(state),
        storage,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value, Option<String>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let timing = response
        .headers()
        .get("server-timing")
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body, timing)
}

async fn status_of(router: &Router, slug: &str) -> (StatusCode, Value) {
    let request = Request::get(format!("/image-loading-optimization/v1/url-metrics/{slug}"))
        .body(Body::empty())
        .unwrap();
    let (status, body, _) = send(router, request).await;
    (status, body)
}

async fn nonce_for(router: &Router, slug: &str) -> String {
    let (_, body) = status_of(router, slug).await;
    body["nonce"].as_str().unwrap().to_string()
}

fn valid_params(nonce: &str, width: u32) -> Value {
    json!({
        "url": "http://example.org/",
        "slug": SLUG,
        "nonce": nonce,
        "viewport": {"width": width, "height": 800},
        "elements": [{
            "isLCP": true,
            "isLCPCandidate": true,
            "xpath": XPATH,
            "intersectionRatio": 1.0
        }]
    })
}

async fn post(router: &Router, params: &Value, visitor: &str) -> (StatusCode, Value, Option<String>) {
    let request = Request::post(STORE_PATH)
        .header("content-type", "application/json")
        .header("x-forwarded-for", visitor)
        .body(Body::from(params.to_string()))
        .unwrap();
    send(router, request).await
}

async fn stored_count(storage: &SqliteStorage) -> usize {
    storage
        .get_url_metrics(SLUG)
        .await
        .unwrap()
        .map(|s| s.url_metrics.len())
        .unwrap_or(0)
}

#[tokio::test]
async fn store_until_group_is_complete() {
    let app = app(0);
    let nonce = nonce_for(&app.router, SLUG).await;

    for expected in 1..=3 {
        let (status, body, _) = post(&app.router, &valid_params(&nonce, 400), "192.0.2.1").await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body, json!({"success": true}));
        assert_eq!(stored_count(&app.storage).await, expected);
    }

    let (status, body, _) = post(&app.router, &valid_params(&nonce, 400), "192.0.2.1").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "no_url_metric_needed");
    assert_eq!(stored_count(&app.storage).await, 3);

    // 다른 그룹은 여전히 수용
    let (status, _, _) = post(&app.router, &valid_params(&nonce, 800), "192.0.2.1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored_count(&app.storage).await, 4);
}

#[tokio::test]
async fn status_reports_groups_and_needed_widths() {
    let app = app(0);
    let (status, body) = status_of(&app.router, SLUG).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["slug"], SLUG);
    assert_eq!(body["needed"], true);
    assert_eq!(
        body["groups"],
        json!([
            {"minimumViewportWidth": 0, "maximumViewportWidth": 480, "count": 0, "complete": false},
            {"minimumViewportWidth": 481, "maximumViewportWidth": u32::MAX, "count": 0, "complete": false}
        ])
    );

    let nonce = body["nonce"].as_str().unwrap().to_string();
    for _ in 0..3 {
        post(&app.router, &valid_params(&nonce, 300), "192.0.2.1").await;
    }

    let (_, body) = status_of(&app.router, SLUG).await;
    assert_eq!(body["groups"][0]["count"], 3);
    assert_eq!(body["groups"][0]["complete"], true);
    assert_eq!(
        body["neededWidths"],
        json!([
            {"minimumViewportWidth": 0, "needed": false},
            {"minimumViewportWidth": 481, "needed": true}
        ])
    );
    assert_eq!(body["needed"], true);
}

#[tokio::test]
async fn client_timestamp_is_ignored() {
    let app = app(0);
    let nonce = nonce_for(&app.router, SLUG).await;
    let mut params = valid_params(&nonce, 400);
    params["timestamp"] = json!(1.0);

    let (status, _, _) = post(&app.router, &params, "192.0.2.1").await;
    assert_eq!(status, StatusCode::OK);

    let stored = app.storage.get_url_metrics(SLUG).await.unwrap().unwrap();
    assert!(stored.url_metrics[0].timestamp() > 1_600_000_000.0);
    assert_eq!(stored.url, "http://example.org/");
}

#[tokio::test]
async fn bad_params_are_rejected() {
    let app = app(0);
    let nonce = nonce_for(&app.router, SLUG).await;

    let cases: Vec<(&str, Box<dyn Fn(&mut Value)>, &str)> = vec![
        ("url", Box::new(|p: &mut Value| p["url"] = json!("https://bad.example.com/")), "non_origin_url"),
        ("url", Box::new(|p: &mut Value| { p.as_object_mut().unwrap().remove("url"); }), "rest_missing_callback_param"),
        ("slug", Box::new(|p: &mut Value| p["slug"] = json!("not-a-slug")), "rest_invalid_pattern"),
        ("nonce", Box::new(|p: &mut Value| p["nonce"] = json!("not-a-nonce")), "rest_invalid_pattern"),
        ("nonce", Box::new(|p: &mut Value| p["nonce"] = json!("abcdef0123")), "invalid_nonce"),
        ("viewport", Box::new(|p: &mut Value| p["viewport"] = json!("invalid")), "rest_invalid_param"),
        ("viewport", Box::new(|p: &mut Value| p["viewport"] = json!({"width": 640})), "rest_invalid_param"),
        ("viewport", Box::new(|p: &mut Value| p["viewport"] = json!({"width": -320, "height": 640})), "rest_invalid_param"),
        ("elements", Box::new(|p: &mut Value| p["elements"] = json!("bad")), "rest_invalid_param"),
        ("elements", Box::new(|p: &mut Value| p["elements"][0]["isLCP"] = json!("totally")), "rest_invalid_param"),
        ("elements", Box::new(|p: &mut Value| p["elements"][0]["xpath"] = json!("html > body img")), "rest_invalid_param"),
        ("elements", Box::new(|p: &mut Value| p["elements"][0]["intersectionRatio"] = json!(1.1)), "rest_invalid_param"),
        ("elements", Box::new(|p: &mut Value| p["elements"][0]["intersectionRatio"] = json!(-0.1)), "rest_invalid_param"),
    ];

    for (param, mutate, inner_code) in cases {
        let mut params = valid_params(&nonce, 400);
        mutate(&mut params);

        let (status, body, _) = post(&app.router, &params, "192.0.2.1").await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{param}: {body}");
        assert_eq!(body["code"], "rest_invalid_param", "{param}: {body}");
        assert_eq!(body["data"]["status"], 400);
        assert_eq!(body["data"]["details"][param]["code"], inner_code, "{body}");
    }

    assert_eq!(stored_count(&app.storage).await, 0);
    assert_eq!(app.storage.count_url_metrics_records().await.unwrap(), 0);
}

#[tokio::test]
async fn nonce_for_other_slug_is_rejected() {
    let app = app(0);
    let other_nonce = nonce_for(&app.router, "fedcba9876543210fedcba9876543210").await;

    let (status, body, _) = post(&app.router, &valid_params(&other_nonce, 400), "192.0.2.1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"]["details"]["nonce"]["code"], "invalid_nonce");
}

#[tokio::test]
async fn malformed_json_is_rejected() {
    let app = app(0);
    let request = Request::post(STORE_PATH)
        .header("content-type", "application/json")
        .body(Body::from("{ not json"))
        .unwrap();

    let (status, body, _) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "rest_invalid_json");
}

#[tokio::test]
async fn storage_lock_blocks_same_visitor_only() {
    let app = app(60);
    let nonce = nonce_for(&app.router, SLUG).await;

    let (status, _, _) = post(&app.router, &valid_params(&nonce, 400), "192.0.2.1").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body, _) = post(&app.router, &valid_params(&nonce, 400), "192.0.2.1").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "url_metric_storage_locked");

    let (status, _, _) = post(&app.router, &valid_params(&nonce, 400), "192.0.2.2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored_count(&app.storage).await, 2);
}

#[tokio::test]
async fn invalid_params_are_checked_before_lock() {
    let app = app(60);
    let lock_key = VisitorKey::from_ip("192.0.2.1").lock_key();
    app.storage
        .set_lock(&lock_key, std::time::Duration::from_secs(60), ilo_core::clock::now_timestamp())
        .await
        .unwrap();

    let mut params = valid_params("abcdef", 400);
    params["slug"] = json!("bad");
    let (status, body, _) = post(&app.router, &params, "192.0.2.1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "rest_invalid_param");
}

#[tokio::test]
async fn rejected_admission_does_not_set_lock() {
    let app = app(0);
    let nonce = nonce_for(&app.router, SLUG).await;
    for _ in 0..3 {
        post(&app.router, &valid_params(&nonce, 400), "192.0.2.1").await;
    }

    let locked = app.clone_with_lock_ttl(60);
    let (status, _, _) = post(&locked.router, &valid_params(&nonce, 400), "192.0.2.9").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let lock_key = VisitorKey::from_ip("192.0.2.9").lock_key();
    assert!(!locked
        .storage
        .is_locked(&lock_key, ilo_core::clock::now_timestamp())
        .await
        .unwrap());
}

#[tokio::test]
async fn responses_carry_server_timing() {
    let app = app(0);
    let nonce = nonce_for(&app.router, SLUG).await;

    let (_, _, timing) = post(&app.router, &valid_params(&nonce, 400), "192.0.2.1").await;
    let timing = timing.unwrap();
    assert!(timing.contains("ilo-load;dur="));
    assert!(timing.contains("ilo-store;dur="));
    assert!(timing.contains("ilo-total;dur="));

    let (_, _, timing) = post(&app.router, &json!({}), "192.0.2.1").await;
    assert!(timing.unwrap().starts_with("ilo-total;dur="));
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let app = app(0);
    let request = Request::get("/nope").body(Body::empty()).unwrap();
    let (status, body, _) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "rest_not_found");
}

#[tokio::test]
async fn status_rejects_malformed_slug() {
    let app = app(0);
    let (status, body) = status_of(&app.router, "NOT-A-SLUG").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"]["details"]["slug"]["code"], "rest_invalid_pattern");
}

impl TestApp {
    /// 같은 저장소를 공유하고 잠금 TTL만 다른 라우터
    fn clone_with_lock_ttl(&self, lock_ttl_secs: u64) -> TestApp {
        let state = AppState::new(self.storage.clone(), &test_config(lock_ttl_secs)).unwrap();
        TestApp {
            router: build_router(state),
            storage: self.storage.clone(),
        }
    }
}
