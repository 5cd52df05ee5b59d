//! API 라우트 정의.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::AppState;

/// API 라우트 생성 (`REST_NAMESPACE` 아래에 중첩)
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // 저장 (AIP-136 커스텀 메서드 형식)
        .route(
            "/url-metrics:store",
            post(handlers::url_metrics::store_url_metric),
        )
        // 서버 렌더링용 그룹 상태
        .route(
            "/url-metrics/{slug}",
            get(handlers::url_metrics::get_url_metrics_status),
        )
}
