//! API 핸들러.

pub mod url_metrics;

use axum::http::Uri;

use crate::error::ApiError;

/// 등록되지 않은 경로
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}
