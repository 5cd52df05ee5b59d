//! API 에러 처리.
//!
//! 응답 본문은 WordPress REST 에러 형식을 따른다:
//! `{"code": .., "message": .., "data": {"status": .., "params"?: {..}, "details"?: {..}}}`

use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ilo_core::error::CoreError;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// 파라미터 하나의 검증 실패
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamError {
    /// 세부 에러 코드 (예: `non_origin_url`, `invalid_nonce`)
    pub code: &'static str,
    /// 실패 사유
    pub message: String,
}

impl ParamError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// API 에러
#[derive(Debug, Error)]
pub enum ApiError {
    /// 요청 파라미터 검증 실패 (파라미터 이름 → 사유)
    #[error("잘못된 파라미터: {}", .0.keys().cloned().collect::<Vec<_>>().join(", "))]
    InvalidParams(BTreeMap<String, ParamError>),

    /// JSON 본문 파싱 실패
    #[error("잘못된 JSON 본문: {0}")]
    InvalidJson(String),

    /// 현재 방문자의 저장이 잠겨 있음
    #[error("현재 IP의 URL 메트릭 저장이 잠겨 있음")]
    StorageLocked,

    /// 해당 뷰포트 너비 그룹은 이미 완성됨
    #[error("해당 뷰포트 너비에는 URL 메트릭이 필요하지 않음")]
    NoUrlMetricNeeded,

    /// 서버 시각을 대입한 URL 메트릭 생성 실패
    #[error("URL 메트릭 검증 실패: {0}")]
    UrlMetricException(String),

    /// 어떤 그룹에도 속하지 않는 뷰포트 너비
    #[error("뷰포트 너비에 해당하는 그룹 없음: {0}")]
    InvalidViewportWidth(i64),

    /// 리소스를 찾을 수 없음
    #[error("리소스를 찾을 수 없음: {0}")]
    NotFound(String),

    /// 내부 서버 오류
    #[error("내부 서버 오류: {0}")]
    Internal(String),
}

impl ApiError {
    /// 파라미터 하나짜리 검증 실패
    pub fn invalid_param(name: impl Into<String>, error: ParamError) -> Self {
        ApiError::InvalidParams(BTreeMap::from([(name.into(), error)]))
    }

    /// 기계 판독용 에러 코드
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidParams(_) => "rest_invalid_param",
            ApiError::InvalidJson(_) => "rest_invalid_json",
            ApiError::StorageLocked => "url_metric_storage_locked",
            ApiError::NoUrlMetricNeeded => "no_url_metric_needed",
            ApiError::UrlMetricException(_) => "url_metric_exception",
            ApiError::InvalidViewportWidth(_) => "invalid_viewport_width",
            ApiError::NotFound(_) => "rest_not_found",
            ApiError::Internal(_) => "internal_error",
        }
    }

    /// HTTP 상태 코드
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidParams(_)
            | ApiError::InvalidJson(_)
            | ApiError::UrlMetricException(_)
            | ApiError::InvalidViewportWidth(_) => StatusCode::BAD_REQUEST,
            ApiError::StorageLocked | ApiError::NoUrlMetricNeeded => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// 에러 응답 본문
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// 에러 코드
    pub code: &'static str,
    /// 에러 메시지
    pub message: String,
    /// 상태 코드와 파라미터별 상세
    pub data: ErrorData,
}

/// 에러 응답 `data` 필드
#[derive(Debug, Serialize)]
pub struct ErrorData {
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<BTreeMap<String, ErrorDetail>>,
}

/// 파라미터별 상세 에러
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    pub data: Value,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (params, details) = match &self {
            ApiError::InvalidParams(errors) => (
                Some(
                    errors
                        .iter()
                        .map(|(name, e)| (name.clone(), e.message.clone()))
                        .collect(),
                ),
                Some(
                    errors
                        .iter()
                        .map(|(name, e)| {
                            (
                                name.clone(),
                                ErrorDetail {
                                    code: e.code,
                                    message: e.message.clone(),
                                    data: Value::Null,
                                },
                            )
                        })
                        .collect(),
                ),
            ),
            _ => (None, None),
        };

        let body = ErrorResponse {
            code: self.code(),
            message: self.to_string(),
            data: ErrorData {
                status: status.as_u16(),
                params,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation { field, message } => ApiError::invalid_param(
                top_level_param(&field),
                ParamError::new("rest_invalid_param", format!("{field}: {message}")),
            ),
            CoreError::OutOfRange { width } => ApiError::InvalidViewportWidth(width),
            CoreError::NotFound { resource_type, id } => {
                ApiError::NotFound(format!("{resource_type} {id}"))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// `viewport.width`, `elements[0].xpath` 같은 필드 경로의 최상위 파라미터 이름
pub(crate) fn top_level_param(field: &str) -> String {
    field
        .split(['.', '['])
        .next()
        .unwrap_or(field)
        .to_string()
}
