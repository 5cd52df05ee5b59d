//! URL 메트릭 저장/조회 핸들러.
//!
//! 저장 요청 처리 순서: JSON 파싱 → 파라미터 검증(url, slug, nonce, 메트릭 스키마)
//! → 방문자 저장 잠금 확인 → 뷰포트 너비 그룹 수용 여부 → 잠금 설정
//! → 서버 시각 대입 → 저장.

use std::collections::BTreeMap;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use ilo_core::clock::now_timestamp;
use ilo_core::error::CoreError;
use ilo_core::models::collection::UrlMetricsGroupCollection;
use ilo_core::models::url_metric::UrlMetric;
use ilo_core::needed_widths::{compute_needed_widths_with, needs_any_width, NeededWidth};
use ilo_core::slug::is_valid_slug;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};
use url::Url;

use crate::error::{top_level_param, ApiError, ParamError};
use crate::nonce::{is_valid_nonce_format, url_metrics_storage_action};
use crate::server_timing::ServerTiming;
use crate::visitor::VisitorKey;
use crate::AppState;

/// 저장소 로드 구간 메트릭 이름
pub const LOAD_METRIC: &str = "ilo-load";
/// 저장 구간 메트릭 이름
pub const STORE_METRIC: &str = "ilo-store";

/// 저장 성공 응답
#[derive(Debug, Serialize)]
pub struct StoreResponse {
    pub success: bool,
}

/// 그룹 하나의 상태
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupStatus {
    pub minimum_viewport_width: u32,
    pub maximum_viewport_width: u32,
    pub count: usize,
    pub complete: bool,
}

/// 슬러그 상태 응답
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlMetricsStatus {
    pub slug: String,
    /// 저장 요청에 쓸 논스
    pub nonce: String,
    pub groups: Vec<GroupStatus>,
    pub needed_widths: Vec<NeededWidth>,
    /// 하나라도 샘플이 필요한 그룹이 있는지
    pub needed: bool,
}

/// 검증을 통과한 저장 요청
#[derive(Debug)]
struct StoreRequest {
    url: String,
    slug: String,
    /// 타임스탬프 대입 전 메트릭 (timestamp = 0)
    unstamped: UrlMetric,
}

/// POST /url-metrics:store
pub async fn store_url_metric(
    State(state): State<AppState>,
    visitor: VisitorKey,
    body: Bytes,
) -> Response {
    let mut timing = ServerTiming::new();
    let result = store(&state, &visitor, &body, &mut timing).await;
    timing.apply(result.into_response())
}

/// GET /url-metrics/{slug}
pub async fn get_url_metrics_status(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Response {
    let mut timing = ServerTiming::new();
    let result = status(&state, slug, &mut timing).await;
    timing.apply(result.into_response())
}

async fn store(
    state: &AppState,
    visitor: &VisitorKey,
    body: &[u8],
    timing: &mut ServerTiming,
) -> Result<Json<StoreResponse>, ApiError> {
    let now = now_timestamp();

    let params: Value =
        serde_json::from_slice(body).map_err(|e| ApiError::InvalidJson(e.to_string()))?;
    let params = params
        .as_object()
        .ok_or_else(|| ApiError::InvalidJson("JSON 객체가 아님".to_string()))?;
    let request = validate_store_request(state, params, now)?;

    let lock_key = visitor.lock_key();
    if state.locks.is_locked(&lock_key, now).await? {
        warn!("저장 잠금 상태의 방문자 요청 거부: {}", visitor.ip());
        return Err(ApiError::StorageLocked);
    }

    let stored = timing
        .measure(LOAD_METRIC, state.url_metrics.get_url_metrics(&request.slug))
        .await?;
    let collection = UrlMetricsGroupCollection::with_settings(
        stored.map(|s| s.url_metrics).unwrap_or_default(),
        state.grouping.clone(),
    );

    let viewport_width = i64::from(request.unstamped.viewport_width());
    let group = collection.group_for_viewport_width(viewport_width)?;
    if !group.is_lacking(now) {
        debug!(
            "URL 메트릭 불필요: slug={}, width={}, group={}..={}",
            request.slug,
            viewport_width,
            group.minimum_viewport_width(),
            group.maximum_viewport_width()
        );
        return Err(ApiError::NoUrlMetricNeeded);
    }

    state
        .locks
        .set_lock(&lock_key, state.storage_lock_ttl, now)
        .await?;

    // 클라이언트가 보낸 timestamp는 무시하고 서버 시각 사용
    let url_metric = request
        .unstamped
        .with_timestamp(now)
        .map_err(|e| ApiError::UrlMetricException(e.to_string()))?;

    let merged = timing
        .measure(
            STORE_METRIC,
            state.url_metrics.store_url_metric(
                &request.url,
                &request.slug,
                url_metric,
                &state.grouping,
            ),
        )
        .await?;

    debug!(
        "URL 메트릭 저장 완료: slug={}, width={}, total={}",
        request.slug,
        viewport_width,
        merged.len()
    );
    Ok(Json(StoreResponse { success: true }))
}

async fn status(
    state: &AppState,
    slug: String,
    timing: &mut ServerTiming,
) -> Result<Json<UrlMetricsStatus>, ApiError> {
    if !is_valid_slug(&slug) {
        return Err(ApiError::invalid_param(
            "slug",
            ParamError::new("rest_invalid_pattern", "slug는 32자리 소문자 hex여야 함"),
        ));
    }
    let now = now_timestamp();

    let stored = timing
        .measure(LOAD_METRIC, state.url_metrics.get_url_metrics(&slug))
        .await?;
    let collection = UrlMetricsGroupCollection::with_settings(
        stored.map(|s| s.url_metrics).unwrap_or_default(),
        state.grouping.clone(),
    );

    let groups = collection
        .groups()
        .iter()
        .map(|group| GroupStatus {
            minimum_viewport_width: group.minimum_viewport_width(),
            maximum_viewport_width: group.maximum_viewport_width(),
            count: group.count(),
            complete: group.is_complete(now),
        })
        .collect();
    let needed_widths =
        compute_needed_widths_with(&collection.merged_url_metrics(), now, &state.grouping);

    Ok(Json(UrlMetricsStatus {
        nonce: state.nonce.create(&url_metrics_storage_action(&slug), now),
        needed: needs_any_width(&needed_widths),
        slug,
        groups,
        needed_widths,
    }))
}

/// 파라미터 검증
///
/// 실패한 파라미터를 모두 모아 한 번에 보고한다.
fn validate_store_request(
    state: &AppState,
    params: &Map<String, Value>,
    now: f64,
) -> Result<StoreRequest, ApiError> {
    let mut errors: BTreeMap<String, ParamError> = BTreeMap::new();

    let url = match required_str(params, "url") {
        Ok(url) => match same_origin_url(&state.site_url, url) {
            Some(resolved) => Some(resolved),
            None => {
                errors.insert(
                    "url".to_string(),
                    ParamError::new("non_origin_url", "다른 사이트의 URL"),
                );
                None
            }
        },
        Err(e) => {
            errors.insert("url".to_string(), e);
            None
        }
    };

    let slug = match required_str(params, "slug") {
        Ok(slug) if is_valid_slug(slug) => Some(slug.to_string()),
        Ok(_) => {
            errors.insert(
                "slug".to_string(),
                ParamError::new("rest_invalid_pattern", "slug는 32자리 소문자 hex여야 함"),
            );
            None
        }
        Err(e) => {
            errors.insert("slug".to_string(), e);
            None
        }
    };

    match required_str(params, "nonce") {
        Ok(nonce) if !is_valid_nonce_format(nonce) => {
            errors.insert(
                "nonce".to_string(),
                ParamError::new("rest_invalid_pattern", "nonce는 소문자 hex여야 함"),
            );
        }
        Ok(nonce) => {
            // slug가 잘못됐으면 slug 에러만 보고
            if let Some(slug) = &slug {
                if !state
                    .nonce
                    .verify(nonce, &url_metrics_storage_action(slug), now)
                {
                    warn!("URL 메트릭 논스 검증 실패: slug={slug}");
                    errors.insert(
                        "nonce".to_string(),
                        ParamError::new("invalid_nonce", "URL 메트릭 논스 검증 실패"),
                    );
                }
            }
        }
        Err(e) => {
            errors.insert("nonce".to_string(), e);
        }
    }

    let record = json!({
        "viewport": params.get("viewport").cloned().unwrap_or(Value::Null),
        "timestamp": 0,
        "elements": params.get("elements").cloned().unwrap_or(Value::Null),
    });
    let unstamped = match UrlMetric::from_value(&record) {
        Ok(metric) => Some(metric),
        Err(CoreError::Validation { field, message }) => {
            errors.insert(
                top_level_param(&field),
                ParamError::new("rest_invalid_param", format!("{field}: {message}")),
            );
            None
        }
        Err(other) => return Err(other.into()),
    };

    match (url, slug, unstamped) {
        (Some(url), Some(slug), Some(unstamped)) if errors.is_empty() => Ok(StoreRequest {
            url,
            slug,
            unstamped,
        }),
        _ => Err(ApiError::InvalidParams(errors)),
    }
}

fn required_str<'a>(params: &'a Map<String, Value>, name: &str) -> Result<&'a str, ParamError> {
    match params.get(name) {
        Some(Value::String(value)) if !value.is_empty() => Ok(value),
        Some(Value::String(_)) | None => Err(ParamError::new(
            "rest_missing_callback_param",
            format!("{name} 파라미터 누락"),
        )),
        Some(_) => Err(ParamError::new(
            "rest_invalid_type",
            format!("{name}는 문자열이어야 함"),
        )),
    }
}

/// 사이트와 같은 origin인 경우 절대 URL로 정규화
///
/// 상대 경로는 사이트 URL 기준으로 해석한다.
fn same_origin_url(site_url: &Url, candidate: &str) -> Option<String> {
    let resolved = site_url.join(candidate).ok()?;
    if !matches!(resolved.scheme(), "http" | "https") {
        return None;
    }
    (resolved.origin() == site_url.origin()).then(|| resolved.to_string())
}
