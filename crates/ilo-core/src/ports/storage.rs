//! URL 메트릭 저장소 포트.
//!
//! 구현: `ilo-storage` crate (rusqlite)

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::CoreError;
use crate::models::collection::GroupingSettings;
use crate::models::url_metric::UrlMetric;

/// 슬러그 하나에 저장된 URL 메트릭 목록
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredUrlMetrics {
    /// URL 슬러그 (32자리 hex)
    pub slug: String,
    /// 마지막으로 저장 요청을 보낸 URL
    pub url: String,
    /// 그룹 순서로 평탄화된 메트릭
    pub url_metrics: Vec<UrlMetric>,
    /// 마지막 갱신 시각
    pub updated_at: DateTime<Utc>,
}

/// URL 메트릭 저장소
#[async_trait]
pub trait UrlMetricsStorage: Send + Sync {
    /// 슬러그의 저장된 메트릭 조회 (없으면 `None`)
    ///
    /// 스키마에 맞지 않는 레코드는 버리고 나머지만 반환한다.
    async fn get_url_metrics(&self, slug: &str) -> Result<Option<StoredUrlMetrics>, CoreError>;

    /// 메트릭 하나를 그룹 컬렉션에 합쳐 저장
    ///
    /// 이전 목록 로드, 컬렉션 구성, 추가, 병합 결과 저장을 한 트랜잭션에서 수행하고
    /// 저장된 목록을 반환한다.
    async fn store_url_metric(
        &self,
        url: &str,
        slug: &str,
        url_metric: UrlMetric,
        settings: &GroupingSettings,
    ) -> Result<Vec<UrlMetric>, CoreError>;

    /// 슬러그 레코드 삭제 (삭제했으면 true)
    async fn delete_url_metrics(&self, slug: &str) -> Result<bool, CoreError>;

    /// 저장된 슬러그 레코드 수
    async fn count_url_metrics_records(&self) -> Result<usize, CoreError>;

    /// `before` 이전에 마지막으로 갱신된 레코드 삭제
    async fn purge_stale_records(&self, before: DateTime<Utc>) -> Result<usize, CoreError>;
}

/// 방문자별 저장 잠금
///
/// 같은 방문자가 짧은 시간에 반복 저장하는 것을 막는 TTL 기반 권고 잠금.
#[async_trait]
pub trait StorageLock: Send + Sync {
    /// `now` 시점에 잠금이 유효한지 확인
    async fn is_locked(&self, lock_key: &str, now: f64) -> Result<bool, CoreError>;

    /// `now + ttl`까지 잠금 설정 (TTL 0이면 잠금 삭제)
    async fn set_lock(&self, lock_key: &str, ttl: Duration, now: f64) -> Result<(), CoreError>;

    /// 만료된 잠금 정리
    async fn clear_expired(&self, now: f64) -> Result<usize, CoreError>;
}
