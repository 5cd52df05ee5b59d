//! URL 메트릭 스토리지 (UrlMetricsStorage 포트 구현).
//!
//! 슬러그마다 그룹 순서로 평탄화된 메트릭 목록을 JSON 배열 한 행으로 저장한다.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use ilo_core::error::CoreError;
use ilo_core::models::collection::{GroupingSettings, UrlMetricsGroupCollection};
use ilo_core::models::url_metric::UrlMetric;
use ilo_core::ports::storage::{StoredUrlMetrics, UrlMetricsStorage};
use rusqlite::{Connection, OptionalExtension};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{format_db_time, parse_db_time, SqliteStorage};

/// 슬러그 행 (DB 조회 결과)
struct UrlMetricsRow {
    url: String,
    data: String,
    updated_at: String,
}

impl SqliteStorage {
    fn select_row(conn: &Connection, slug: &str) -> Result<Option<UrlMetricsRow>, CoreError> {
        conn.query_row(
            "SELECT url, data, updated_at FROM url_metrics WHERE slug = ?1",
            rusqlite::params![slug],
            |row| {
                Ok(UrlMetricsRow {
                    url: row.get(0)?,
                    data: row.get(1)?,
                    updated_at: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(|e| CoreError::Internal(format!("URL 메트릭 조회 실패: {e}")))
    }

    /// 저장된 JSON 배열을 메트릭 목록으로 변환
    ///
    /// 스키마에 맞지 않는 레코드는 경고 후 버린다. 배열이 아니면 빈 목록.
    pub(super) fn parse_stored_metrics(slug: &str, data: &str) -> Vec<UrlMetric> {
        let records: Vec<Value> = match serde_json::from_str(data) {
            Ok(Value::Array(records)) => records,
            Ok(_) | Err(_) => {
                warn!("URL 메트릭 데이터가 배열이 아님: slug={slug}");
                return Vec::new();
            }
        };

        records
            .iter()
            .filter_map(|record| match UrlMetric::from_value(record) {
                Ok(metric) => Some(metric),
                Err(e) => {
                    warn!("잘못된 URL 메트릭 레코드 무시: slug={slug}, {e}");
                    None
                }
            })
            .collect()
    }

    /// 보존 기간이 지난 슬러그 레코드 삭제
    pub async fn enforce_retention(&self) -> Result<usize, CoreError> {
        let before = Utc::now() - Duration::days(i64::from(self.retention_days));
        self.purge_stale_records(before).await
    }
}

#[async_trait]
impl UrlMetricsStorage for SqliteStorage {
    async fn get_url_metrics(&self, slug: &str) -> Result<Option<StoredUrlMetrics>, CoreError> {
        let conn = self.lock_conn()?;

        let Some(row) = Self::select_row(&conn, slug)? else {
            return Ok(None);
        };

        Ok(Some(StoredUrlMetrics {
            slug: slug.to_string(),
            url_metrics: Self::parse_stored_metrics(slug, &row.data),
            url: row.url,
            updated_at: parse_db_time(&row.updated_at),
        }))
    }

    async fn store_url_metric(
        &self,
        url: &str,
        slug: &str,
        url_metric: UrlMetric,
        settings: &GroupingSettings,
    ) -> Result<Vec<UrlMetric>, CoreError> {
        let mut conn = self.lock_conn()?;

        let tx = conn
            .transaction()
            .map_err(|e| CoreError::Internal(format!("트랜잭션 시작 실패: {e}")))?;

        let previous = Self::select_row(&tx, slug)?
            .map(|row| Self::parse_stored_metrics(slug, &row.data))
            .unwrap_or_default();

        let mut collection = UrlMetricsGroupCollection::with_settings(previous, settings.clone());
        collection.add_url_metric(url_metric);
        let merged = collection.into_merged_url_metrics();

        let data = serde_json::to_string(&merged)?;
        let now = format_db_time(Utc::now());

        tx.execute(
            "INSERT INTO url_metrics (slug, url, data, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(slug) DO UPDATE SET
                url = excluded.url,
                data = excluded.data,
                updated_at = excluded.updated_at",
            rusqlite::params![slug, url, data, now],
        )
        .map_err(|e| CoreError::Internal(format!("URL 메트릭 저장 실패: {e}")))?;

        tx.commit()
            .map_err(|e| CoreError::Internal(format!("트랜잭션 커밋 실패: {e}")))?;

        debug!("URL 메트릭 저장: slug={slug}, count={}", merged.len());
        Ok(merged)
    }

    async fn delete_url_metrics(&self, slug: &str) -> Result<bool, CoreError> {
        let conn = self.lock_conn()?;

        let deleted = conn
            .execute(
                "DELETE FROM url_metrics WHERE slug = ?1",
                rusqlite::params![slug],
            )
            .map_err(|e| CoreError::Internal(format!("URL 메트릭 삭제 실패: {e}")))?;

        Ok(deleted > 0)
    }

    async fn count_url_metrics_records(&self) -> Result<usize, CoreError> {
        let conn = self.lock_conn()?;

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM url_metrics", [], |row| row.get(0))
            .map_err(|e| CoreError::Internal(format!("레코드 수 조회 실패: {e}")))?;

        Ok(count as usize)
    }

    async fn purge_stale_records(&self, before: DateTime<Utc>) -> Result<usize, CoreError> {
        let conn = self.lock_conn()?;

        let deleted = conn
            .execute(
                "DELETE FROM url_metrics WHERE updated_at < ?1",
                rusqlite::params![format_db_time(before)],
            )
            .map_err(|e| CoreError::Internal(format!("오래된 레코드 삭제 실패: {e}")))?;

        if deleted > 0 {
            info!("오래된 URL 메트릭 레코드 삭제: {deleted}개");
        }
        Ok(deleted)
    }
}
