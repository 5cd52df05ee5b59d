//! 방문자별 저장 잠금 (StorageLock 포트 구현).

use std::time::Duration;

use async_trait::async_trait;
use ilo_core::error::CoreError;
use ilo_core::ports::storage::StorageLock;
use rusqlite::OptionalExtension;
use tracing::debug;

use super::SqliteStorage;

#[async_trait]
impl StorageLock for SqliteStorage {
    async fn is_locked(&self, lock_key: &str, now: f64) -> Result<bool, CoreError> {
        let conn = self.lock_conn()?;

        let expires_at: Option<f64> = conn
            .query_row(
                "SELECT expires_at FROM storage_locks WHERE lock_key = ?1",
                rusqlite::params![lock_key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| CoreError::Internal(format!("저장 잠금 조회 실패: {e}")))?;

        Ok(expires_at.is_some_and(|expires_at| expires_at > now))
    }

    async fn set_lock(&self, lock_key: &str, ttl: Duration, now: f64) -> Result<(), CoreError> {
        let conn = self.lock_conn()?;

        if ttl.is_zero() {
            conn.execute(
                "DELETE FROM storage_locks WHERE lock_key = ?1",
                rusqlite::params![lock_key],
            )
            .map_err(|e| CoreError::Internal(format!("저장 잠금 해제 실패: {e}")))?;
            return Ok(());
        }

        let expires_at = now + ttl.as_secs_f64();
        conn.execute(
            "INSERT INTO storage_locks (lock_key, expires_at) VALUES (?1, ?2)
             ON CONFLICT(lock_key) DO UPDATE SET expires_at = excluded.expires_at",
            rusqlite::params![lock_key, expires_at],
        )
        .map_err(|e| CoreError::Internal(format!("저장 잠금 설정 실패: {e}")))?;

        debug!("저장 잠금 설정: {lock_key} (만료 {expires_at})");
        Ok(())
    }

    async fn clear_expired(&self, now: f64) -> Result<usize, CoreError> {
        let conn = self.lock_conn()?;

        conn.execute(
            "DELETE FROM storage_locks WHERE expires_at <= ?1",
            rusqlite::params![now],
        )
        .map_err(|e| CoreError::Internal(format!("만료 잠금 정리 실패: {e}")))
    }
}
