//! 저장소 유지보수 루프.
//!
//! 보존 기간이 지난 슬러그 레코드와 만료된 저장 잠금을 주기적으로 정리한다.

use std::sync::Arc;
use std::time::Duration;

use ilo_core::clock::now_timestamp;
use ilo_core::error::CoreError;
use ilo_core::ports::storage::StorageLock;
use ilo_storage::sqlite::SqliteStorage;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 유지보수 1회 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceReport {
    /// 삭제된 슬러그 레코드 수
    pub purged_records: usize,
    /// 정리된 만료 잠금 수
    pub expired_locks: usize,
}

/// 유지보수 1회 실행
pub async fn run_maintenance(storage: &SqliteStorage) -> Result<MaintenanceReport, CoreError> {
    let purged_records = storage.enforce_retention().await?;
    let expired_locks = storage.clear_expired(now_timestamp()).await?;
    Ok(MaintenanceReport {
        purged_records,
        expired_locks,
    })
}

/// 주기적 유지보수 루프 시작
pub fn spawn_maintenance(
    storage: Arc<SqliteStorage>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match run_maintenance(&storage).await {
                        Ok(report) => debug!("유지보수 완료: {report:?}"),
                        Err(e) => warn!("유지보수 실패: {e}"),
                    }
                }
                _ = shutdown_rx.changed() => {
                    info!("유지보수 루프 종료");
                    break;
                }
            }
        }
    })
}
