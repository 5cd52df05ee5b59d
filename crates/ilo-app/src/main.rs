//! # ilo
//!
//! 이미지 로딩 최적화 URL 메트릭 서버.
//! 설정 로드 → SQLite 저장소 → REST 서버 + 유지보수 루프 와이어링.

mod maintenance;
mod settings;

use anyhow::{Context, Result};
use clap::Parser;
use directories::ProjectDirs;
use ilo_core::config_manager::ConfigManager;
use ilo_storage::sqlite::SqliteStorage;
use ilo_web::WebServer;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// ILO URL 메트릭 서버
///
/// 방문자 브라우저가 측정한 LCP/요소 관측을 뷰포트 브레이크포인트별로 수집한다.
#[derive(Parser, Debug)]
#[command(name = "ilo")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 설정 파일 경로 (기본: 플랫폼 설정 디렉토리의 config.json)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// 데이터 저장 경로 (기본: 플랫폼 데이터 디렉토리)
    #[arg(long)]
    data_dir: Option<String>,

    /// 웹 서버 포트 (설정 파일보다 우선)
    #[arg(long, short = 'p')]
    port: Option<u16>,

    /// 사이트 URL (설정 파일보다 우선)
    #[arg(long)]
    site_url: Option<String>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,

    /// 유지보수 간격 (초)
    #[arg(long, default_value = "3600")]
    maintenance_interval: u64,
}

/// 데이터베이스 경로 결정 (CLI 인자 또는 플랫폼별 기본 경로)
fn resolve_db_path(data_dir: Option<&str>, db_file_name: &str) -> PathBuf {
    data_dir
        .map(|d| PathBuf::from(d).join(db_file_name))
        .or_else(|| {
            ProjectDirs::from("org", "ilo", "image-loading-optimization")
                .map(|p| p.data_dir().join(db_file_name))
        })
        .unwrap_or_else(|| PathBuf::from(".").join(db_file_name))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG가 있으면 우선
    let log_filter = format!(
        "ilo={0},ilo_app={0},ilo_core={0},ilo_storage={0},ilo_web={0},tower_http={0}",
        args.log_level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)),
        )
        .init();

    info!("ILO URL 메트릭 서버 시작");

    // 설정 로드: 파일 → 환경변수 → CLI 인자
    let manager = match args.config.clone() {
        Some(path) => ConfigManager::with_path(path)?,
        None => ConfigManager::new()?,
    };
    info!("설정 파일: {}", manager.config_path().display());

    let mut config = settings::apply_env_overrides(&manager.get(), settings::process_environment())?;
    if let Some(port) = args.port {
        config.web.port = port;
    }
    if let Some(site_url) = args.site_url {
        config.web.site_url = site_url;
    }
    info!(
        "브레이크포인트 {:?}, 샘플 크기 {}, 신선도 TTL {}초",
        config.url_metrics.breakpoints,
        config.url_metrics.sample_size,
        config.url_metrics.freshness_ttl_secs
    );

    // 저장소
    let db_path = resolve_db_path(args.data_dir.as_deref(), &config.storage.db_file_name);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("데이터 디렉토리 생성 실패: {}", parent.display()))?;
    }
    let storage = Arc::new(SqliteStorage::open(&db_path, config.storage.keep_days)?);

    // 서버 + 유지보수
    let server = WebServer::new(storage.clone(), &config)?;
    info!("엔드포인트: {}", server.url());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let maintenance_task = maintenance::spawn_maintenance(
        storage,
        Duration::from_secs(args.maintenance_interval.max(1)),
        shutdown_rx.clone(),
    );
    let mut server_task = tokio::spawn(server.run(shutdown_rx));

    let finished_early = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("종료 신호 대기 실패")?;
            info!("종료 신호 수신 (Ctrl+C)");
            None
        }
        result = &mut server_task => Some(result),
    };

    let _ = shutdown_tx.send(true);
    let server_result = match finished_early {
        Some(result) => result,
        None => server_task.await,
    };
    maintenance_task.await?;
    server_result?.context("웹 서버 실행 실패")?;

    info!("ILO URL 메트릭 서버 종료");
    Ok(())
}
