//! # ilo-web
//!
//! URL 메트릭 수집 REST 서버.
//! Axum 기반으로 방문자 브라우저가 측정한 URL 메트릭을 받아 저장하고,
//! 서버 렌더링 단계가 참고할 그룹 상태를 조회한다.
//!
//! ## 엔드포인트
//! - `POST /image-loading-optimization/v1/url-metrics:store`: URL 메트릭 저장
//! - `GET /image-loading-optimization/v1/url-metrics/{slug}`: 그룹 상태, 필요 너비, 논스

pub mod error;
pub mod handlers;
pub mod nonce;
pub mod routes;
pub mod server_timing;
pub mod visitor;

use axum::Router;
use ilo_core::config::{AppConfig, WebConfig};
use ilo_core::error::CoreError;
use ilo_core::models::collection::GroupingSettings;
use ilo_core::ports::storage::{StorageLock, UrlMetricsStorage};
use ilo_storage::sqlite::SqliteStorage;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use url::Url;

use crate::nonce::NonceService;

/// REST 네임스페이스
pub const REST_NAMESPACE: &str = "/image-loading-optimization/v1";

/// 포트 바인드 최대 시도 횟수
const MAX_PORT_ATTEMPTS: u16 = 10;

/// 웹 서버 애플리케이션 상태
#[derive(Clone)]
pub struct AppState {
    /// URL 메트릭 저장소
    pub url_metrics: Arc<dyn UrlMetricsStorage>,
    /// 방문자별 저장 잠금
    pub locks: Arc<dyn StorageLock>,
    /// 검증된 그룹핑 설정
    pub grouping: GroupingSettings,
    /// 저장 잠금 TTL (0 = 잠금 비활성화)
    pub storage_lock_ttl: Duration,
    /// 사이트 URL (제출 URL의 origin 기준)
    pub site_url: Arc<Url>,
    /// 논스 발급/검증기
    pub nonce: Arc<NonceService>,
}

impl AppState {
    /// 저장소와 설정으로 상태 생성
    ///
    /// 그룹핑 설정, 사이트 URL, 논스 설정을 여기서 한 번 검증한다.
    pub fn new(storage: Arc<SqliteStorage>, config: &AppConfig) -> Result<Self, CoreError> {
        let grouping = GroupingSettings::from_config(&config.url_metrics)?;
        let site_url = Url::parse(&config.web.site_url).map_err(|e| {
            CoreError::Config(format!("잘못된 사이트 URL {}: {e}", config.web.site_url))
        })?;
        let nonce = NonceService::new(&config.nonce.secret, config.nonce_lifetime())?;

        Ok(Self {
            url_metrics: storage.clone(),
            locks: storage,
            grouping,
            storage_lock_ttl: config.storage_lock_ttl(),
            site_url: Arc::new(site_url),
            nonce: Arc::new(nonce),
        })
    }
}

/// 라우터 구성 (레이어 포함, 상태 주입 완료)
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest(REST_NAMESPACE, routes::api_routes())
        .fallback(handlers::not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// URL 메트릭 수집 서버
pub struct WebServer {
    config: WebConfig,
    state: AppState,
}

impl WebServer {
    /// 새 웹 서버 생성
    pub fn new(storage: Arc<SqliteStorage>, config: &AppConfig) -> Result<Self, CoreError> {
        Ok(Self {
            config: config.web.clone(),
            state: AppState::new(storage, config)?,
        })
    }

    /// 서버 실행
    ///
    /// 기본 포트에서 시작하여, 포트가 이미 사용 중이면 다음 포트를 시도합니다.
    /// 최대 10개 포트를 시도한 후 실패하면 에러를 반환합니다.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) -> Result<(), std::io::Error> {
        let host = if self.config.allow_external {
            "0.0.0.0"
        } else {
            "127.0.0.1"
        };

        let app = build_router(self.state);

        let base_port = self.config.port;
        let mut last_error = None;

        for attempt in 0..MAX_PORT_ATTEMPTS {
            let port = base_port.saturating_add(attempt);

            // u16 끝에 도달하면 같은 포트를 반복하게 됨
            if port == base_port && attempt > 0 {
                break;
            }

            let addr: SocketAddr = match format!("{}:{}", host, port).parse() {
                Ok(a) => a,
                Err(e) => {
                    error!("잘못된 주소 {}:{}: {}", host, port, e);
                    continue;
                }
            };

            match TcpListener::bind(addr).await {
                Ok(listener) => {
                    if attempt > 0 {
                        warn!("포트 {} 사용 불가, 대체 포트 {} 사용", base_port, port);
                    }
                    info!("URL 메트릭 서버 시작: http://{}{}", addr, REST_NAMESPACE);

                    axum::serve(
                        listener,
                        app.into_make_service_with_connect_info::<SocketAddr>(),
                    )
                    .with_graceful_shutdown(async move {
                        loop {
                            if *shutdown_rx.borrow() {
                                info!("웹 서버 종료 신호 수신");
                                break;
                            }
                            if shutdown_rx.changed().await.is_err() {
                                break;
                            }
                        }
                    })
                    .await?;

                    info!("URL 메트릭 서버 종료");
                    return Ok(());
                }
                Err(e) => {
                    if e.kind() == std::io::ErrorKind::AddrInUse {
                        warn!("포트 {} 이미 사용 중, 다음 포트 시도...", port);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::AddrInUse,
                format!(
                    "포트 {}-{} 모두 사용 불가",
                    base_port,
                    base_port.saturating_add(MAX_PORT_ATTEMPTS - 1)
                ),
            )
        }))
    }

    /// 서버 URL 반환
    pub fn url(&self) -> String {
        format!("http://localhost:{}{}", self.config.port, REST_NAMESPACE)
    }
}
