//! 애플리케이션 설정 구조체.
//!
//! 브레이크포인트, 샘플 크기, 신선도 TTL, 저장 잠금 TTL, 논스 비밀키 등
//! 런타임 설정을 정의한다. JSON 설정 파일과 환경변수에서 로드.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 최상위 애플리케이션 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 웹 서버 설정
    #[serde(default)]
    pub web: WebConfig,
    /// 로컬 저장소 설정
    #[serde(default)]
    pub storage: StorageConfig,
    /// URL 메트릭 수집 설정
    #[serde(default)]
    pub url_metrics: UrlMetricsConfig,
    /// 레거시 페이지 메트릭 설정
    #[serde(default)]
    pub page_metrics: PageMetricsConfig,
    /// 논스 설정
    #[serde(default)]
    pub nonce: NonceConfig,
}

// ============================================================
// 웹 서버 설정
// ============================================================

/// 웹 서버 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// 웹 서버 포트 (기본: 9090)
    #[serde(default = "default_web_port")]
    pub port: u16,
    /// 외부 접근 허용 여부 (false: 127.0.0.1 only)
    #[serde(default)]
    pub allow_external: bool,
    /// 사이트 URL: 제출된 `url`은 이 origin과 같아야 한다
    #[serde(default = "default_site_url")]
    pub site_url: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            port: default_web_port(),
            allow_external: false,
            site_url: default_site_url(),
        }
    }
}

// ============================================================
// 저장소 설정
// ============================================================

/// 로컬 저장소 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite 파일 이름 (데이터 디렉토리 기준)
    #[serde(default = "default_db_file_name")]
    pub db_file_name: String,
    /// 갱신되지 않은 슬러그 레코드 보존 기간 (일)
    #[serde(default = "default_keep_days")]
    pub keep_days: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_file_name: default_db_file_name(),
            keep_days: default_keep_days(),
        }
    }
}

// ============================================================
// URL 메트릭 설정
// ============================================================

/// URL 메트릭 수집 설정
///
/// 값은 부호 있는 정수로 받는다. 범위 검증은
/// [`UrlMetricsGroupCollection`](crate::models::collection::UrlMetricsGroupCollection) 생성 시 수행.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlMetricsConfig {
    /// 브레이크포인트 (최대 뷰포트 너비, px)
    #[serde(default = "default_breakpoints")]
    pub breakpoints: Vec<i64>,
    /// 그룹당 최대 보관 샘플 수
    #[serde(default = "default_url_metrics_sample_size")]
    pub sample_size: i64,
    /// 샘플 신선도 TTL (초)
    #[serde(default = "default_freshness_ttl_secs")]
    pub freshness_ttl_secs: i64,
    /// 방문자별 저장 잠금 TTL (초, 0 = 잠금 비활성화)
    #[serde(default = "default_storage_lock_ttl_secs")]
    pub storage_lock_ttl_secs: u64,
}

impl Default for UrlMetricsConfig {
    fn default() -> Self {
        Self {
            breakpoints: default_breakpoints(),
            sample_size: default_url_metrics_sample_size(),
            freshness_ttl_secs: default_freshness_ttl_secs(),
            storage_lock_ttl_secs: default_storage_lock_ttl_secs(),
        }
    }
}

// ============================================================
// 레거시 페이지 메트릭 설정
// ============================================================

/// 레거시 페이지 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageMetricsConfig {
    /// 브레이크포인트당 샘플 수
    #[serde(default = "default_page_metrics_sample_size")]
    pub sample_size: usize,
}

impl Default for PageMetricsConfig {
    fn default() -> Self {
        Self {
            sample_size: default_page_metrics_sample_size(),
        }
    }
}

// ============================================================
// 논스 설정
// ============================================================

/// 논스 설정: 저장 요청 인가용 HMAC 키와 수명
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonceConfig {
    /// HMAC 비밀키 (빈 값이면 설정 파일 생성 시 자동 생성)
    #[serde(default)]
    pub secret: String,
    /// 논스 수명 (초)
    #[serde(default = "default_nonce_lifetime_secs")]
    pub lifetime_secs: u64,
}

impl Default for NonceConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            lifetime_secs: default_nonce_lifetime_secs(),
        }
    }
}

impl AppConfig {
    /// 기본 설정값 반환
    pub fn default_config() -> Self {
        Self {
            web: WebConfig::default(),
            storage: StorageConfig::default(),
            url_metrics: UrlMetricsConfig::default(),
            page_metrics: PageMetricsConfig::default(),
            nonce: NonceConfig::default(),
        }
    }

    /// 저장 잠금 TTL을 Duration으로 반환
    pub fn storage_lock_ttl(&self) -> Duration {
        Duration::from_secs(self.url_metrics.storage_lock_ttl_secs)
    }

    /// 논스 수명을 Duration으로 반환
    pub fn nonce_lifetime(&self) -> Duration {
        Duration::from_secs(self.nonce.lifetime_secs)
    }
}

// ============================================================
// 기본값 함수
// ============================================================

fn default_web_port() -> u16 {
    9090
}
fn default_site_url() -> String {
    "http://localhost:9090".to_string()
}
fn default_db_file_name() -> String {
    "url-metrics.db".to_string()
}
fn default_keep_days() -> u32 {
    30
}
fn default_breakpoints() -> Vec<i64> {
    vec![480]
}
fn default_url_metrics_sample_size() -> i64 {
    3
}
fn default_freshness_ttl_secs() -> i64 {
    86_400 // 1일
}
fn default_storage_lock_ttl_secs() -> u64 {
    60
}
fn default_page_metrics_sample_size() -> usize {
    10
}
fn default_nonce_lifetime_secs() -> u64 {
    86_400
}
