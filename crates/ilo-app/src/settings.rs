//! 환경변수 설정 오버라이드.
//!
//! 설정 파일 값 위에 `ILO_` 접두사 환경변수를 덮어쓴다.
//! 섹션 구분은 `__` (예: `ILO_WEB__PORT=8080`, `ILO_URL_METRICS__BREAKPOINTS=320,782`).

use anyhow::{Context, Result};
use config::{Config, Environment};
use ilo_core::config::AppConfig;

/// 환경변수 접두사
const ENV_PREFIX: &str = "ILO";

/// 프로세스 환경변수 소스
pub fn process_environment() -> Environment {
    environment()
}

/// 주어진 키/값을 환경변수 대신 쓰는 소스
#[cfg(test)]
pub fn environment_from(vars: &[(&str, &str)]) -> Environment {
    let source: config::Map<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    environment().source(Some(source))
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("url_metrics.breakpoints")
}

/// 설정 파일 값에 환경변수 오버라이드 적용
pub fn apply_env_overrides(base: &AppConfig, environment: Environment) -> Result<AppConfig> {
    let merged = Config::builder()
        .add_source(Config::try_from(base).context("기본 설정 변환 실패")?)
        .add_source(environment)
        .build()
        .context("설정 병합 실패")?;

    merged
        .try_deserialize::<AppConfig>()
        .context("환경변수 설정 파싱 실패")
}
