//! 저장 요청 논스.
//!
//! 서버가 렌더링 시 슬러그별로 발급하고, 저장 요청에서 되돌려 받아 검증한다.
//! 수명을 반으로 나눈 틱 단위로 값이 바뀌며 현재/직전 틱의 논스를 받아들인다.

use std::time::Duration;

use hmac::{Hmac, Mac};
use ilo_core::error::CoreError;
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

static NONCE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-f]+$").expect("논스 패턴 컴파일 실패"));

/// 슬러그별 저장 동작 이름
pub fn url_metrics_storage_action(slug: &str) -> String {
    format!("store_url_metrics:{slug}")
}

/// 논스 형식 검사 (소문자 hex)
pub fn is_valid_nonce_format(nonce: &str) -> bool {
    NONCE_PATTERN.is_match(nonce)
}

/// HMAC-SHA256 논스 발급/검증기
#[derive(Clone)]
pub struct NonceService {
    mac: HmacSha256,
    lifetime: Duration,
}

impl std::fmt::Debug for NonceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceService")
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

impl NonceService {
    /// 비밀키와 수명으로 생성
    pub fn new(secret: &str, lifetime: Duration) -> Result<Self, CoreError> {
        if secret.is_empty() {
            return Err(CoreError::Config("논스 비밀키가 비어 있음".to_string()));
        }
        if lifetime.as_secs() < 2 {
            return Err(CoreError::Config(format!(
                "논스 수명이 너무 짧음: {}초",
                lifetime.as_secs()
            )));
        }
        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| CoreError::Config(format!("논스 키 초기화 실패: {e}")))?;
        Ok(Self { mac, lifetime })
    }

    /// 논스 수명
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// `now` 시점의 틱 (`ceil(now / (lifetime / 2))`)
    pub fn tick(&self, now: f64) -> i64 {
        let half = self.lifetime.as_secs_f64() / 2.0;
        (now / half).ceil() as i64
    }

    /// 동작에 대한 논스 발급
    pub fn create(&self, action: &str, now: f64) -> String {
        self.digest(action, self.tick(now))
    }

    /// 논스 검증 (현재 또는 직전 틱)
    pub fn verify(&self, nonce: &str, action: &str, now: f64) -> bool {
        if !is_valid_nonce_format(nonce) {
            return false;
        }
        let Ok(expected) = hex::decode(nonce) else {
            return false;
        };
        let tick = self.tick(now);
        [tick, tick - 1]
            .into_iter()
            .any(|t| self.keyed(action, t).verify_slice(&expected).is_ok())
    }

    fn digest(&self, action: &str, tick: i64) -> String {
        hex::encode(self.keyed(action, tick).finalize().into_bytes())
    }

    fn keyed(&self, action: &str, tick: i64) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(tick.to_string().as_bytes());
        mac.update(b"|");
        mac.update(action.as_bytes());
        mac
    }
}
