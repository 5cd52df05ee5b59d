//! 방문자 식별 추출기.
//!
//! 저장 잠금은 방문자 IP 단위다. 연결 주소를 우선 쓰고,
//! 연결 정보가 없을 때(프록시 뒤, 테스트)만 `X-Forwarded-For` 첫 항목을 쓴다.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use sha2::{Digest, Sha256};

/// 방문자 주소를 알 수 없을 때의 키
const UNKNOWN_VISITOR: &str = "unknown";

/// 요청한 방문자
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitorKey {
    ip: String,
}

impl VisitorKey {
    pub fn from_ip(ip: impl Into<String>) -> Self {
        Self { ip: ip.into() }
    }

    /// 방문자 IP (알 수 없으면 `unknown`)
    pub fn ip(&self) -> &str {
        &self.ip
    }

    /// 저장 잠금 키 (`url_metrics_storage_lock_{sha256(ip) 앞 32자리}`)
    pub fn lock_key(&self) -> String {
        let digest = format!("{:x}", Sha256::digest(self.ip.as_bytes()));
        format!("url_metrics_storage_lock_{}", &digest[..32])
    }
}

impl<S> FromRequestParts<S> for VisitorKey
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
            return Ok(Self::from_ip(addr.ip().to_string()));
        }

        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        Ok(Self::from_ip(forwarded.unwrap_or(UNKNOWN_VISITOR)))
    }
}
