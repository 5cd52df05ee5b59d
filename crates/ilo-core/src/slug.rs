//! URL 메트릭 슬러그.
//!
//! 같은 쿼리 변수로 렌더링된 요청은 같은 슬러그를 공유한다.
//! 키 정렬된 JSON의 MD5 digest (32자리 소문자 hex).

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use md5::{Digest, Md5};

/// 슬러그 길이 (hex 문자 수)
pub const SLUG_LEN: usize = 32;

static SLUG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-f]{32}$").expect("슬러그 패턴 컴파일 실패"));

/// 쿼리 변수로 슬러그 계산
///
/// `BTreeMap`이라 키 순서가 정렬되어 있으므로 입력 순서와 무관하게 같은 값이 나온다.
pub fn url_metrics_slug(query_vars: &BTreeMap<String, Value>) -> String {
    // BTreeMap<String, Value> 직렬화는 실패하지 않는다
    let normalized = serde_json::to_string(query_vars).unwrap_or_default();
    format!("{:x}", Md5::digest(normalized.as_bytes()))
}

/// 슬러그 형식 검증 (`^[0-9a-f]{32}$`)
pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_PATTERN.is_match(slug)
}
