//! 현재 시각.
//!
//! 도메인 로직은 `now`를 인자로 받는다. 요청 처리 시작 시 여기서 한 번 읽어 넘긴다.

use chrono::Utc;

/// Unix epoch 기준 현재 시각 (초, 마이크로초 정밀도)
pub fn now_timestamp() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
