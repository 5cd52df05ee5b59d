//! 요청 단위 Server-Timing 측정.
//!
//! 요청마다 컨텍스트를 하나 만들고 구간별 소요 시간을 기록한 뒤
//! 응답에 `Server-Timing` 헤더로 붙인다.

use std::future::Future;
use std::time::{Duration, Instant};

use axum::http::{HeaderName, HeaderValue};
use axum::response::Response;
use tracing::debug;

/// `Server-Timing` 헤더 이름
pub const SERVER_TIMING: &str = "server-timing";

/// 전체 처리 시간 메트릭 이름
pub const TOTAL_METRIC: &str = "ilo-total";

/// 요청 하나의 Server-Timing 컨텍스트
#[derive(Debug)]
pub struct ServerTiming {
    started: Instant,
    metrics: Vec<(&'static str, Duration)>,
}

impl Default for ServerTiming {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerTiming {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            metrics: Vec::new(),
        }
    }

    /// 측정값 기록
    pub fn record(&mut self, name: &'static str, duration: Duration) {
        self.metrics.push((name, duration));
    }

    /// future 실행 시간을 측정해 기록
    pub async fn measure<F: Future>(&mut self, name: &'static str, future: F) -> F::Output {
        let started = Instant::now();
        let output = future.await;
        self.record(name, started.elapsed());
        output
    }

    /// 기록된 메트릭 (이름, 소요 시간)
    pub fn metrics(&self) -> &[(&'static str, Duration)] {
        &self.metrics
    }

    /// 헤더 값 (`ilo-load;dur=0.42, ilo-total;dur=1.03`, 밀리초)
    pub fn header_value(&self) -> String {
        self.metrics
            .iter()
            .copied()
            .chain(std::iter::once((TOTAL_METRIC, self.started.elapsed())))
            .map(|(name, duration)| {
                format!("{name};dur={:.2}", duration.as_secs_f64() * 1_000.0)
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// 응답에 `Server-Timing` 헤더 추가
    pub fn apply(&self, mut response: Response) -> Response {
        let value = self.header_value();
        debug!("Server-Timing: {value}");
        if let Ok(value) = HeaderValue::from_str(&value) {
            response
                .headers_mut()
                .append(HeaderName::from_static(SERVER_TIMING), value);
        }
        response
    }
}
