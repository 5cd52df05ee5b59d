//! URL 메트릭 그룹.
//!
//! 뷰포트 너비가 `[minimum, maximum]` (양끝 포함) 범위에 드는 메트릭만 보관하는
//! 고정 용량 버킷. 용량을 넘으면 가장 오래된 메트릭부터 밀려나고,
//! 가득 차 있어도 오래된(신선도 TTL 초과) 메트릭이 있으면 미완성으로 본다.

use std::cmp::Ordering;

use super::url_metric::UrlMetric;

/// 브레이크포인트 사이 뷰포트 너비 범위의 URL 메트릭 묶음
///
/// 범위 검증은 하지 않는다. 검증된 값으로 만드는 것은
/// [`UrlMetricsGroupCollection`](super::collection::UrlMetricsGroupCollection)의 책임.
#[derive(Debug, Clone, PartialEq)]
pub struct UrlMetricsGroup {
    url_metrics: Vec<UrlMetric>,
    minimum_viewport_width: u32,
    maximum_viewport_width: u32,
    sample_size: usize,
    freshness_ttl: u64,
}

impl UrlMetricsGroup {
    /// 새 그룹 생성
    ///
    /// 초기 메트릭은 범위/용량 검사 없이 그대로 보관한다.
    pub fn new(
        url_metrics: Vec<UrlMetric>,
        minimum_viewport_width: u32,
        maximum_viewport_width: u32,
        sample_size: usize,
        freshness_ttl: u64,
    ) -> Self {
        Self {
            url_metrics,
            minimum_viewport_width,
            maximum_viewport_width,
            sample_size,
            freshness_ttl,
        }
    }

    /// 최소 뷰포트 너비 (포함)
    pub fn minimum_viewport_width(&self) -> u32 {
        self.minimum_viewport_width
    }

    /// 최대 뷰포트 너비 (포함)
    pub fn maximum_viewport_width(&self) -> u32 {
        self.maximum_viewport_width
    }

    /// 그룹 샘플 크기
    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// 신선도 TTL (초)
    pub fn freshness_ttl(&self) -> u64 {
        self.freshness_ttl
    }

    /// 뷰포트 너비가 그룹 범위에 드는지 확인
    pub fn is_viewport_width_in_range(&self, viewport_width: i64) -> bool {
        viewport_width >= i64::from(self.minimum_viewport_width)
            && viewport_width <= i64::from(self.maximum_viewport_width)
    }

    /// 범위 안이면 메트릭 추가
    ///
    /// 샘플 크기를 넘으면 타임스탬프 내림차순으로 안정 정렬한 뒤
    /// 가장 최신 `sample_size`개만 남긴다.
    pub fn add_url_metric(&mut self, url_metric: UrlMetric) -> bool {
        if !self.is_viewport_width_in_range(i64::from(url_metric.viewport_width())) {
            return false;
        }

        self.url_metrics.push(url_metric);

        if self.url_metrics.len() > self.sample_size {
            // 동일 타임스탬프는 삽입 순서 유지 (sort_by는 안정 정렬)
            self.url_metrics.sort_by(|a, b| {
                b.timestamp()
                    .partial_cmp(&a.timestamp())
                    .unwrap_or(Ordering::Equal)
            });
            self.url_metrics.truncate(self.sample_size);
        }
        true
    }

    /// 그룹 완성 여부
    ///
    /// 샘플 크기만큼 차 있고 모든 메트릭이 `timestamp + freshness_ttl >= now`이면 완성.
    /// `now`는 호출자가 요청당 한 번 읽어 넘긴다.
    pub fn is_complete(&self, now: f64) -> bool {
        if self.url_metrics.len() < self.sample_size {
            return false;
        }
        let ttl = self.freshness_ttl as f64;
        self.url_metrics
            .iter()
            .all(|metric| metric.timestamp() + ttl >= now)
    }

    /// 추가 샘플이 필요한지 여부 (`!is_complete`)
    pub fn is_lacking(&self, now: f64) -> bool {
        !self.is_complete(now)
    }

    /// 그룹의 URL 메트릭
    pub fn url_metrics(&self) -> &[UrlMetric] {
        &self.url_metrics
    }

    /// 그룹의 메트릭 수
    pub fn count(&self) -> usize {
        self.url_metrics.len()
    }

    /// 그룹이 비었는지 여부
    pub fn is_empty(&self) -> bool {
        self.url_metrics.is_empty()
    }

    pub(crate) fn into_url_metrics(self) -> Vec<UrlMetric> {
        self.url_metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::url_metric::{ElementObservation, Viewport};

    const HOUR: u64 = 3_600;
    const NOW: f64 = 1_700_000_000.0;

    fn metric(width: u32, timestamp: f64) -> UrlMetric {
        let element =
            ElementObservation::new(true, true, "/*[0][self::HTML]/*[1][self::BODY]", 1.0).unwrap();
        UrlMetric::new(Viewport::new(width, 640).unwrap(), timestamp, vec![element]).unwrap()
    }

    #[test]
    fn range_is_inclusive() {
        let group = UrlMetricsGroup::new(Vec::new(), 481, 782, 3, HOUR);
        assert!(!group.is_viewport_width_in_range(480));
        assert!(group.is_viewport_width_in_range(481));
        assert!(group.is_viewport_width_in_range(782));
        assert!(!group.is_viewport_width_in_range(783));
        assert!(!group.is_viewport_width_in_range(-1));
    }

    #[test]
    fn out_of_range_metric_is_rejected_without_mutation() {
        let mut group = UrlMetricsGroup::new(Vec::new(), 0, 480, 3, HOUR);
        assert!(!group.add_url_metric(metric(600, NOW)));
        assert_eq!(group.count(), 0);
        assert!(group.add_url_metric(metric(480, NOW)));
        assert_eq!(group.count(), 1);
    }

    #[test]
    fn over_capacity_evicts_oldest() {
        let mut group = UrlMetricsGroup::new(Vec::new(), 0, 480, 3, HOUR);
        for ts in [NOW - 30.0, NOW - 10.0, NOW - 20.0] {
            group.add_url_metric(metric(400, ts));
        }
        // 용량 이하에서는 삽입 순서 그대로
        let timestamps: Vec<f64> = group.url_metrics().iter().map(|m| m.timestamp()).collect();
        assert_eq!(timestamps, vec![NOW - 30.0, NOW - 10.0, NOW - 20.0]);

        group.add_url_metric(metric(400, NOW));
        let timestamps: Vec<f64> = group.url_metrics().iter().map(|m| m.timestamp()).collect();
        assert_eq!(timestamps, vec![NOW, NOW - 10.0, NOW - 20.0]);
    }

    #[test]
    fn older_than_everything_is_dropped_immediately() {
        let mut group = UrlMetricsGroup::new(Vec::new(), 0, 480, 2, HOUR);
        group.add_url_metric(metric(400, NOW));
        group.add_url_metric(metric(400, NOW - 1.0));
        assert!(group.add_url_metric(metric(400, NOW - 100.0)));
        assert_eq!(group.count(), 2);
        assert!(group.url_metrics().iter().all(|m| m.timestamp() >= NOW - 1.0));
    }

    #[test]
    fn equal_timestamps_keep_insertion_order() {
        let mut group = UrlMetricsGroup::new(Vec::new(), 0, 1_000, 2, HOUR);
        group.add_url_metric(metric(100, NOW));
        group.add_url_metric(metric(200, NOW));
        group.add_url_metric(metric(300, NOW));
        let widths: Vec<u32> = group.url_metrics().iter().map(|m| m.viewport_width()).collect();
        assert_eq!(widths, vec![100, 200]);
    }

    #[test]
    fn completeness_requires_full_and_fresh_sample() {
        let mut group = UrlMetricsGroup::new(Vec::new(), 0, 480, 3, HOUR);
        assert!(!group.is_complete(NOW));
        assert!(group.is_lacking(NOW));

        for _ in 0..3 {
            group.add_url_metric(metric(400, NOW - 3_599.0));
        }
        assert!(group.is_complete(NOW));

        let stale = UrlMetricsGroup::new(
            vec![
                metric(400, NOW - 3_601.0),
                metric(400, NOW),
                metric(400, NOW),
            ],
            0,
            480,
            3,
            HOUR,
        );
        assert!(!stale.is_complete(NOW));
    }

    #[test]
    fn exact_ttl_boundary_is_still_fresh() {
        let group = UrlMetricsGroup::new(vec![metric(400, NOW - 3_600.0)], 0, 480, 1, HOUR);
        assert!(group.is_complete(NOW));
    }

    #[test]
    fn zero_ttl_makes_any_past_sample_stale() {
        let group = UrlMetricsGroup::new(vec![metric(400, NOW - 0.5)], 0, 480, 1, 0);
        assert!(!group.is_complete(NOW));
        assert!(group.is_complete(NOW - 0.5));
    }
}
