//! 필요 뷰포트 너비 판정.
//!
//! 그룹 객체를 만들지 않고 브레이크포인트 버킷별로 새 샘플이 필요한지 계산하는
//! 순수 함수. 서버 렌더링 시 측정 스크립트 삽입 여부 판단과 저장 엔드포인트의
//! 수용 여부 판단이 같은 규칙을 쓴다.

use serde::Serialize;

use crate::error::CoreError;
use crate::models::collection::GroupingSettings;
use crate::models::url_metric::UrlMetric;

/// 버킷별 판정 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NeededWidth {
    /// 버킷 최소 뷰포트 너비 (포함)
    pub minimum_viewport_width: u32,
    /// 더 많은/더 신선한 샘플이 필요한지 여부
    pub needed: bool,
}

/// 원시 설정값으로 버킷별 필요 여부 계산
///
/// 설정 검증 규칙은 [`GroupingSettings::new`]와 같다.
pub fn compute_needed_widths(
    url_metrics: &[UrlMetric],
    now: f64,
    breakpoints: &[i64],
    sample_size: i64,
    freshness_ttl: i64,
) -> Result<Vec<NeededWidth>, CoreError> {
    let settings = GroupingSettings::new(breakpoints, sample_size, freshness_ttl)?;
    Ok(compute_needed_widths_with(url_metrics, now, &settings))
}

/// 검증된 설정으로 버킷별 필요 여부 계산
///
/// 버킷에 `sample_size`개 미만이 있거나, 하나라도 `timestamp + ttl < now`이면 필요.
/// 버킷 안의 개수는 용량 제한 없이 센다 (저장된 목록은 이미 용량 이하).
pub fn compute_needed_widths_with(
    url_metrics: &[UrlMetric],
    now: f64,
    settings: &GroupingSettings,
) -> Vec<NeededWidth> {
    let ttl = settings.freshness_ttl() as f64;

    settings
        .width_ranges()
        .into_iter()
        .map(|(minimum, maximum)| {
            let mut count = 0usize;
            let mut has_stale = false;
            for metric in url_metrics {
                let width = metric.viewport_width();
                if width < minimum || width > maximum {
                    continue;
                }
                count += 1;
                if metric.timestamp() + ttl < now {
                    has_stale = true;
                }
            }
            NeededWidth {
                minimum_viewport_width: minimum,
                needed: count < settings.sample_size() || has_stale,
            }
        })
        .collect()
}

/// 하나라도 필요한 버킷이 있는지 여부
pub fn needs_any_width(results: &[NeededWidth]) -> bool {
    results.iter().any(|result| result.needed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::collection::UrlMetricsGroupCollection;
    use crate::models::url_metric::{ElementObservation, Viewport};

    const HOUR: i64 = 3_600;
    const NOW: f64 = 1_700_000_000.0;

    fn metric_at(width: u32, timestamp: f64) -> UrlMetric {
        let element = ElementObservation::new(false, true, "/*[0][self::HTML]", 0.5).unwrap();
        UrlMetric::new(Viewport::new(width, 800).unwrap(), timestamp, vec![element]).unwrap()
    }

    fn filled() -> Vec<UrlMetric> {
        let mut metrics: Vec<UrlMetric> = (0..3).map(|_| metric_at(400, NOW)).collect();
        metrics.extend((0..3).map(|_| metric_at(600, NOW)));
        metrics
    }

    #[test]
    fn nothing_needed_when_all_buckets_full_and_fresh() {
        let results = compute_needed_widths(&filled(), NOW, &[480], 3, HOUR).unwrap();
        assert_eq!(
            results,
            vec![
                NeededWidth { minimum_viewport_width: 0, needed: false },
                NeededWidth { minimum_viewport_width: 481, needed: false },
            ]
        );
        assert!(!needs_any_width(&results));
    }

    #[test]
    fn larger_sample_size_makes_every_bucket_needed() {
        let results = compute_needed_widths(&filled(), NOW, &[480], 4, HOUR).unwrap();
        assert!(results.iter().all(|r| r.needed));
        assert!(needs_any_width(&results));
    }

    #[test]
    fn one_stale_metric_marks_only_its_bucket() {
        let mut metrics = filled();
        metrics[0] = metric_at(400, NOW - (HOUR as f64 + 1.0));
        let results = compute_needed_widths(&metrics, NOW, &[480], 3, HOUR).unwrap();
        let needed: Vec<bool> = results.iter().map(|r| r.needed).collect();
        assert_eq!(needed, vec![true, false]);
    }

    #[test]
    fn empty_input_needs_every_bucket() {
        let results = compute_needed_widths(&[], NOW, &[320, 480, 782], 3, HOUR).unwrap();
        let minimums: Vec<u32> = results.iter().map(|r| r.minimum_viewport_width).collect();
        assert_eq!(minimums, vec![0, 321, 481, 783]);
        assert!(results.iter().all(|r| r.needed));
    }

    #[test]
    fn invalid_settings_are_rejected() {
        assert!(compute_needed_widths(&[], NOW, &[-1], 3, HOUR).is_err());
        assert!(compute_needed_widths(&[], NOW, &[480], 0, HOUR).is_err());
        assert!(compute_needed_widths(&[], NOW, &[480], 3, -1).is_err());
    }

    #[test]
    fn agrees_with_group_completeness() {
        let mut metrics = filled();
        metrics.push(metric_at(1_200, NOW - 10.0));
        metrics[4] = metric_at(600, NOW - 7_200.0);

        let breakpoints = [480, 1_000];
        let collection = UrlMetricsGroupCollection::new(metrics.clone(), &breakpoints, 3, HOUR).unwrap();
        let results = compute_needed_widths(&metrics, NOW, &breakpoints, 3, HOUR).unwrap();

        for (group, result) in collection.groups().iter().zip(&results) {
            assert_eq!(group.minimum_viewport_width(), result.minimum_viewport_width);
            assert_eq!(group.is_lacking(NOW), result.needed);
        }
    }

    #[test]
    fn serializes_in_camel_case() {
        let json = serde_json::to_value(NeededWidth {
            minimum_viewport_width: 481,
            needed: true,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"minimumViewportWidth": 481, "needed": true}));
    }
}
