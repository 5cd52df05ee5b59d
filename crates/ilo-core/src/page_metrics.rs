//! 레거시 페이지 메트릭 그룹핑.
//!
//! 그룹 컬렉션 도입 전의 저장 방식. 새 메트릭을 목록 앞에 붙이고
//! 브레이크포인트 버킷마다 앞쪽(최신) `sample_size`개만 남긴다.
//! 신선도 판정은 하지 않는다.
//!
//! 라이브러리 전용 API. 서버의 저장 경로는 그룹 컬렉션만 쓰며, 이 모듈은
//! 레거시 형식 데이터를 다루는 호출자를 위해 남겨 둔다. 버킷당 샘플 수 기본값은
//! [`PageMetricsConfig::sample_size`](crate::config::PageMetricsConfig::sample_size).

use crate::models::collection::GroupingSettings;
use crate::models::url_metric::UrlMetric;

/// 페이지 메트릭을 브레이크포인트 버킷별로 분류
///
/// 버킷 범위는 [`GroupingSettings::width_ranges`]와 같으며 각 메트릭은 정확히 한 버킷에 들어간다.
/// 버킷 안의 순서는 입력 순서를 따른다.
pub fn group_page_metrics_by_breakpoint(
    page_metrics: Vec<UrlMetric>,
    settings: &GroupingSettings,
) -> Vec<Vec<UrlMetric>> {
    let ranges = settings.width_ranges();
    let mut groups: Vec<Vec<UrlMetric>> = vec![Vec::new(); ranges.len()];

    for metric in page_metrics {
        let width = metric.viewport_width();
        if let Some(index) = ranges
            .iter()
            .position(|(minimum, maximum)| width >= *minimum && width <= *maximum)
        {
            groups[index].push(metric);
        }
    }
    groups
}

/// 새 페이지 메트릭을 앞에 붙이고 버킷별로 `sample_size`개까지 잘라 평탄화
pub fn unshift_page_metrics(
    mut page_metrics: Vec<UrlMetric>,
    validated_page_metric: UrlMetric,
    settings: &GroupingSettings,
    sample_size: usize,
) -> Vec<UrlMetric> {
    page_metrics.insert(0, validated_page_metric);

    group_page_metrics_by_breakpoint(page_metrics, settings)
        .into_iter()
        .flat_map(|mut group| {
            group.truncate(sample_size);
            group
        })
        .collect()
}
