//! URL 메트릭 그룹 컬렉션.
//!
//! 한 URL(슬러그)의 모든 메트릭을 브레이크포인트 기준으로
//! 빈틈/겹침 없는 `len(breakpoints) + 1`개의 그룹으로 분할한다.
//!
//! ```text
//! breakpoints = [480, 782]
//! [0 ..= 480] [481 ..= 782] [783 ..= u32::MAX]
//! ```

use serde::Serialize;

use super::group::UrlMetricsGroup;
use super::url_metric::UrlMetric;
use crate::config::UrlMetricsConfig;
use crate::error::CoreError;

/// 검증된 그룹 분할 설정
///
/// 브레이크포인트는 오름차순 정렬 + 중복 제거되어 있고 모두 양수이다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupingSettings {
    breakpoints: Vec<u32>,
    sample_size: usize,
    freshness_ttl: u64,
}

impl GroupingSettings {
    /// 원시 설정값을 정규화/검증
    pub fn new(breakpoints: &[i64], sample_size: i64, freshness_ttl: i64) -> Result<Self, CoreError> {
        let mut sorted = breakpoints.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let breakpoints = sorted
            .into_iter()
            .map(|breakpoint| {
                if breakpoint <= 0 {
                    return Err(CoreError::validation(
                        "breakpoints",
                        format!("모든 브레이크포인트는 0보다 커야 함: {breakpoint}"),
                    ));
                }
                // 마지막 그룹의 시작(breakpoint + 1)이 표현 가능해야 한다
                u32::try_from(breakpoint)
                    .ok()
                    .filter(|b| *b < u32::MAX)
                    .ok_or_else(|| {
                        CoreError::validation(
                            "breakpoints",
                            format!("브레이크포인트가 최대 너비를 넘음: {breakpoint}"),
                        )
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if sample_size <= 0 {
            return Err(CoreError::validation(
                "sample_size",
                format!("샘플 크기는 0보다 커야 함: {sample_size}"),
            ));
        }
        let sample_size = usize::try_from(sample_size)
            .map_err(|_| CoreError::validation("sample_size", "샘플 크기가 너무 큼"))?;

        if freshness_ttl < 0 {
            return Err(CoreError::validation(
                "freshness_ttl",
                format!("신선도 TTL은 0 이상이어야 함: {freshness_ttl}"),
            ));
        }

        Ok(Self {
            breakpoints,
            sample_size,
            freshness_ttl: freshness_ttl as u64,
        })
    }

    /// 설정 파일 섹션에서 생성
    pub fn from_config(config: &UrlMetricsConfig) -> Result<Self, CoreError> {
        Self::new(
            &config.breakpoints,
            config.sample_size,
            config.freshness_ttl_secs,
        )
    }

    /// 정규화된 브레이크포인트
    pub fn breakpoints(&self) -> &[u32] {
        &self.breakpoints
    }

    /// 그룹당 샘플 크기
    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// 신선도 TTL (초)
    pub fn freshness_ttl(&self) -> u64 {
        self.freshness_ttl
    }

    /// 그룹 수 (`breakpoints + 1`)
    pub fn group_count(&self) -> usize {
        self.breakpoints.len() + 1
    }

    /// 각 그룹의 `(최소, 최대)` 너비 범위 (양끝 포함)
    ///
    /// 첫 그룹은 0에서 시작하고, 다음 그룹은 이전 브레이크포인트 + 1에서 시작하며,
    /// 마지막 그룹은 `u32::MAX`에서 끝난다.
    pub fn width_ranges(&self) -> Vec<(u32, u32)> {
        let mut ranges = Vec::with_capacity(self.group_count());
        let mut minimum = 0;
        for &maximum in &self.breakpoints {
            ranges.push((minimum, maximum));
            minimum = maximum + 1;
        }
        ranges.push((minimum, u32::MAX));
        ranges
    }
}

/// 브레이크포인트 기준 URL 메트릭 그룹 컬렉션
///
/// 요청마다 저장된 메트릭 목록으로 새로 만들고, 결과는
/// [`merged_url_metrics`](Self::merged_url_metrics)로 평탄화해 저장한다.
#[derive(Debug, Clone, PartialEq)]
pub struct UrlMetricsGroupCollection {
    groups: Vec<UrlMetricsGroup>,
    settings: GroupingSettings,
}

impl UrlMetricsGroupCollection {
    /// 원시 설정값으로 컬렉션 생성
    ///
    /// 브레이크포인트 ≤ 0, 샘플 크기 ≤ 0, 신선도 TTL < 0 이면 `Validation` 에러.
    pub fn new(
        url_metrics: Vec<UrlMetric>,
        breakpoints: &[i64],
        sample_size: i64,
        freshness_ttl: i64,
    ) -> Result<Self, CoreError> {
        let settings = GroupingSettings::new(breakpoints, sample_size, freshness_ttl)?;
        Ok(Self::with_settings(url_metrics, settings))
    }

    /// 검증된 설정으로 컬렉션 생성
    pub fn with_settings(url_metrics: Vec<UrlMetric>, settings: GroupingSettings) -> Self {
        let groups = settings
            .width_ranges()
            .into_iter()
            .map(|(minimum, maximum)| {
                UrlMetricsGroup::new(
                    Vec::new(),
                    minimum,
                    maximum,
                    settings.sample_size,
                    settings.freshness_ttl,
                )
            })
            .collect();

        let mut collection = Self { groups, settings };
        for url_metric in url_metrics {
            // 전 범위를 덮으므로 어느 그룹에도 안 들어가는 경우는 없다
            collection.add_url_metric(url_metric);
        }
        collection
    }

    /// 뷰포트 너비에 맞는 첫 그룹에 메트릭 추가
    ///
    /// 그룹이 샘플 크기에 도달해 있으면 가장 오래된 메트릭이 밀려난다.
    pub fn add_url_metric(&mut self, url_metric: UrlMetric) -> bool {
        let width = i64::from(url_metric.viewport_width());
        match self
            .groups
            .iter_mut()
            .find(|group| group.is_viewport_width_in_range(width))
        {
            Some(group) => group.add_url_metric(url_metric),
            None => false,
        }
    }

    /// 그룹 목록 (최소 너비 오름차순)
    pub fn groups(&self) -> &[UrlMetricsGroup] {
        &self.groups
    }

    /// 분할 설정
    pub fn settings(&self) -> &GroupingSettings {
        &self.settings
    }

    /// 뷰포트 너비에 해당하는 그룹
    ///
    /// 음수 너비일 때만 `OutOfRange` 에러.
    pub fn group_for_viewport_width(&self, viewport_width: i64) -> Result<&UrlMetricsGroup, CoreError> {
        self.groups
            .iter()
            .find(|group| group.is_viewport_width_in_range(viewport_width))
            .ok_or(CoreError::OutOfRange {
                width: viewport_width,
            })
    }

    /// 모든 그룹에 메트릭이 하나 이상 있는지 여부
    ///
    /// 샘플 크기를 채웠거나 신선한지는 보지 않는다.
    /// [`is_every_group_complete`](Self::is_every_group_complete)와 대비.
    pub fn is_every_group_populated(&self) -> bool {
        self.groups.iter().all(|group| !group.is_empty())
    }

    /// 모든 그룹이 완성되었는지 여부
    pub fn is_every_group_complete(&self, now: f64) -> bool {
        self.groups.iter().all(|group| group.is_complete(now))
    }

    /// 전체 메트릭을 그룹 순서대로 이어붙인 목록 (전역 정렬 없음)
    pub fn merged_url_metrics(&self) -> Vec<UrlMetric> {
        self.groups
            .iter()
            .flat_map(|group| group.url_metrics().iter().cloned())
            .collect()
    }

    /// 컬렉션을 소비하여 병합 목록 반환
    pub fn into_merged_url_metrics(self) -> Vec<UrlMetric> {
        self.groups
            .into_iter()
            .flat_map(UrlMetricsGroup::into_url_metrics)
            .collect()
    }

    /// 전체 메트릭 수
    pub fn total_count(&self) -> usize {
        self.groups.iter().map(UrlMetricsGroup::count).sum()
    }
}
