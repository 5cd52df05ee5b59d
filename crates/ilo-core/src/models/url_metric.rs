//! URL 메트릭 모델.
//!
//! 한 URL을 특정 뷰포트 너비에서 실제 사용자가 관측한 기록 1건.
//! 비정형 JSON 레코드 → 검증된 불변 값 객체의 2단계 파이프라인으로만 생성된다.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;

/// 요소 구조 경로 문법: `/*[0][self::HTML]/*[1][self::BODY]/*[0]` 형태
static XPATH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:/\*\[\d+\](?:\[self::[A-Za-z][A-Za-z0-9_-]*\])?)+$")
        .expect("XPath 패턴 컴파일 실패")
});

/// 뷰포트 크기 (px)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Viewport {
    width: u32,
    height: u32,
}

impl Viewport {
    /// 검증된 뷰포트 생성 (너비/높이 모두 양수)
    pub fn new(width: u32, height: u32) -> Result<Self, CoreError> {
        if width == 0 {
            return Err(CoreError::validation("viewport.width", "양의 정수여야 함"));
        }
        if height == 0 {
            return Err(CoreError::validation("viewport.height", "양의 정수여야 함"));
        }
        Ok(Self { width, height })
    }

    /// 뷰포트 너비
    pub fn width(&self) -> u32 {
        self.width
    }

    /// 뷰포트 높이
    pub fn height(&self) -> u32 {
        self.height
    }
}

/// 관측된 DOM 요소 1건
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementObservation {
    #[serde(rename = "isLCP")]
    is_lcp: bool,
    #[serde(rename = "isLCPCandidate")]
    is_lcp_candidate: bool,
    xpath: String,
    #[serde(rename = "intersectionRatio")]
    intersection_ratio: f64,
}

impl ElementObservation {
    /// 검증된 요소 관측 생성
    pub fn new(
        is_lcp: bool,
        is_lcp_candidate: bool,
        xpath: impl Into<String>,
        intersection_ratio: f64,
    ) -> Result<Self, CoreError> {
        let xpath = xpath.into();
        if !is_valid_xpath(&xpath) {
            return Err(CoreError::validation(
                "xpath",
                format!("구조 경로 형식이 아님: {xpath}"),
            ));
        }
        if !(0.0..=1.0).contains(&intersection_ratio) {
            return Err(CoreError::validation(
                "intersectionRatio",
                format!("0과 1 사이여야 함: {intersection_ratio}"),
            ));
        }
        Ok(Self {
            is_lcp,
            is_lcp_candidate,
            xpath,
            intersection_ratio,
        })
    }

    /// LCP 요소 여부
    pub fn is_lcp(&self) -> bool {
        self.is_lcp
    }

    /// LCP 후보 여부
    pub fn is_lcp_candidate(&self) -> bool {
        self.is_lcp_candidate
    }

    /// 요소 구조 경로
    pub fn xpath(&self) -> &str {
        &self.xpath
    }

    /// 뷰포트 교차 비율 (0.0 ~ 1.0)
    pub fn intersection_ratio(&self) -> f64 {
        self.intersection_ratio
    }
}

/// 검증된 URL 메트릭 (불변)
///
/// 직렬화 형식은 저장소/전송 레코드와 동일하다:
/// `{"viewport":{"width":..,"height":..},"timestamp":..,"elements":[..]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct UrlMetric {
    viewport: Viewport,
    timestamp: f64,
    elements: Vec<ElementObservation>,
}

impl UrlMetric {
    /// 검증된 구성 요소로 URL 메트릭 생성
    pub fn new(
        viewport: Viewport,
        timestamp: f64,
        elements: Vec<ElementObservation>,
    ) -> Result<Self, CoreError> {
        if !timestamp.is_finite() {
            return Err(CoreError::validation("timestamp", "유한한 숫자여야 함"));
        }
        Ok(Self {
            viewport,
            timestamp,
            elements,
        })
    }

    /// 비정형 JSON 레코드를 검증하여 URL 메트릭 생성
    pub fn from_value(value: &Value) -> Result<Self, CoreError> {
        let record = value
            .as_object()
            .ok_or_else(|| CoreError::validation("url_metric", "객체여야 함"))?;

        let viewport = parse_viewport(record.get("viewport"))?;

        let timestamp = record
            .get("timestamp")
            .and_then(Value::as_f64)
            .ok_or_else(|| CoreError::validation("timestamp", "숫자여야 함"))?;

        let elements = record
            .get("elements")
            .and_then(Value::as_array)
            .ok_or_else(|| CoreError::validation("elements", "배열이어야 함"))?
            .iter()
            .enumerate()
            .map(|(index, element)| parse_element(index, element))
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(viewport, timestamp, elements)
    }

    /// 같은 관측을 다른 타임스탬프로 복제 (서버 시각 대입용)
    pub fn with_timestamp(&self, timestamp: f64) -> Result<Self, CoreError> {
        Self::new(self.viewport, timestamp, self.elements.clone())
    }

    /// 뷰포트
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// 뷰포트 너비 (그룹 라우팅 기준)
    pub fn viewport_width(&self) -> u32 {
        self.viewport.width
    }

    /// 수집 시각 (Unix 초, 소수부 포함)
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// 관측된 요소 목록
    pub fn elements(&self) -> &[ElementObservation] {
        &self.elements
    }
}

impl TryFrom<Value> for UrlMetric {
    type Error = CoreError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(&value)
    }
}

/// 요소 구조 경로 문법 검사
pub fn is_valid_xpath(xpath: &str) -> bool {
    XPATH_PATTERN.is_match(xpath)
}

fn parse_viewport(value: Option<&Value>) -> Result<Viewport, CoreError> {
    let viewport = value
        .and_then(Value::as_object)
        .ok_or_else(|| CoreError::validation("viewport", "객체여야 함"))?;

    let width = positive_u32(viewport, "width", "viewport.width")?;
    let height = positive_u32(viewport, "height", "viewport.height")?;
    Viewport::new(width, height)
}

fn positive_u32(object: &Map<String, Value>, key: &str, field: &str) -> Result<u32, CoreError> {
    object
        .get(key)
        .and_then(Value::as_u64)
        .filter(|v| *v > 0)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| CoreError::validation(field, "양의 정수여야 함"))
}

fn parse_element(index: usize, value: &Value) -> Result<ElementObservation, CoreError> {
    let field = |name: &str| format!("elements[{index}].{name}");

    let element = value
        .as_object()
        .ok_or_else(|| CoreError::validation(format!("elements[{index}]"), "객체여야 함"))?;

    let is_lcp = element
        .get("isLCP")
        .and_then(Value::as_bool)
        .ok_or_else(|| CoreError::validation(field("isLCP"), "불리언이어야 함"))?;
    let is_lcp_candidate = element
        .get("isLCPCandidate")
        .and_then(Value::as_bool)
        .ok_or_else(|| CoreError::validation(field("isLCPCandidate"), "불리언이어야 함"))?;
    let xpath = element
        .get("xpath")
        .and_then(Value::as_str)
        .ok_or_else(|| CoreError::validation(field("xpath"), "문자열이어야 함"))?;
    let intersection_ratio = element
        .get("intersectionRatio")
        .and_then(Value::as_f64)
        .ok_or_else(|| CoreError::validation(field("intersectionRatio"), "숫자여야 함"))?;

    // 필드명에 요소 인덱스를 붙여 다시 보고
    ElementObservation::new(is_lcp, is_lcp_candidate, xpath, intersection_ratio).map_err(|e| {
        match e {
            CoreError::Validation { field: name, message } => {
                CoreError::validation(field(&name), message)
            }
            other => other,
        }
    })
}
