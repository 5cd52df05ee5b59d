//! ILO 도메인 모델.
//!
//! 방문자 측정값([`url_metric`])과 이를 뷰포트 너비 범위별로 묶는
//! 그룹([`group`]), 전체 범위를 덮는 그룹 컬렉션([`collection`]).

pub mod collection;
pub mod group;
pub mod url_metric;
