//! # ilo-core
//!
//! 이미지 로딩 최적화(ILO) 도메인 모델, 포트(trait) 정의, 에러 타입.
//! 방문자가 보낸 URL 메트릭을 뷰포트 브레이크포인트별로 묶고,
//! 어느 너비에 새 샘플이 필요한지 판정하는 순수 로직을 제공한다.
//!
//! ## 구조
//!
//! - [`models`]: URL 메트릭, 뷰포트 그룹, 그룹 컬렉션
//! - [`needed_widths`]: 그룹 객체 없이 버킷별 샘플 필요 여부 계산
//! - [`page_metrics`]: 레거시 페이지 메트릭 그룹핑
//! - [`slug`]: 쿼리 변수 기반 URL 슬러그
//! - [`clock`]: 현재 시각 (초 단위 부동소수)
//! - [`ports`]: Hexagonal Architecture 포트 인터페이스 (async_trait)
//! - [`error`]: 핵심 에러 타입 (thiserror)
//! - [`config`]: 애플리케이션 설정 구조체
//! - [`config_manager`]: 설정 파일 관리 (로드/저장)

pub mod clock;
pub mod config;
pub mod config_manager;
pub mod error;
pub mod models;
pub mod needed_widths;
pub mod page_metrics;
pub mod ports;
pub mod slug;
