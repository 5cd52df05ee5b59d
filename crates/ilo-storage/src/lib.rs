//! # ilo-storage
//!
//! 로컬 저장소 어댑터.
//! 슬러그별 URL 메트릭 목록과 방문자별 저장 잠금을 SQLite에 보관하고
//! 스키마 마이그레이션을 관리한다.
//!
//! ## 모듈
//! - `sqlite`: `UrlMetricsStorage` + `StorageLock` 구현
//! - `migration`: 스키마 마이그레이션

pub mod migration;
pub mod sqlite;
