//! Standalone IVS sync batch job.
//!
//! 이 crate는 iVolatility EOD IVS 데이터를 심볼 단위로 받아
//! PostgreSQL 대상 테이블을 교체 갱신하는 바이너리를 제공합니다:
//! - 워크리스트 조회 (설정 SQL 또는 CLI 심볼 지정)
//! - 심볼별 동시 조회 / 정규화 / 교체 저장
//! - 부분 실패 격리와 실행 요약 집계

pub mod config;
pub mod error;
pub mod modules;
pub mod stats;

pub use config::{CollectorConfig, DaemonConfig};
pub use error::{CollectorError, Result};
pub use stats::{JobResult, TaskErrorKind, TaskOutcome};
