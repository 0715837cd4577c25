//! IVS 동기화 파이프라인의 핵심 도메인 모델.
//!
//! 이 crate는 I/O 의존성이 없는 순수 도메인 계층입니다:
//! - 워크리스트/날짜 범위/조회 파라미터 타입
//! - 대상 테이블 행 모델 (`IvsRow`)
//! - 원시 API 레코드 → 대상 행 정규화 (`RecordNormalizer`)

pub mod normalize;
pub mod types;

pub use normalize::{NormalizeError, RecordNormalizer};
pub use types::{
    DateRange, FetchParameters, InvalidDateRange, IvsRow, OptionType, RawRecord, WorkItem,
};
