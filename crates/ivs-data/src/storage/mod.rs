//! 저장소 모듈.
//!
//! PostgreSQL 기반 저장 측 구현을 정의합니다.
//! - `Database`: 연결 풀 래퍼
//! - `IvsRepository`: (symbol, 날짜 범위) 단위 트랜잭션 교체 쓰기
//! - `WorklistRepository`: 워크리스트 쿼리 실행

pub mod postgres;

pub use postgres::{Database, DatabaseConfig, IvsRepository, WorklistRepository};

use crate::error::Result;
use async_trait::async_trait;
use ivs_core::{DateRange, IvsRow};

/// 교체 쓰기 추상화.
///
/// 파이프라인이 저장 측을 바라보는 유일한 창구이며, 테스트에서는
/// 인메모리 스텁으로 대체합니다.
#[async_trait]
pub trait IvsWriter: Send + Sync {
    /// (symbol, 날짜 범위)에 해당하는 기존 행을 지우고 `rows`를 삽입합니다.
    ///
    /// 삭제와 삽입은 단일 원자 단위로 실행되어야 하며, 실패 시 대상
    /// 테이블은 변경 전 상태 그대로여야 합니다. 빈 `rows`도 유효한
    /// 입력으로, 삭제만 수행되고 0을 반환합니다.
    async fn replace(&self, symbol: &str, range: &DateRange, rows: &[IvsRow]) -> Result<u64>;
}
