//! IVS 데이터 접근 계층.
//!
//! 파이프라인의 양쪽 끝을 담당합니다:
//! - `provider`: iVolatility REST API 클라이언트 (조회 측)
//! - `storage`: PostgreSQL 저장소, 트랜잭션 교체 쓰기 (저장 측)
//!
//! 두 측 모두 트레이트(`IvsProvider`, `IvsWriter`)로 추상화되어 있어
//! 파이프라인 테스트에서 스텁으로 대체할 수 있습니다.

pub mod error;
pub mod provider;
pub mod retry;
pub mod storage;

pub use error::{DataError, Result};
pub use provider::{IvolApiClient, IvsProvider};
pub use retry::{with_retry, RetryConfig};
pub use storage::{Database, DatabaseConfig, IvsRepository, IvsWriter, WorklistRepository};
