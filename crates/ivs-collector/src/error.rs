//! Collector 오류 타입.

use ivs_data::DataError;
use thiserror::Error;

/// Collector 실행 오류.
///
/// 설정 오류는 어떤 작업도 시작되기 전에 반환됩니다. 개별 심볼의
/// 실패는 여기로 전파되지 않고 [`crate::stats::TaskOutcome`]에 남습니다.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// 실행 전 설정 검증 실패
    #[error("Configuration error: {0}")]
    Config(String),

    /// 데이터 계층 오류 (DB 연결, 워크리스트 조회 등)
    #[error("Data error: {0}")]
    Data(#[from] DataError),
}

pub type Result<T> = std::result::Result<T, CollectorError>;
