//! 데이터 계층 오류 타입.

use thiserror::Error;

/// 조회/저장 관련 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 네트워크/연결 오류
    #[error("Network error: {0}")]
    NetworkError(String),

    /// 데이터베이스 연결 오류
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// 타임아웃
    #[error("Timeout: {0}")]
    Timeout(String),

    /// 요청 한도 초과
    #[error("Rate limit exceeded")]
    RateLimited,

    /// API 오류 응답
    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    /// 파싱/역직렬화 오류
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 쿼리 실행 오류
    #[error("Query error: {0}")]
    QueryError(String),

    /// 데이터 삽입 오류
    #[error("Insert error: {0}")]
    InsertError(String),

    /// 데이터 삭제 오류
    #[error("Delete error: {0}")]
    DeleteError(String),

    /// 연결 풀 소진
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// 잘못된 데이터 형식
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// 유효하지 않은 테이블명
    #[error("Invalid table name: {0}")]
    InvalidTable(String),
}

impl DataError {
    /// 재시도 가능한(일시적) 오류인지 확인.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DataError::NetworkError(_)
                | DataError::ConnectionError(_)
                | DataError::Timeout(_)
                | DataError::RateLimited
                | DataError::PoolExhausted
        )
    }

    /// 권장 재시도 대기 시간(밀리초) 반환.
    pub fn retry_delay_ms(&self) -> Option<u64> {
        match self {
            DataError::RateLimited => Some(60000), // 1분
            DataError::NetworkError(_) => Some(1000),
            DataError::ConnectionError(_) => Some(5000),
            DataError::Timeout(_) => Some(500),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for DataError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DataError::Timeout(err.to_string())
        } else if err.is_connect() {
            DataError::NetworkError(err.to_string())
        } else if err.is_decode() {
            DataError::ParseError(err.to_string())
        } else {
            DataError::NetworkError(err.to_string())
        }
    }
}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => DataError::PoolExhausted,
            sqlx::Error::Io(io_err) => DataError::ConnectionError(io_err.to_string()),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().unwrap_or_default();
                if code == "23505" {
                    // PostgreSQL 고유 제약 조건 위반
                    DataError::InsertError(db_err.message().to_string())
                } else {
                    DataError::QueryError(db_err.message().to_string())
                }
            }
            _ => DataError::QueryError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::ParseError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors_are_retryable() {
        assert!(DataError::NetworkError("reset".to_string()).is_retryable());
        assert!(DataError::Timeout("30s".to_string()).is_retryable());
        assert!(DataError::RateLimited.is_retryable());
        assert!(DataError::PoolExhausted.is_retryable());
    }

    #[test]
    fn test_permanent_errors_are_not_retryable() {
        let api = DataError::ApiError {
            status: 404,
            message: "not found".to_string(),
        };

        assert!(!api.is_retryable());
        assert!(!DataError::ParseError("bad json".to_string()).is_retryable());
        assert!(!DataError::InvalidTable("a;b".to_string()).is_retryable());
        assert!(!DataError::InsertError("dup".to_string()).is_retryable());
    }

    #[test]
    fn test_rate_limit_has_longest_delay_hint() {
        assert_eq!(DataError::RateLimited.retry_delay_ms(), Some(60000));
        assert_eq!(
            DataError::ApiError {
                status: 400,
                message: String::new()
            }
            .retry_delay_ms(),
            None
        );
    }

    #[test]
    fn test_sqlx_pool_timeout_maps_to_pool_exhausted() {
        let err: DataError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, DataError::PoolExhausted));
    }
}
