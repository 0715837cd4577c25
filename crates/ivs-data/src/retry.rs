//! 일시적 오류 재시도 헬퍼.
//!
//! 지수 백오프로 재시도하되, 오류가 권장 대기 시간을 제시하면
//! (예: 요청 한도 초과) 그 값을 우선합니다.

use crate::error::{DataError, Result};
use std::future::Future;
use std::time::Duration;

/// 재시도 동작 설정.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// 최대 시도 횟수 (최초 시도 포함)
    pub max_attempts: u32,
    /// 첫 재시도 전 대기 시간
    pub initial_delay: Duration,
    /// 대기 시간 상한
    pub max_delay: Duration,
    /// 재시도마다 대기 시간에 곱하는 계수
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
        }
    }
}

/// 재시도 가능한 오류에 한해 작업을 반복 실행합니다.
///
/// 재시도 불가 오류는 즉시 반환하고, 시도 횟수를 모두 소진하면
/// 마지막 오류를 반환합니다.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, operation: &str, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 1;
    let mut delay = config.initial_delay;

    loop {
        match f().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(operation, attempt, "재시도 후 성공");
                }
                return Ok(value);
            }
            Err(err) if err.is_retryable() && attempt < config.max_attempts => {
                let wait = err
                    .retry_delay_ms()
                    .map(Duration::from_millis)
                    .unwrap_or(delay)
                    .min(config.max_delay);

                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = wait.as_millis() as u64,
                    error = %err,
                    "일시적 오류, 재시도 대기"
                );

                tokio::time::sleep(wait).await;

                delay = delay.mul_f64(config.multiplier).min(config.max_delay);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
