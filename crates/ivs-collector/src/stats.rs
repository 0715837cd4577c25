//! 실행 결과 집계.
//!
//! 워크리스트 항목 하나당 [`TaskOutcome`] 하나가 남고, 실행 전체는
//! [`JobResult`]로 요약됩니다. 같은 심볼이 워크리스트에 여러 번
//! 있으면 결과도 여러 개 남습니다.

use ivs_core::NormalizeError;
use ivs_data::DataError;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use thiserror::Error;

/// 심볼 작업 하나의 실패 분류.
#[derive(Debug, Error)]
pub enum TaskErrorKind {
    /// 조회 실패 (재시도 소진 포함)
    #[error("fetch failed: {0}")]
    Fetch(DataError),

    /// 응답 레코드 정규화 실패
    #[error("malformed record: {0}")]
    Malformed(NormalizeError),

    /// 저장 실패 (트랜잭션은 롤백됨)
    #[error("write failed: {0}")]
    Write(DataError),

    /// 종료 요청으로 시작되지 않았거나 쓰기 전에 중단됨
    #[error("cancelled before completion")]
    Cancelled,

    /// 작업 경계에서 잡힌 내부 오류
    #[error("internal task failure: {0}")]
    Internal(String),
}

impl TaskErrorKind {
    /// 로그 집계용 분류 라벨.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "fetch",
            Self::Malformed(_) => "malformed",
            Self::Write(_) => "write",
            Self::Cancelled => "cancelled",
            Self::Internal(_) => "internal",
        }
    }
}

/// 워크리스트 항목 하나의 최종 결과.
#[derive(Debug)]
pub struct TaskOutcome {
    /// 처리한 심볼
    pub symbol: String,
    /// 교체 트랜잭션이 저장한 행 수 (실패 시 0)
    pub rows_written: u64,
    /// 실패 분류. `None`이면 성공
    pub error: Option<TaskErrorKind>,
}

impl TaskOutcome {
    pub fn success(symbol: impl Into<String>, rows_written: u64) -> Self {
        Self {
            symbol: symbol.into(),
            rows_written,
            error: None,
        }
    }

    pub fn failure(symbol: impl Into<String>, error: TaskErrorKind) -> Self {
        Self {
            symbol: symbol.into(),
            rows_written: 0,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// 실행 하나의 집계 결과.
#[derive(Debug, Default)]
pub struct JobResult {
    /// 항목별 결과. 워크리스트 항목 수와 길이가 같다
    pub outcomes: Vec<TaskOutcome>,
    /// 실행 소요 시간
    pub elapsed: Duration,
}

impl JobResult {
    pub fn new(outcomes: Vec<TaskOutcome>, elapsed: Duration) -> Self {
        Self { outcomes, elapsed }
    }

    /// 한 번이라도 성공한 심볼 집합.
    pub fn succeeded(&self) -> BTreeSet<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.is_success())
            .map(|o| o.symbol.as_str())
            .collect()
    }

    /// 실패한 심볼과 오류. 같은 심볼이 여러 번 실패하면 마지막 것만 남는다.
    pub fn failed(&self) -> BTreeMap<&str, &TaskErrorKind> {
        self.outcomes
            .iter()
            .filter_map(|o| o.error.as_ref().map(|e| (o.symbol.as_str(), e)))
            .collect()
    }

    /// 저장된 총 행 수.
    pub fn total_rows_written(&self) -> u64 {
        self.outcomes.iter().map(|o| o.rows_written).sum()
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn error_count(&self) -> usize {
        self.outcomes.len() - self.success_count()
    }

    /// 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        (self.success_count() as f64 / self.outcomes.len() as f64) * 100.0
    }

    /// 비어 있지 않은 워크리스트가 전부 실패했는지 확인.
    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(|o| !o.is_success())
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            total = self.total(),
            success = self.success_count(),
            errors = self.error_count(),
            rows_written = self.total_rows_written(),
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "동기화 요약"
        );

        for outcome in &self.outcomes {
            if let Some(error) = &outcome.error {
                tracing::warn!(
                    symbol = %outcome.symbol,
                    kind = error.label(),
                    error = %error,
                    "심볼 실패"
                );
            }
        }
    }
}
