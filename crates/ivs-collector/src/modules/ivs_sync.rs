//! IVS 동기화 파이프라인.
//!
//! 워크리스트를 FIFO 순서로 고정 크기 워커 풀에 흘려보내고, 심볼마다
//! 조회 → 정규화 → 교체 저장을 격리 실행합니다. 한 항목의 실패는
//! 해당 항목의 결과로만 남고 다른 항목에 영향을 주지 않습니다.

use crate::error::{CollectorError, Result};
use crate::stats::{JobResult, TaskErrorKind, TaskOutcome};
use ivs_core::{DateRange, FetchParameters, RecordNormalizer, WorkItem};
use ivs_data::{IvsProvider, IvsWriter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// 워크리스트 전체를 동기화합니다.
///
/// 동시에 실행되는 작업은 `max_workers`개를 넘지 않으며, 슬롯이 빌
/// 때마다 워크리스트 순서대로 다음 항목이 투입됩니다. 종료 요청이
/// 오면 새 항목은 시작하지 않고 진행 중인 작업은 다음 확인 지점에서
/// 중단되지만, 이미 시작된 저장 트랜잭션은 끝까지 완료됩니다.
///
/// 모든 항목이 종료 상태에 도달한 뒤에 항목 수만큼의 결과를 담은
/// [`JobResult`]를 반환합니다.
pub async fn sync_ivs<P, W>(
    provider: Arc<P>,
    writer: Arc<W>,
    worklist: Vec<WorkItem>,
    range: DateRange,
    params: FetchParameters,
    max_workers: usize,
    shutdown: CancellationToken,
) -> Result<JobResult>
where
    P: IvsProvider + 'static,
    W: IvsWriter + 'static,
{
    if max_workers == 0 {
        return Err(CollectorError::Config(
            "worker count must be at least 1".to_string(),
        ));
    }

    let start = Instant::now();
    let total = worklist.len();

    tracing::info!(total, max_workers, range = %range, "IVS 동기화 시작");

    let semaphore = Arc::new(Semaphore::new(max_workers));
    let completed = Arc::new(AtomicUsize::new(0));
    let mut handles: Vec<(String, JoinHandle<TaskOutcome>)> = Vec::with_capacity(total);
    let mut skipped: Vec<TaskOutcome> = Vec::new();

    let mut queue = worklist.into_iter();
    for item in &mut queue {
        let permit = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                skipped.push(TaskOutcome::failure(item.symbol, TaskErrorKind::Cancelled));
                break;
            }
            permit = semaphore.clone().acquire_owned() => {
                permit.expect("세마포어 획득 실패")
            }
        };

        let provider = provider.clone();
        let writer = writer.clone();
        let shutdown = shutdown.clone();
        let completed = completed.clone();
        let symbol = item.symbol.clone();

        let handle = tokio::spawn(async move {
            let _permit = permit;
            let outcome = process_item(provider, writer, item, range, params, shutdown).await;

            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            tracing::debug!(
                symbol = %outcome.symbol,
                progress = format!("{}/{}", done, total),
                "작업 종료"
            );
            outcome
        });
        handles.push((symbol, handle));
    }

    // 종료 요청으로 투입되지 못한 나머지 항목도 결과를 남긴다
    for item in queue {
        skipped.push(TaskOutcome::failure(item.symbol, TaskErrorKind::Cancelled));
    }

    let mut outcomes = Vec::with_capacity(total);
    for (symbol, handle) in handles {
        match handle.await {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                tracing::error!(symbol = %symbol, error = %e, "작업이 비정상 종료되었습니다");
                outcomes.push(TaskOutcome::failure(
                    symbol,
                    TaskErrorKind::Internal(e.to_string()),
                ));
            }
        }
    }
    outcomes.extend(skipped);

    let result = JobResult::new(outcomes, start.elapsed());
    tracing::info!(
        total = result.total(),
        success = result.success_count(),
        rows = result.total_rows_written(),
        "IVS 동기화 종료"
    );
    Ok(result)
}

/// 심볼 하나를 처리합니다.
///
/// 실패는 [`TaskOutcome`]으로 변환되어 반환되고 밖으로 전파되지
/// 않습니다. 취소 확인은 조회 중과 저장 직전에만 이루어지며, 저장
/// 트랜잭션은 시작하면 중단하지 않습니다.
async fn process_item<P, W>(
    provider: Arc<P>,
    writer: Arc<W>,
    item: WorkItem,
    range: DateRange,
    params: FetchParameters,
    shutdown: CancellationToken,
) -> TaskOutcome
where
    P: IvsProvider + 'static,
    W: IvsWriter + 'static,
{
    tracing::debug!(symbol = %item.symbol, region = %item.region, "심볼 처리 시작");

    let raw = tokio::select! {
        biased;
        _ = shutdown.cancelled() => {
            tracing::debug!(symbol = %item.symbol, "종료 요청으로 조회 중단");
            return TaskOutcome::failure(item.symbol, TaskErrorKind::Cancelled);
        }
        result = provider.fetch_ivs(&item, &range, &params) => match result {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(symbol = %item.symbol, error = %e, "조회 실패");
                return TaskOutcome::failure(item.symbol, TaskErrorKind::Fetch(e));
            }
        },
    };

    if raw.is_empty() {
        tracing::info!(symbol = %item.symbol, range = %range, "조회 결과 없음, 기존 행만 삭제");
    }

    let mut normalizer = RecordNormalizer::new(&item, range);
    let mut rows = Vec::with_capacity(raw.len());
    for record in &raw {
        match normalizer.normalize(record) {
            Ok(row) => rows.push(row),
            Err(e) => {
                tracing::error!(symbol = %item.symbol, error = %e, "레코드 정규화 실패");
                return TaskOutcome::failure(item.symbol, TaskErrorKind::Malformed(e));
            }
        }
    }

    if shutdown.is_cancelled() {
        tracing::debug!(symbol = %item.symbol, "종료 요청으로 저장 생략");
        return TaskOutcome::failure(item.symbol, TaskErrorKind::Cancelled);
    }

    match writer.replace(&item.symbol, &range, &rows).await {
        Ok(rows_written) => {
            tracing::info!(symbol = %item.symbol, rows = rows_written, "심볼 처리 완료");
            TaskOutcome::success(item.symbol, rows_written)
        }
        Err(e) => {
            tracing::error!(symbol = %item.symbol, error = %e, "저장 실패");
            TaskOutcome::failure(item.symbol, TaskErrorKind::Write(e))
        }
    }
}
