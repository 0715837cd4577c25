//! 파이프라인 통합 테스트.
//!
//! 스텁 Provider/Writer로 교체 의미론, 실패 격리, 동시성 상한,
//! 취소 동작을 검증합니다.

use async_trait::async_trait;
use chrono::NaiveDate;
use ivs_collector::modules::sync_ivs;
use ivs_collector::{CollectorError, TaskErrorKind};
use ivs_core::{DateRange, FetchParameters, IvsRow, RawRecord, WorkItem};
use ivs_data::{DataError, IvsProvider, IvsWriter};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn range() -> DateRange {
    DateRange::new(date(2024, 1, 1), date(2024, 1, 2)).unwrap()
}

fn record(date_str: &str, iv: f64) -> RawRecord {
    json!({ "date": date_str, "IV": iv, "delta": 0.5 })
        .as_object()
        .unwrap()
        .clone()
}

fn seeded_row(symbol: &str, d: NaiveDate, seq: i64) -> IvsRow {
    IvsRow {
        record_seq: seq,
        symbol: symbol.to_string(),
        region: "USA".to_string(),
        date: d,
        period: Some(90),
        strike: None,
        call_put: None,
        otm: None,
        iv: None,
        delta: None,
    }
}

/// 심볼별 준비된 응답을 돌려주는 스텁. 동시 조회 수를 계측한다.
#[derive(Default)]
struct StubProvider {
    responses: HashMap<String, Vec<RawRecord>>,
    fail_symbols: Vec<String>,
    delay: Duration,
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl StubProvider {
    fn new() -> Self {
        Self::default()
    }

    fn with_records(mut self, symbol: &str, records: Vec<RawRecord>) -> Self {
        self.responses.insert(symbol.to_string(), records);
        self
    }

    fn failing(mut self, symbol: &str) -> Self {
        self.fail_symbols.push(symbol.to_string());
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl IvsProvider for StubProvider {
    async fn fetch_ivs(
        &self,
        item: &WorkItem,
        _range: &DateRange,
        _params: &FetchParameters,
    ) -> Result<Vec<RawRecord>, DataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.fail_symbols.iter().any(|s| s == &item.symbol) {
            return Err(DataError::NetworkError("stub failure".to_string()));
        }
        Ok(self.responses.get(&item.symbol).cloned().unwrap_or_default())
    }
}

/// 교체 의미론을 인메모리로 구현한 스텁 Writer.
///
/// 실패 주입 시 저장 내용을 건드리지 않아 트랜잭션 롤백과 같은
/// 관측 결과를 낸다.
#[derive(Default)]
struct MemoryWriter {
    rows: Mutex<Vec<IvsRow>>,
    fail_symbols: Vec<String>,
    delay: Duration,
}

impl MemoryWriter {
    fn new() -> Self {
        Self::default()
    }

    fn failing(mut self, symbol: &str) -> Self {
        self.fail_symbols.push(symbol.to_string());
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn seed(self, rows: Vec<IvsRow>) -> Self {
        *self.rows.lock().unwrap() = rows;
        self
    }

    fn rows_for(&self, symbol: &str) -> Vec<IvsRow> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.symbol == symbol)
            .cloned()
            .collect()
    }

    fn all_rows(&self) -> Vec<IvsRow> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl IvsWriter for MemoryWriter {
    async fn replace(
        &self,
        symbol: &str,
        range: &DateRange,
        rows: &[IvsRow],
    ) -> Result<u64, DataError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.fail_symbols.iter().any(|s| s == symbol) {
            return Err(DataError::InsertError("injected failure".to_string()));
        }

        let mut table = self.rows.lock().unwrap();
        table.retain(|r| !(r.symbol == symbol && range.contains(r.date)));
        table.extend(rows.iter().cloned());
        Ok(rows.len() as u64)
    }
}

fn sorted(mut rows: Vec<IvsRow>) -> Vec<IvsRow> {
    rows.sort_by(|a, b| {
        (a.symbol.as_str(), a.date, a.record_seq).cmp(&(b.symbol.as_str(), b.date, b.record_seq))
    });
    rows
}

#[tokio::test]
async fn test_symbol_with_data_and_symbol_without() {
    let provider = Arc::new(StubProvider::new().with_records(
        "AAPL",
        vec![
            record("2024-01-01", 0.20),
            record("2024-01-01", 0.21),
            record("2024-01-02", 0.22),
        ],
    ));
    let writer = Arc::new(MemoryWriter::new());
    let worklist = vec![WorkItem::new("AAPL", "USA"), WorkItem::new("MSFT", "USA")];

    let result = sync_ivs(
        provider,
        writer.clone(),
        worklist,
        range(),
        FetchParameters::default(),
        2,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(result.total(), 2);
    assert!(result.failed().is_empty());
    assert_eq!(result.total_rows_written(), 3);

    let aapl = writer.rows_for("AAPL");
    assert_eq!(aapl.len(), 3);
    assert!(aapl.iter().all(|r| range().contains(r.date)));
    assert!(writer.rows_for("MSFT").is_empty());
}

#[tokio::test]
async fn test_empty_fetch_clears_stale_rows_in_range_only() {
    let writer = Arc::new(MemoryWriter::new().seed(vec![
        seeded_row("AAPL", date(2024, 1, 1), 1),
        seeded_row("AAPL", date(2023, 12, 15), 1),
    ]));
    let provider = Arc::new(StubProvider::new());

    let result = sync_ivs(
        provider,
        writer.clone(),
        vec![WorkItem::new("AAPL", "USA")],
        range(),
        FetchParameters::default(),
        1,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(result.success_count(), 1);
    assert_eq!(result.total_rows_written(), 0);

    // 범위 안의 기존 행만 지워지고 범위 밖 행은 남는다
    let remaining = writer.rows_for("AAPL");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].date, date(2023, 12, 15));
}

#[tokio::test]
async fn test_fetch_failure_does_not_affect_other_symbols() {
    let provider = Arc::new(
        StubProvider::new()
            .failing("AAPL")
            .with_records("MSFT", vec![record("2024-01-01", 0.3)]),
    );
    let writer = Arc::new(MemoryWriter::new());

    let result = sync_ivs(
        provider,
        writer.clone(),
        vec![WorkItem::new("AAPL", "USA"), WorkItem::new("MSFT", "USA")],
        range(),
        FetchParameters::default(),
        2,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(matches!(
        result.failed().get("AAPL"),
        Some(TaskErrorKind::Fetch(_))
    ));
    assert!(result.succeeded().contains("MSFT"));
    assert!(writer.rows_for("AAPL").is_empty());
    assert_eq!(writer.rows_for("MSFT").len(), 1);
}

#[tokio::test]
async fn test_write_failure_leaves_existing_rows_untouched() {
    let existing = seeded_row("AAPL", date(2024, 1, 1), 1);
    let writer = Arc::new(
        MemoryWriter::new()
            .failing("AAPL")
            .seed(vec![existing.clone()]),
    );
    let provider = Arc::new(
        StubProvider::new()
            .with_records("AAPL", vec![record("2024-01-01", 0.2), record("2024-01-02", 0.3)])
            .with_records("MSFT", vec![record("2024-01-02", 0.4)]),
    );

    let result = sync_ivs(
        provider,
        writer.clone(),
        vec![WorkItem::new("AAPL", "USA"), WorkItem::new("MSFT", "USA")],
        range(),
        FetchParameters::default(),
        2,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(matches!(
        result.failed().get("AAPL"),
        Some(TaskErrorKind::Write(_))
    ));
    assert!(result.succeeded().contains("MSFT"));

    // 실패한 교체는 이전 상태를 그대로 남긴다
    assert_eq!(writer.rows_for("AAPL"), vec![existing]);
    assert_eq!(writer.rows_for("MSFT").len(), 1);
}

#[tokio::test]
async fn test_malformed_record_fails_symbol_before_write() {
    let provider = Arc::new(
        StubProvider::new()
            .with_records(
                "AAPL",
                vec![record("2024-01-01", 0.2), record("not-a-date", 0.3)],
            )
            .with_records("MSFT", vec![record("2024-01-01", 0.4)]),
    );
    let writer = Arc::new(MemoryWriter::new());

    let result = sync_ivs(
        provider,
        writer.clone(),
        vec![WorkItem::new("AAPL", "USA"), WorkItem::new("MSFT", "USA")],
        range(),
        FetchParameters::default(),
        2,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(matches!(
        result.failed().get("AAPL"),
        Some(TaskErrorKind::Malformed(_))
    ));
    // 정규화 실패 시 저장은 호출조차 되지 않는다
    assert!(writer.rows_for("AAPL").is_empty());
    assert_eq!(writer.rows_for("MSFT").len(), 1);
}

#[tokio::test]
async fn test_run_is_idempotent() {
    let provider = Arc::new(StubProvider::new().with_records(
        "AAPL",
        vec![record("2024-01-01", 0.2), record("2024-01-02", 0.3)],
    ));
    let writer = Arc::new(MemoryWriter::new());
    let worklist = vec![WorkItem::new("AAPL", "USA")];

    for _ in 0..2 {
        sync_ivs(
            provider.clone(),
            writer.clone(),
            worklist.clone(),
            range(),
            FetchParameters::default(),
            1,
            CancellationToken::new(),
        )
        .await
        .unwrap();
    }

    // 두 번 실행해도 결과 행 집합은 한 번 실행과 같다
    let rows = writer.rows_for("AAPL");
    assert_eq!(rows.len(), 2);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_completion_order_does_not_change_final_rows() {
    let provider = Arc::new(
        StubProvider::new()
            .with_records("AAPL", vec![record("2024-01-01", 0.2)])
            .with_records("MSFT", vec![record("2024-01-01", 0.3), record("2024-01-02", 0.4)])
            .with_records("TSLA", vec![record("2024-01-02", 0.5)]),
    );

    let concurrent = Arc::new(MemoryWriter::new());
    sync_ivs(
        provider.clone(),
        concurrent.clone(),
        vec![
            WorkItem::new("AAPL", "USA"),
            WorkItem::new("MSFT", "USA"),
            WorkItem::new("TSLA", "USA"),
        ],
        range(),
        FetchParameters::default(),
        3,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    let sequential = Arc::new(MemoryWriter::new());
    sync_ivs(
        provider.clone(),
        sequential.clone(),
        vec![
            WorkItem::new("TSLA", "USA"),
            WorkItem::new("MSFT", "USA"),
            WorkItem::new("AAPL", "USA"),
        ],
        range(),
        FetchParameters::default(),
        1,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(sorted(concurrent.all_rows()), sorted(sequential.all_rows()));
}

#[tokio::test]
async fn test_duplicate_worklist_entries_each_get_an_outcome() {
    let provider = Arc::new(StubProvider::new().with_records(
        "AAPL",
        vec![record("2024-01-01", 0.2), record("2024-01-02", 0.3)],
    ));
    let writer = Arc::new(MemoryWriter::new());

    let result = sync_ivs(
        provider,
        writer.clone(),
        vec![WorkItem::new("AAPL", "USA"), WorkItem::new("AAPL", "USA")],
        range(),
        FetchParameters::default(),
        1,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(result.total(), 2);
    assert_eq!(result.success_count(), 2);
    assert_eq!(result.total_rows_written(), 4);
    // 마지막 교체가 이긴다. 행이 중복 축적되지 않는다
    assert_eq!(writer.rows_for("AAPL").len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_never_exceeds_worker_limit() {
    let provider = Arc::new(
        StubProvider::new().with_delay(Duration::from_millis(50)),
    );
    let writer = Arc::new(MemoryWriter::new());
    let worklist: Vec<WorkItem> = ["A", "B", "C", "D", "E", "F"]
        .iter()
        .map(|s| WorkItem::new(*s, "USA"))
        .collect();

    let result = sync_ivs(
        provider.clone(),
        writer,
        worklist,
        range(),
        FetchParameters::default(),
        2,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(result.total(), 6);
    assert_eq!(result.success_count(), 6);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 6);
    // 두 슬롯이 모두 쓰이되 상한을 넘지 않는다
    assert_eq!(provider.max_active.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_cancelled_before_start_yields_all_cancelled() {
    let provider = Arc::new(StubProvider::new());
    let writer = Arc::new(MemoryWriter::new());
    let token = CancellationToken::new();
    token.cancel();

    let result = sync_ivs(
        provider.clone(),
        writer.clone(),
        vec![
            WorkItem::new("AAPL", "USA"),
            WorkItem::new("MSFT", "USA"),
            WorkItem::new("TSLA", "USA"),
        ],
        range(),
        FetchParameters::default(),
        2,
        token,
    )
    .await
    .unwrap();

    assert_eq!(result.total(), 3);
    assert!(result
        .outcomes
        .iter()
        .all(|o| matches!(o.error, Some(TaskErrorKind::Cancelled))));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    assert!(writer.all_rows().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_fetch_stops_remaining_work() {
    let provider = Arc::new(
        StubProvider::new()
            .with_records("AAPL", vec![record("2024-01-01", 0.2)])
            .with_delay(Duration::from_millis(100)),
    );
    let writer = Arc::new(MemoryWriter::new());
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        canceller.cancel();
    });

    let result = sync_ivs(
        provider.clone(),
        writer.clone(),
        vec![
            WorkItem::new("AAPL", "USA"),
            WorkItem::new("MSFT", "USA"),
            WorkItem::new("TSLA", "USA"),
        ],
        range(),
        FetchParameters::default(),
        1,
        token,
    )
    .await
    .unwrap();

    // 조회 중이던 항목과 시작 못 한 항목 모두 취소로 끝난다
    assert_eq!(result.total(), 3);
    assert!(result
        .outcomes
        .iter()
        .all(|o| matches!(o.error, Some(TaskErrorKind::Cancelled))));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    assert!(writer.all_rows().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_write_lets_transaction_finish() {
    let provider = Arc::new(
        StubProvider::new().with_records("AAPL", vec![record("2024-01-01", 0.2)]),
    );
    let writer = Arc::new(MemoryWriter::new().with_delay(Duration::from_millis(100)));
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        canceller.cancel();
    });

    let result = sync_ivs(
        provider,
        writer.clone(),
        vec![WorkItem::new("AAPL", "USA")],
        range(),
        FetchParameters::default(),
        1,
        token,
    )
    .await
    .unwrap();

    // 이미 시작된 저장은 취소 요청과 무관하게 끝까지 수행된다
    assert_eq!(result.success_count(), 1);
    assert!(result.succeeded().contains("AAPL"));
    assert_eq!(result.total_rows_written(), 1);
    assert_eq!(writer.rows_for("AAPL").len(), 1);
}

#[tokio::test]
async fn test_zero_workers_is_a_configuration_error() {
    let provider = Arc::new(StubProvider::new());
    let writer = Arc::new(MemoryWriter::new());

    let err = sync_ivs(
        provider.clone(),
        writer,
        vec![WorkItem::new("AAPL", "USA")],
        range(),
        FetchParameters::default(),
        0,
        CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, CollectorError::Config(_)));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_empty_worklist_completes_with_no_outcomes() {
    let provider = Arc::new(StubProvider::new());
    let writer = Arc::new(MemoryWriter::new());

    let result = sync_ivs(
        provider.clone(),
        writer,
        Vec::new(),
        range(),
        FetchParameters::default(),
        4,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(result.total(), 0);
    assert!(!result.all_failed());
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}
