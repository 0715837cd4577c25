//! Standalone IVS sync CLI.

use clap::{Parser, Subcommand};
use ivs_collector::{modules, CollectorConfig, JobResult};
use ivs_core::WorkItem;
use ivs_data::{Database, DatabaseConfig, IvolApiClient, IvsRepository, WorklistRepository};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "ivs-collector")]
#[command(about = "iVolatility IVS Sync Collector", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// IVS 동기화 1회 실행
    Run {
        /// 워크리스트 대신 지정 심볼만 동기화 (쉼표로 구분, 예: "AAPL,MSFT")
        #[arg(long)]
        symbols: Option<String>,
    },

    /// 데몬 모드: 주기적으로 동기화 실행
    Daemon,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // 로깅 초기화
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("ivs_collector={}", cli.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("IVS Collector 시작");

    // 설정 로드 (한 번 읽고 실행 내내 고정)
    let config = CollectorConfig::from_env()?;
    tracing::debug!(
        table = %config.target_table,
        range = ?(config.date_from, config.date_to),
        max_workers = config.max_workers,
        "설정 로드 완료"
    );

    // DB 연결
    let db = Database::connect(&DatabaseConfig::with_url(&config.database_url)).await?;
    db.health_check().await?;

    // Ctrl-C 수신 시 협조적 종료
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("종료 신호 수신, 진행 중인 작업을 정리합니다");
            signal_token.cancel();
        }
    });

    let all_failed = match cli.command {
        Commands::Run { symbols } => {
            let result = run_once(&db, &config, symbols, shutdown.clone()).await?;
            result.log_summary("ivs_sync");
            result.all_failed()
        }
        Commands::Daemon => {
            tracing::info!(
                "=== 데몬 모드 시작 (주기: {}분) ===",
                config.daemon.interval_minutes
            );

            let mut interval = tokio::time::interval(config.daemon.interval());
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::info!("데몬 종료 중...");
                        break;
                    }
                    _ = interval.tick() => {
                        match run_once(&db, &config, None, shutdown.clone()).await {
                            Ok(result) => result.log_summary("ivs_sync"),
                            Err(e) => tracing::error!("동기화 실행 실패: {}", e),
                        }
                        tracing::info!("다음 실행: {}분 후", config.daemon.interval_minutes);
                    }
                }
            }
            false
        }
    };

    db.close().await;
    tracing::info!("IVS Collector 종료");

    // 워크리스트 전체가 실패했을 때만 비정상 종료로 처리한다
    if all_failed {
        return Err("all symbols failed".into());
    }
    Ok(())
}

/// 동기화 1회 실행. 워크리스트를 확정하고 파이프라인을 돌립니다.
async fn run_once(
    db: &Database,
    config: &CollectorConfig,
    symbols: Option<String>,
    shutdown: CancellationToken,
) -> Result<JobResult, Box<dyn std::error::Error>> {
    let worklist = match symbols {
        Some(ref list) => {
            let items: Vec<WorkItem> = list
                .split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| WorkItem::new(s, config.default_region.clone()))
                .collect();
            tracing::info!(count = items.len(), "지정 심볼만 동기화");
            items
        }
        None => {
            WorklistRepository::new(db.clone())
                .fetch(&config.ticker_sql, &config.default_region)
                .await?
        }
    };

    if worklist.is_empty() {
        tracing::warn!("동기화할 심볼이 없습니다");
    }

    let provider = Arc::new(
        IvolApiClient::new(config.api_key.clone())?
            .with_fetch_timeout(config.fetch_timeout())
            .with_retry(config.retry()),
    );
    let writer = Arc::new(IvsRepository::new(db.clone(), config.target_table.clone())?);

    let result = modules::sync_ivs(
        provider,
        writer,
        worklist,
        config.range()?,
        config.params,
        config.max_workers,
        shutdown,
    )
    .await?;

    Ok(result)
}
