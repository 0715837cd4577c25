//! 환경변수 기반 설정 모듈.
//!
//! 모든 설정은 실행 시작 시 한 번만 읽히고, 이후에는 불변으로
//! 공유됩니다. 실행 도중 환경변수를 바꿔도 반영되지 않습니다.

use crate::error::{CollectorError, Result};
use chrono::{NaiveDate, Utc};
use ivs_core::{DateRange, FetchParameters};
use ivs_data::RetryConfig;
use std::time::Duration;

/// 워크리스트 기본 조회 SQL.
const DEFAULT_TICKER_SQL: &str =
    "SELECT symbol, region FROM ivs_symbols WHERE is_active = true";

/// Collector 전체 설정.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// PostgreSQL 연결 URL
    pub database_url: String,
    /// iVolatility API 키
    pub api_key: String,
    /// 교체 대상 테이블명
    pub target_table: String,
    /// 동기화 시작일 (포함)
    pub date_from: NaiveDate,
    /// 동기화 종료일 (포함)
    pub date_to: NaiveDate,
    /// 모든 심볼에 동일하게 적용되는 조회 필터
    pub params: FetchParameters,
    /// 워크리스트에 region이 없을 때 사용할 기본 지역
    pub default_region: String,
    /// 워크리스트 조회 SQL (symbol 컬럼 필수, region 컬럼 선택)
    pub ticker_sql: String,
    /// 동시 워커 수 상한
    pub max_workers: usize,
    /// 심볼당 조회 시간 상한 (초, 재시도 포함)
    pub fetch_timeout_secs: u64,
    /// 조회 요청당 최대 시도 횟수
    pub fetch_max_attempts: u32,
    /// 데몬 모드 설정
    pub daemon: DaemonConfig,
}

/// 데몬 모드 설정.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// 실행 주기 (분)
    pub interval_minutes: u64,
}

impl DaemonConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드.
    ///
    /// `DATABASE_URL`과 `IVOL_API_KEY`는 필수이고 나머지는 기본값이
    /// 있습니다. 날짜를 지정하지 않으면 어제(UTC)부터 오늘까지를
    /// 동기화합니다.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = require_env("DATABASE_URL")?;
        let api_key = require_env("IVOL_API_KEY")?;

        let today = Utc::now().date_naive();
        let yesterday = today.pred_opt().unwrap_or(today);

        let config = Self {
            database_url,
            api_key,
            target_table: env_var_string("TARGET_TABLE", "ivolatility_ivs"),
            date_from: env_var_date("DATE_FROM", yesterday)?,
            date_to: env_var_date("DATE_TO", today)?,
            params: FetchParameters {
                otm_from: env_var_parse("OTM_FROM", 0),
                otm_to: env_var_parse("OTM_TO", 0),
                period_from: env_var_parse("PERIOD_FROM", 90),
                period_to: env_var_parse("PERIOD_TO", 90),
            },
            default_region: env_var_string("REGION", "USA"),
            ticker_sql: env_var_string("TICKER_SQL", DEFAULT_TICKER_SQL),
            max_workers: env_var_parse("MAX_WORKERS", 12),
            fetch_timeout_secs: env_var_parse("FETCH_TIMEOUT_SECS", 180),
            fetch_max_attempts: env_var_parse("FETCH_MAX_ATTEMPTS", 3),
            daemon: DaemonConfig {
                interval_minutes: env_var_parse("DAEMON_INTERVAL_MINUTES", 1440),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// 실행 전 검증. 실패하면 어떤 작업도 시작하지 않습니다.
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(CollectorError::Config(
                "MAX_WORKERS must be at least 1".to_string(),
            ));
        }
        if self.fetch_max_attempts == 0 {
            return Err(CollectorError::Config(
                "FETCH_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        if self.date_from > self.date_to {
            return Err(CollectorError::Config(format!(
                "DATE_FROM {} is after DATE_TO {}",
                self.date_from, self.date_to
            )));
        }
        if self.params.otm_from > self.params.otm_to {
            return Err(CollectorError::Config(
                "OTM_FROM must not exceed OTM_TO".to_string(),
            ));
        }
        if self.params.period_from > self.params.period_to {
            return Err(CollectorError::Config(
                "PERIOD_FROM must not exceed PERIOD_TO".to_string(),
            ));
        }
        Ok(())
    }

    /// 확정된 동기화 날짜 범위.
    pub fn range(&self) -> Result<DateRange> {
        DateRange::new(self.date_from, self.date_to)
            .map_err(|e| CollectorError::Config(e.to_string()))
    }

    /// 조회 재시도 설정.
    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.fetch_max_attempts,
            ..RetryConfig::default()
        }
    }

    /// 심볼당 조회 시간 상한.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| CollectorError::Config(format!("{} 환경변수가 설정되지 않았습니다", key)))
}

fn env_var_string(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// 환경변수에서 값을 파싱 (실패 시 기본값 사용)
fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// 날짜 환경변수 파싱. 값이 있는데 형식이 틀리면 오류입니다.
fn env_var_date(key: &str, default: NaiveDate) -> Result<NaiveDate> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => {
            NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
                CollectorError::Config(format!("{} must be YYYY-MM-DD, got '{}'", key, value))
            })
        }
        _ => Ok(default),
    }
}
