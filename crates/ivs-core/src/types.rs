//! 파이프라인 전역에서 공유되는 도메인 타입.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// 원격 API가 반환하는 원시 레코드.
///
/// 필드명 → 스칼라 값의 불투명 매핑으로, Fetcher와 Normalizer 사이에서만
/// 존재하는 일시적 형태입니다.
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// 워크리스트 항목 하나. (심볼, 지역) 쌍.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// 기초자산 티커
    pub symbol: String,
    /// 거래 지역 (예: "USA")
    pub region: String,
}

impl WorkItem {
    pub fn new(symbol: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            region: region.into(),
        }
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.symbol, self.region)
    }
}

/// `from > to`인 날짜 범위를 만들려 할 때 반환됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid date range: {from} > {to}")]
pub struct InvalidDateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// 양 끝을 포함하는 날짜 범위.
///
/// `from <= to` 불변식을 생성 시점에 강제하며, 한 번 만들어지면 실행 내내
/// 모든 워커가 읽기 전용으로 공유합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    from: NaiveDate,
    to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, InvalidDateRange> {
        if from > to {
            return Err(InvalidDateRange { from, to });
        }
        Ok(Self { from, to })
    }

    /// 시작일 (포함)
    pub fn from(&self) -> NaiveDate {
        self.from
    }

    /// 종료일 (포함)
    pub fn to(&self) -> NaiveDate {
        self.to
    }

    /// 날짜가 범위 안에 있는지 확인합니다 (양 끝 포함).
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.from, self.to)
    }
}

/// 모든 심볼의 조회에 동일하게 적용되는 필터 파라미터.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchParameters {
    /// OTM 하한 (%)
    pub otm_from: i32,
    /// OTM 상한 (%)
    pub otm_to: i32,
    /// 만기 하한 (일)
    pub period_from: i32,
    /// 만기 상한 (일)
    pub period_to: i32,
}

impl Default for FetchParameters {
    fn default() -> Self {
        Self {
            otm_from: 0,
            otm_to: 0,
            period_from: 90,
            period_to: 90,
        }
    }
}

/// 옵션 종류. 저장 시 "C"/"P" 한 글자로 표기합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionType {
    #[serde(rename = "C")]
    Call,
    #[serde(rename = "P")]
    Put,
}

impl OptionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "C",
            Self::Put => "P",
        }
    }

    /// 피드 표기("C", "P", "Call", "Put", 대소문자 무관)를 파싱합니다.
    pub fn from_feed_value(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "c" | "call" => Some(Self::Call),
            "p" | "put" => Some(Self::Put),
            _ => None,
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OptionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_feed_value(s).ok_or_else(|| format!("Invalid option type: {}", s))
    }
}

/// 대상 테이블의 행 하나. 정규화된 IVS 관측치.
///
/// 기본 키는 (symbol, date, record_seq) 복합 키입니다. `record_seq`는
/// 교체 배치 안에서 1부터 매겨지는 일련번호로, 같은 (symbol, date) 조합의
/// 행은 항상 한 배치에서 나오므로 테이블 전체에서 유일합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IvsRow {
    /// 배치 내 일련번호 (1부터 시작)
    pub record_seq: i64,
    pub symbol: String,
    pub region: String,
    /// 관측일
    pub date: NaiveDate,
    /// 만기 (일)
    pub period: Option<i32>,
    /// 행사가
    pub strike: Option<Decimal>,
    /// 콜/풋 구분
    pub call_put: Option<OptionType>,
    /// OTM 거리 (%)
    pub otm: Option<Decimal>,
    /// 내재변동성
    pub iv: Option<Decimal>,
    /// 델타
    pub delta: Option<Decimal>,
}
