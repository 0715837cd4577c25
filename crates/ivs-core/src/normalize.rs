//! 원시 API 레코드 → 대상 행 정규화.
//!
//! 소스 피드의 필드명을 선언된 매핑 상수(`fields`)로 대상 컬럼에 대응시키고
//! 타입 강제 규칙을 적용합니다. I/O가 없는 순수 로직이며, 레코드 하나의
//! 실패는 해당 심볼의 작업만 중단시킵니다.

use crate::types::{DateRange, IvsRow, OptionType, RawRecord, WorkItem};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use thiserror::Error;

/// 소스 피드의 필드명.
///
/// 대상 컬럼과의 대응과 강제 규칙:
/// - `symbol`/`region`(또는 `exchange`) → symbol/region, 없으면 작업 항목 값으로 대체
/// - `date` → date, 필수, `YYYY-MM-DD`
/// - `period` → period, 정수
/// - `strike`, `out-of-the-money %`, `IV`, `delta` → 십진수
/// - `Call/Put` → call_put, "C"/"P"
pub mod fields {
    pub const SYMBOL: &str = "symbol";
    pub const REGION: &str = "region";
    pub const EXCHANGE: &str = "exchange";
    pub const DATE: &str = "date";
    pub const PERIOD: &str = "period";
    pub const STRIKE: &str = "strike";
    pub const CALL_PUT: &str = "Call/Put";
    pub const OTM: &str = "out-of-the-money %";
    pub const IV: &str = "IV";
    pub const DELTA: &str = "delta";
}

/// 정규화 실패.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizeError {
    #[error("missing required field '{field}'")]
    MissingField { field: &'static str },

    #[error("field '{field}' is not a valid {expected}: {value}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
        value: String,
    },

    /// 범위 밖 날짜는 교체 삭제 경계를 벗어나 재실행 시 잔존 데이터가 되므로
    /// 유효하지 않은 입력으로 취급합니다.
    #[error("record date {date} outside task range {range}")]
    DateOutOfRange { date: NaiveDate, range: DateRange },
}

/// 심볼 하나의 배치를 정규화합니다.
///
/// 배치 내 일련번호(`record_seq`)를 피드 순서대로 1부터 발급하므로,
/// 피드 순서가 같으면 결과도 결정적입니다.
pub struct RecordNormalizer {
    symbol: String,
    region: String,
    range: DateRange,
    next_seq: i64,
}

impl RecordNormalizer {
    pub fn new(item: &WorkItem, range: DateRange) -> Self {
        Self {
            symbol: item.symbol.clone(),
            region: item.region.clone(),
            range,
            next_seq: 1,
        }
    }

    /// 원시 레코드 하나를 대상 행으로 변환합니다.
    ///
    /// 필수 필드(`date`)가 없거나 파싱에 실패하면 오류, 선택 필드는 없으면
    /// NULL로 둡니다. 존재하지만 타입이 맞지 않는 값은 항상 오류입니다.
    pub fn normalize(&mut self, raw: &RawRecord) -> Result<IvsRow, NormalizeError> {
        let date = required_date(raw, fields::DATE)?;
        if !self.range.contains(date) {
            return Err(NormalizeError::DateOutOfRange {
                date,
                range: self.range,
            });
        }

        let symbol = optional_string(raw, fields::SYMBOL)?
            .unwrap_or_else(|| self.symbol.clone());
        let region = match optional_string(raw, fields::REGION)? {
            Some(region) => region,
            None => optional_string(raw, fields::EXCHANGE)?
                .unwrap_or_else(|| self.region.clone()),
        };

        let row = IvsRow {
            record_seq: self.next_seq,
            symbol,
            region,
            date,
            period: optional_int(raw, fields::PERIOD)?,
            strike: optional_decimal(raw, fields::STRIKE)?,
            call_put: optional_option_type(raw, fields::CALL_PUT)?,
            otm: optional_decimal(raw, fields::OTM)?,
            iv: optional_decimal(raw, fields::IV)?,
            delta: optional_decimal(raw, fields::DELTA)?,
        };

        self.next_seq += 1;
        Ok(row)
    }
}

fn invalid(field: &'static str, expected: &'static str, value: &Value) -> NormalizeError {
    NormalizeError::InvalidField {
        field,
        expected,
        value: value.to_string(),
    }
}

/// 값이 없거나 JSON null, 빈 문자열이면 "없음"으로 봅니다.
fn present<'a>(raw: &'a RawRecord, field: &str) -> Option<&'a Value> {
    match raw.get(field) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(value) => Some(value),
    }
}

fn required_date(raw: &RawRecord, field: &'static str) -> Result<NaiveDate, NormalizeError> {
    let value = present(raw, field).ok_or(NormalizeError::MissingField { field })?;
    let text = value.as_str().ok_or_else(|| invalid(field, "date", value))?;
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .map_err(|_| invalid(field, "date", value))
}

fn optional_string(raw: &RawRecord, field: &'static str) -> Result<Option<String>, NormalizeError> {
    match present(raw, field) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(value) => Err(invalid(field, "string", value)),
    }
}

fn optional_int(raw: &RawRecord, field: &'static str) -> Result<Option<i32>, NormalizeError> {
    let value = match present(raw, field) {
        None => return Ok(None),
        Some(value) => value,
    };

    let parsed = match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i32::try_from(i).ok()
            } else {
                // 90.0처럼 소수부가 0인 실수 표기는 정수로 수용
                n.as_f64()
                    .filter(|f| f.fract() == 0.0)
                    .and_then(|f| {
                        let i = f as i64;
                        i32::try_from(i).ok()
                    })
            }
        }
        Value::String(s) => s.trim().parse::<i32>().ok(),
        _ => None,
    };

    parsed
        .map(Some)
        .ok_or_else(|| invalid(field, "integer", value))
}

fn optional_decimal(raw: &RawRecord, field: &'static str) -> Result<Option<Decimal>, NormalizeError> {
    let value = match present(raw, field) {
        None => return Ok(None),
        Some(value) => value,
    };

    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return Err(invalid(field, "decimal", value)),
    };

    parse_decimal(&text)
        .map(Some)
        .ok_or_else(|| invalid(field, "decimal", value))
}

/// 일반 표기와 지수 표기("1e-5")를 모두 수용합니다.
fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .ok()
        .or_else(|| Decimal::from_scientific(text).ok())
}

fn optional_option_type(
    raw: &RawRecord,
    field: &'static str,
) -> Result<Option<OptionType>, NormalizeError> {
    let value = match present(raw, field) {
        None => return Ok(None),
        Some(value) => value,
    };

    let text = value
        .as_str()
        .ok_or_else(|| invalid(field, "option type", value))?;
    OptionType::from_feed_value(text)
        .map(Some)
        .ok_or_else(|| invalid(field, "option type", value))
}
