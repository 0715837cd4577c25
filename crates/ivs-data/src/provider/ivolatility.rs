//! iVolatility REST API 클라이언트.
//!
//! EOD 내재변동성 표면(`/equities/eod/ivs`)을 심볼 단위로 조회합니다.
//! 일시적 오류는 백오프 재시도하고, 심볼당 전체 조회 시간에 상한을 둡니다.

use crate::error::{DataError, Result};
use crate::provider::IvsProvider;
use crate::retry::{with_retry, RetryConfig};
use async_trait::async_trait;
use ivs_core::{DateRange, FetchParameters, RawRecord, WorkItem};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://restapi.ivolatility.com";
const IVS_ENDPOINT: &str = "/equities/eod/ivs";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 180;

/// 응답 본문. `{"data": [...]}` 엔벨로프와 맨바탕 배열 둘 다 수용합니다.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IvsResponse {
    Envelope { data: Vec<RawRecord> },
    Records(Vec<RawRecord>),
}

impl IvsResponse {
    fn into_records(self) -> Vec<RawRecord> {
        match self {
            Self::Envelope { data } => data,
            Self::Records(records) => records,
        }
    }
}

/// iVolatility API 클라이언트.
pub struct IvolApiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    fetch_timeout: Duration,
    retry: RetryConfig,
}

impl IvolApiClient {
    /// API 키로 클라이언트를 생성합니다.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| DataError::NetworkError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            retry: RetryConfig::default(),
        })
    }

    /// 베이스 URL 교체 (테스트용).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// 심볼당 전체 조회 시간 상한 교체.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// 재시도 설정 교체.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// 단일 API 요청 실행. 재시도/타임아웃은 `fetch_ivs`에서 감쌉니다.
    async fn request_ivs(
        &self,
        item: &WorkItem,
        range: &DateRange,
        params: &FetchParameters,
    ) -> Result<Vec<RawRecord>> {
        let url = format!("{}{}", self.base_url, IVS_ENDPOINT);
        let from = range.from().format("%Y-%m-%d").to_string();
        let to = range.to().format("%Y-%m-%d").to_string();
        let otm_from = params.otm_from.to_string();
        let otm_to = params.otm_to.to_string();
        let period_from = params.period_from.to_string();
        let period_to = params.period_to.to_string();

        tracing::debug!(symbol = %item.symbol, region = %item.region, range = %range, "IVS 조회 요청");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("apiKey", self.api_key.as_str()),
                ("symbol", item.symbol.as_str()),
                ("region", item.region.as_str()),
                ("from", from.as_str()),
                ("to", to.as_str()),
                ("OTMFrom", otm_from.as_str()),
                ("OTMTo", otm_to.as_str()),
                ("periodFrom", period_from.as_str()),
                ("periodTo", period_to.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(DataError::RateLimited);
        }
        if status.is_server_error() {
            return Err(DataError::NetworkError(format!(
                "server error {} for {}",
                status, item.symbol
            )));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(DataError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let records = response.json::<IvsResponse>().await?.into_records();

        tracing::debug!(symbol = %item.symbol, count = records.len(), "IVS 응답 수신");
        Ok(records)
    }
}

#[async_trait]
impl IvsProvider for IvolApiClient {
    async fn fetch_ivs(
        &self,
        item: &WorkItem,
        range: &DateRange,
        params: &FetchParameters,
    ) -> Result<Vec<RawRecord>> {
        let fetch = with_retry(&self.retry, "ivs_fetch", || {
            self.request_ivs(item, range, params)
        });

        match tokio::time::timeout(self.fetch_timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(DataError::Timeout(format!(
                "fetch for {} exceeded {}s limit",
                item.symbol,
                self.fetch_timeout.as_secs()
            ))),
        }
    }
}
