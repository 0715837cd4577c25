//! 데이터 Provider 모듈.
//!
//! 원격 피드에서 IVS 데이터를 가져오는 쪽의 추상화와 구현을 정의합니다.
//!
//! ## iVolatility REST API
//! - `IvolApiClient`: `/equities/eod/ivs` 엔드포인트 클라이언트 (API 키 필요)
//! - 심볼·지역·날짜 범위·OTM/만기 필터 기준 EOD 내재변동성 표면 조회

pub mod ivolatility;

pub use ivolatility::IvolApiClient;

use crate::error::Result;
use async_trait::async_trait;
use ivs_core::{DateRange, FetchParameters, RawRecord, WorkItem};

/// IVS 데이터 제공자 추상화.
///
/// 파이프라인이 조회 측을 바라보는 유일한 창구이며, 테스트에서는
/// 스텁 구현으로 대체합니다.
#[async_trait]
pub trait IvsProvider: Send + Sync {
    /// 심볼 하나의 요청 구간 전체 레코드를 조회합니다.
    ///
    /// 전체 레코드를 반환하거나 오류를 내며, 조용히 잘린 부분 결과는
    /// 허용하지 않습니다.
    async fn fetch_ivs(
        &self,
        item: &WorkItem,
        range: &DateRange,
        params: &FetchParameters,
    ) -> Result<Vec<RawRecord>>;
}
