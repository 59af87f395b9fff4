//! Source Mapper: 원천 행 → 정규화된 원장 레코드.
//!
//! 원천마다 하나의 [`SourceMapper`] 구현을 둡니다. 새로운 원천을 추가할 때는
//! 구현체만 추가하면 되며 Merge Engine은 수정할 필요가 없습니다.
//!
//! # 구현체
//!
//! - [`AccountLogMapper`]: 거래소 계좌 로그 내보내기 (체결/펀딩/기타 장부 행)
//! - [`OrderHistoryMapper`]: 주문 내역 내보내기 (체결 완료 주문)

mod account_log;
mod order_history;

pub use account_log::AccountLogMapper;
pub use order_history::OrderHistoryMapper;

use serde::{Deserialize, Serialize};

use crate::domain::{CanonicalTradeRecord, Source};
use crate::table::RawTable;

/// 원천별 매핑 인터페이스.
pub trait SourceMapper: Send + Sync {
    /// 레코드에 기록할 원천.
    fn source(&self) -> Source;

    /// 로그/통계용 매퍼 종류 이름.
    fn kind(&self) -> &'static str;

    /// 원천 표 전체를 매핑합니다.
    ///
    /// 개별 값의 해석 실패나 알아볼 수 없는 행은 에러가 아니며
    /// [`MapReport`]에 집계됩니다.
    fn map(&self, table: &RawTable) -> MappedBatch;
}

/// 매핑 결과 (레코드 + 집계).
#[derive(Debug, Clone, Default)]
pub struct MappedBatch {
    pub records: Vec<CanonicalTradeRecord>,
    pub report: MapReport,
}

/// 매핑 집계.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapReport {
    /// 읽은 행 수 (디코딩 실패 행 포함)
    pub rows_read: usize,
    /// 생성된 레코드 수
    pub records_emitted: usize,
    /// 형태를 알아볼 수 없어 건너뛴 행
    pub skipped_shape: usize,
    /// 체결 완료가 아니라서 건너뛴 행
    pub skipped_status: usize,
    /// 손익 영향이 없는 장부 행
    pub skipped_noise: usize,
    /// 손익 값이 자리표시자(`--`)인 행
    pub skipped_placeholder: usize,
    /// 금액이 표현 범위를 넘어 해석할 수 없는 행
    pub skipped_overflow: usize,
    /// 시각 해석 실패로 현재 시각을 쓴 행
    pub timestamp_fallbacks: usize,
}

impl MapReport {
    /// 건너뛴 행 합계.
    pub fn skipped(&self) -> usize {
        self.skipped_shape
            + self.skipped_status
            + self.skipped_noise
            + self.skipped_placeholder
            + self.skipped_overflow
    }

    /// 다른 집계를 더합니다.
    pub fn absorb(&mut self, other: &MapReport) {
        self.rows_read += other.rows_read;
        self.records_emitted += other.records_emitted;
        self.skipped_shape += other.skipped_shape;
        self.skipped_status += other.skipped_status;
        self.skipped_noise += other.skipped_noise;
        self.skipped_placeholder += other.skipped_placeholder;
        self.skipped_overflow += other.skipped_overflow;
        self.timestamp_fallbacks += other.timestamp_fallbacks;
    }
}

/// identity key에 넣을 시각 텍스트.
///
/// 해석에 성공하면 정규화된 RFC 3339, 실패하면 원본 텍스트를 씁니다.
/// 대체 시각(현재 시각)은 재실행마다 달라지므로 키에 넣지 않습니다.
pub(crate) fn key_timestamp(raw: &str, parsed: &crate::normalize::ParsedTimestamp) -> String {
    if parsed.is_fallback() {
        raw.trim().to_string()
    } else {
        parsed.value().to_rfc3339()
    }
}
