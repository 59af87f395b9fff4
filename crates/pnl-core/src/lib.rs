//! PnL 원장 핵심 크레이트.
//!
//! 이기종 원천(거래소 계좌 로그, 주문 내역 CSV)을 하나의 중복 제거된
//! 시각순 실현 손익 원장으로 정규화합니다.
//!
//! # 흐름
//!
//! ```text
//! RawTable ──▶ SourceMapper (normalize 사용) ──▶ Vec<CanonicalTradeRecord>
//!                                                     │
//!                        여러 원천 스트림 ──▶ MergeEngine ──▶ 원장
//! ```

pub mod domain;
pub mod error;
pub mod ledger;
pub mod mapper;
pub mod merge;
pub mod normalize;
pub mod table;

pub use domain::{
    CanonicalTradeRecord, LiveSnapshot, MarketType, SnapshotEndpoint, SnapshotSummary,
    SnapshotWarning, Source,
};
pub use error::{CoreError, Result};
pub use ledger::{InputSummary, LedgerCounts, LedgerPayload, RunMeta, SnapshotStatus};
pub use mapper::{AccountLogMapper, MapReport, MappedBatch, OrderHistoryMapper, SourceMapper};
pub use merge::{merge_streams, MergeEngine, MergeOutcome, MergeStats};
pub use normalize::{parse_number, parse_timestamp, ParsedTimestamp, TimestampFormat};
pub use table::{RawRow, RawTable};
