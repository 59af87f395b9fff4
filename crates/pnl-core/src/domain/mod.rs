//! 도메인 타입.

mod record;
mod snapshot;

pub use record::{CanonicalTradeRecord, MarketType, Source};
pub use snapshot::{LiveSnapshot, SnapshotEndpoint, SnapshotSummary, SnapshotWarning};
