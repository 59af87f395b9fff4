//! 라이브 스냅샷 조회.
//!
//! 활성화된 엔드포인트를 동시에 조회합니다. 엔드포인트 하나의 실패는
//! 해당 항목을 비워두고 [`SnapshotWarning`]으로 기록할 뿐 전체 실행을
//! 중단하지 않습니다.

use std::future::Future;

use chrono::{DateTime, Utc};
use pnl_core::{LiveSnapshot, SnapshotEndpoint, SnapshotWarning};
use tracing::{info, warn};

use crate::connector::kraken_futures::KrakenFuturesClient;
use crate::Result;

/// 조회할 엔드포인트 선택.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRequest {
    pub fills: bool,
    pub open_positions: bool,
    pub accounts: bool,
    /// 이 시각 이후 체결만 조회
    pub last_fill_time: Option<DateTime<Utc>>,
}

impl Default for SnapshotRequest {
    fn default() -> Self {
        Self {
            fills: true,
            open_positions: true,
            accounts: true,
            last_fill_time: None,
        }
    }
}

impl SnapshotRequest {
    pub fn with_fills(mut self, enabled: bool) -> Self {
        self.fills = enabled;
        self
    }

    pub fn with_last_fill_time(mut self, ts: DateTime<Utc>) -> Self {
        self.last_fill_time = Some(ts);
        self
    }
}

async fn when_enabled<T>(enabled: bool, fetch: impl Future<Output = Result<T>>) -> Option<Result<T>> {
    if enabled {
        Some(fetch.await)
    } else {
        None
    }
}

fn settle<T>(
    endpoint: SnapshotEndpoint,
    outcome: Option<Result<T>>,
    warnings: &mut Vec<SnapshotWarning>,
) -> Option<T> {
    match outcome? {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(endpoint = %endpoint, error = %e, "스냅샷 조회 실패, 빈 항목으로 처리");
            warnings.push(SnapshotWarning::new(endpoint, e.to_string()));
            None
        }
    }
}

/// 라이브 스냅샷 조회.
///
/// 항상 스냅샷을 반환하며 실패한 엔드포인트는 `warnings`에 남습니다.
pub async fn fetch_live_snapshot(
    client: &KrakenFuturesClient,
    request: &SnapshotRequest,
) -> LiveSnapshot {
    let mut snapshot = LiveSnapshot::started_at(Utc::now());

    let (fills, open_positions, accounts) = tokio::join!(
        when_enabled(request.fills, client.fetch_fills(request.last_fill_time)),
        when_enabled(request.open_positions, client.fetch_open_positions()),
        when_enabled(request.accounts, client.fetch_accounts()),
    );

    snapshot.fills = settle(SnapshotEndpoint::Fills, fills, &mut snapshot.warnings);
    snapshot.open_positions = settle(
        SnapshotEndpoint::OpenPositions,
        open_positions,
        &mut snapshot.warnings,
    );
    snapshot.accounts = settle(SnapshotEndpoint::Accounts, accounts, &mut snapshot.warnings);

    let summary = snapshot.summary();
    info!(
        fills = ?summary.fills_count,
        open_positions = ?summary.open_positions_count,
        accounts = summary.accounts_keys.len(),
        warnings = snapshot.warnings.len(),
        "라이브 스냅샷 조회 완료"
    );

    snapshot
}
