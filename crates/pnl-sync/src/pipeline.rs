//! 동기화 파이프라인.
//!
//! ```text
//! 입력 CSV ──▶ RawTable ──▶ SourceMapper ──┐
//!                                          ├──▶ MergeEngine ──▶ LedgerPayload
//! (선택) 라이브 스냅샷 ──▶ RunMeta ─────────┘
//! ```
//!
//! 입력 파일을 읽을 수 없거나 스냅샷 조회가 실패해도 원장은 항상 만들어지며,
//! 그 사실은 `meta.warnings`에 남습니다.

use std::io::ErrorKind;
use std::path::Path;
use std::time::Instant;

use chrono::Utc;
use pnl_core::{
    AccountLogMapper, CanonicalTradeRecord, CoreError, InputSummary, LedgerPayload, MergeEngine,
    OrderHistoryMapper, RawTable, RunMeta, SnapshotStatus, Source, SourceMapper,
};
use pnl_exchange::{fetch_live_snapshot, KrakenFuturesClient, SnapshotRequest};
use tracing::{debug, info, warn};

use crate::config::{SnapshotMode, SyncConfig};
use crate::error::SyncError;
use crate::stats::RunStats;
use crate::Result;

/// 동기화 파이프라인
pub struct SyncPipeline {
    config: SyncConfig,
}

impl SyncPipeline {
    pub fn new(config: SyncConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// 원장 생성.
    ///
    /// 스냅샷 필수 모드인데 자격 증명이 없으면 입력을 읽기 전에 실패합니다.
    pub async fn run(&self) -> Result<(LedgerPayload, RunStats)> {
        let started = Instant::now();

        if self.config.snapshot.mode == SnapshotMode::Required && self.config.credentials.is_none()
        {
            return Err(SyncError::MissingCredentials(
                "KRAKEN_FUTURES_KEY / KRAKEN_FUTURES_SECRET".to_string(),
            ));
        }

        let mut meta = RunMeta::new(Utc::now());
        let streams = self.load_inputs(&mut meta);
        self.attach_snapshot(&mut meta).await;

        let outcome = MergeEngine::new().merge(streams);
        let payload = LedgerPayload::new(outcome, meta);
        let stats = RunStats::from_payload(&payload, started.elapsed());

        Ok((payload, stats))
    }

    /// 설정된 모든 입력을 매핑합니다. 입력 순서가 곧 중복 제거 우선순위입니다.
    pub fn load_inputs(&self, meta: &mut RunMeta) -> Vec<Vec<CanonicalTradeRecord>> {
        let inputs = &self.config.inputs;
        let account_log = AccountLogMapper::new(Source::KrakenFutures);
        let order_history = OrderHistoryMapper::new(inputs.order_history_source);

        let mut streams = Vec::new();
        for path in &inputs.account_logs {
            streams.push(ingest(path, &account_log, meta));
        }
        for path in &inputs.order_histories {
            streams.push(ingest(path, &order_history, meta));
        }
        streams
    }

    /// 모드에 따라 라이브 스냅샷을 조회해 메타데이터에 첨부합니다.
    pub async fn attach_snapshot(&self, meta: &mut RunMeta) {
        if self.config.snapshot.mode == SnapshotMode::Off {
            meta.snapshot_status = SnapshotStatus::Disabled;
            return;
        }

        let Some(client_config) = self.config.client_config() else {
            info!("자격 증명 없음, 라이브 스냅샷 건너뜀");
            meta.snapshot_status = SnapshotStatus::Skipped;
            meta.warnings.push("snapshot skipped (no key/secret)".to_string());
            return;
        };

        let client = match KrakenFuturesClient::new(client_config) {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "거래소 클라이언트 생성 실패, 라이브 스냅샷 건너뜀");
                meta.snapshot_status = SnapshotStatus::Skipped;
                meta.warnings.push(format!("snapshot skipped: {e}"));
                return;
            }
        };

        let request = SnapshotRequest::default().with_fills(self.config.snapshot.include_fills);
        let snapshot = fetch_live_snapshot(&client, &request).await;
        meta.attach_snapshot(snapshot);
    }
}

/// 파일 하나를 읽어 매핑합니다.
///
/// 파일이 없거나 읽을 수 없으면 경고만 남기고 빈 스트림을 반환합니다.
fn ingest(path: &Path, mapper: &dyn SourceMapper, meta: &mut RunMeta) -> Vec<CanonicalTradeRecord> {
    let table = match RawTable::from_path(path) {
        Ok(table) => table,
        Err(CoreError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
            warn!(path = %path.display(), kind = mapper.kind(), "입력 파일 없음, 건너뜀");
            meta.warnings.push(format!("input not found: {}", path.display()));
            return Vec::new();
        }
        Err(e) => {
            warn!(path = %path.display(), kind = mapper.kind(), error = %e, "입력 파일 읽기 실패, 건너뜀");
            meta.warnings.push(format!("input unreadable: {}: {e}", path.display()));
            return Vec::new();
        }
    };

    if table.lossy_rows() > 0 {
        warn!(
            path = %path.display(),
            rows = table.lossy_rows(),
            "UTF-8이 아닌 바이트를 대체 문자로 바꿨습니다"
        );
    }

    let batch = mapper.map(&table);
    debug!(
        path = %path.display(),
        kind = mapper.kind(),
        rows = batch.report.rows_read,
        records = batch.report.records_emitted,
        "입력 매핑 완료"
    );

    meta.inputs.push(InputSummary {
        origin: path.display().to_string(),
        source: mapper.source(),
        kind: mapper.kind().to_string(),
        report: batch.report,
    });
    batch.records
}
