//! 원장 출력 페이로드.
//!
//! 정렬/중복 제거된 레코드와 실행 메타데이터(생성 시각, 원천별 건수,
//! 라이브 스냅샷)를 담습니다. 저장 형식은 경계 계층이 결정하며
//! 여기서는 serde 직렬화만 제공합니다.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{CanonicalTradeRecord, LiveSnapshot, SnapshotSummary, Source};
use crate::mapper::MapReport;
use crate::merge::{MergeOutcome, MergeStats};

/// 라이브 스냅샷 대상 거래소 식별자.
pub const LIVE_EXCHANGE: &str = "kraken_futures";

/// 입력 하나(파일 등)의 매핑 요약.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputSummary {
    /// 입력 위치 (파일 경로 등)
    pub origin: String,
    pub source: Source,
    /// 매퍼 종류 (`account_log`, `order_history`)
    pub kind: String,
    pub report: MapReport,
}

/// 스냅샷 조회 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotStatus {
    /// 모든 엔드포인트 조회 성공
    Fetched,
    /// 일부 엔드포인트 실패
    Partial,
    /// 자격 증명이 없어 건너뜀
    Skipped,
    /// 설정으로 비활성화
    Disabled,
}

/// 실행 메타데이터.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMeta {
    pub synced_at: DateTime<Utc>,
    pub inputs: Vec<InputSummary>,
    pub snapshot_status: SnapshotStatus,
    pub snapshot_summary: Option<SnapshotSummary>,
    pub snapshot: Option<LiveSnapshot>,
    /// 실행을 중단하지 않은 경고 (입력 누락, 스냅샷 실패 등)
    pub warnings: Vec<String>,
}

impl RunMeta {
    pub fn new(synced_at: DateTime<Utc>) -> Self {
        Self {
            synced_at,
            inputs: Vec::new(),
            snapshot_status: SnapshotStatus::Disabled,
            snapshot_summary: None,
            snapshot: None,
            warnings: Vec::new(),
        }
    }

    /// 스냅샷 첨부. 엔드포인트 경고는 실행 경고에도 추가합니다.
    pub fn attach_snapshot(&mut self, snapshot: LiveSnapshot) {
        self.snapshot_status = if snapshot.has_warnings() {
            SnapshotStatus::Partial
        } else {
            SnapshotStatus::Fetched
        };
        self.warnings.extend(
            snapshot
                .warnings
                .iter()
                .map(|w| format!("snapshot {}: {}", w.endpoint, w.message)),
        );
        self.snapshot_summary = Some(snapshot.summary());
        self.snapshot = Some(snapshot);
    }
}

/// 원장 건수 집계.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerCounts {
    /// 원장 레코드 수
    pub rows: usize,
    /// 원천 코드별 레코드 수
    pub per_source: BTreeMap<String, usize>,
    pub duplicates_dropped: usize,
    pub timestamp_fallbacks: usize,
    pub skipped_rows: usize,
}

impl LedgerCounts {
    fn tally(records: &[CanonicalTradeRecord], stats: &MergeStats, inputs: &[InputSummary]) -> Self {
        let mut per_source = BTreeMap::new();
        for record in records {
            *per_source.entry(record.source.code().to_string()).or_insert(0) += 1;
        }

        Self {
            rows: records.len(),
            per_source,
            duplicates_dropped: stats.duplicates_dropped,
            timestamp_fallbacks: inputs.iter().map(|i| i.report.timestamp_fallbacks).sum(),
            skipped_rows: inputs.iter().map(|i| i.report.skipped()).sum(),
        }
    }
}

/// 최종 원장 페이로드.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerPayload {
    pub generated_at: DateTime<Utc>,
    /// 원장이 생성되었으면 항상 true (스냅샷 실패와 무관)
    pub ok: bool,
    pub exchange: String,
    pub rows: Vec<CanonicalTradeRecord>,
    pub counts: LedgerCounts,
    pub meta: RunMeta,
}

impl LedgerPayload {
    pub fn new(outcome: MergeOutcome, meta: RunMeta) -> Self {
        let counts = LedgerCounts::tally(&outcome.records, &outcome.stats, &meta.inputs);
        Self {
            generated_at: Utc::now(),
            ok: true,
            exchange: LIVE_EXCHANGE.to_string(),
            rows: outcome.records,
            counts,
            meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::domain::{SnapshotEndpoint, SnapshotWarning};
    use crate::merge::MergeEngine;

    fn record(source: Source, key: &str) -> CanonicalTradeRecord {
        CanonicalTradeRecord::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            source,
            "X",
        )
        .with_realized_pnl(dec!(1))
        .with_identity_key(key)
    }

    #[test]
    fn test_counts_per_source() {
        let outcome = MergeEngine::new().merge([
            vec![record(Source::KrakenFutures, "a"), record(Source::KrakenFutures, "b")],
            vec![record(Source::BybitFutures, "c"), record(Source::BybitFutures, "a")],
        ]);
        let mut meta = RunMeta::new(Utc::now());
        meta.inputs.push(InputSummary {
            origin: "a.csv".into(),
            source: Source::KrakenFutures,
            kind: "account_log".into(),
            report: MapReport {
                rows_read: 5,
                records_emitted: 2,
                skipped_noise: 3,
                timestamp_fallbacks: 1,
                ..Default::default()
            },
        });

        let payload = LedgerPayload::new(outcome, meta);

        assert_eq!(payload.counts.rows, 3);
        assert_eq!(payload.counts.per_source["KRAKENF"], 2);
        assert_eq!(payload.counts.per_source["BYBITF"], 1);
        assert_eq!(payload.counts.duplicates_dropped, 1);
        assert_eq!(payload.counts.skipped_rows, 3);
        assert_eq!(payload.counts.timestamp_fallbacks, 1);
        assert!(payload.ok);
        assert_eq!(payload.exchange, "kraken_futures");
    }

    #[test]
    fn test_partial_snapshot_adds_warnings() {
        let mut snapshot = LiveSnapshot::started_at(Utc::now());
        snapshot.open_positions = Some(vec![]);
        snapshot
            .warnings
            .push(SnapshotWarning::new(SnapshotEndpoint::Accounts, "HTTP 503"));

        let mut meta = RunMeta::new(Utc::now());
        meta.attach_snapshot(snapshot);

        assert_eq!(meta.snapshot_status, SnapshotStatus::Partial);
        assert_eq!(meta.warnings, ["snapshot accounts: HTTP 503"]);
        assert_eq!(
            meta.snapshot_summary.as_ref().unwrap().open_positions_count,
            Some(0)
        );
    }

    #[test]
    fn test_payload_json_shape() {
        let payload = LedgerPayload::new(MergeOutcome::default(), RunMeta::new(Utc::now()));
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["ok"], true);
        assert!(json["rows"].as_array().unwrap().is_empty());
        assert_eq!(json["meta"]["snapshotStatus"], "disabled");
        assert!(json.get("generatedAt").is_some());
    }
}
