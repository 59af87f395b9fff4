//! 실행 통계 구조체.

use std::time::Duration;

use pnl_core::{LedgerPayload, MapReport, SnapshotStatus};
use serde::Serialize;

/// 동기화 실행 통계
#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    /// 처리한 입력 파일 수
    pub inputs: usize,
    /// 읽은 행 수 (모든 입력 합계)
    pub rows_read: usize,
    /// 매퍼가 만든 레코드 수
    pub records_emitted: usize,
    /// 건너뛴 행 수
    pub skipped_rows: usize,
    /// 중복으로 버린 레코드 수
    pub duplicates_dropped: usize,
    /// 시각 해석 실패로 현재 시각을 쓴 횟수
    pub timestamp_fallbacks: usize,
    /// 최종 원장 레코드 수
    pub ledger_rows: usize,
    pub snapshot_status: SnapshotStatus,
    /// 경고 수
    pub warnings: usize,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl RunStats {
    pub fn from_payload(payload: &LedgerPayload, elapsed: Duration) -> Self {
        let inputs = &payload.meta.inputs;
        let mut total = MapReport::default();
        for input in inputs {
            total.absorb(&input.report);
        }

        Self {
            inputs: inputs.len(),
            rows_read: total.rows_read,
            records_emitted: total.records_emitted,
            skipped_rows: payload.counts.skipped_rows,
            duplicates_dropped: payload.counts.duplicates_dropped,
            timestamp_fallbacks: payload.counts.timestamp_fallbacks,
            ledger_rows: payload.counts.rows,
            snapshot_status: payload.meta.snapshot_status,
            warnings: payload.meta.warnings.len(),
            elapsed,
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            inputs = self.inputs,
            rows_read = self.rows_read,
            records = self.records_emitted,
            skipped = self.skipped_rows,
            duplicates = self.duplicates_dropped,
            timestamp_fallbacks = self.timestamp_fallbacks,
            ledger_rows = self.ledger_rows,
            snapshot = ?self.snapshot_status,
            warnings = self.warnings,
            elapsed = format!("{:.2}s", self.elapsed.as_secs_f64()),
            "동기화 완료"
        );

        if self.timestamp_fallbacks > 0 {
            tracing::warn!(
                count = self.timestamp_fallbacks,
                "시각을 해석하지 못해 현재 시각으로 대체한 행이 있습니다"
            );
        }
    }
}
