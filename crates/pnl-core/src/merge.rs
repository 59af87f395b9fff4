//! Identity & Merge Engine.
//!
//! 여러 원천의 레코드 스트림을 하나의 원장으로 합칩니다.
//!
//! 1. 모든 스트림을 입력 순서대로 이어붙임
//! 2. 레코드마다 유효 키 결정 (identity key, 비어있으면 대체 키)
//! 3. 처음 본 키만 유지 (first-seen wins, 원천 무관)
//! 4. 시각 오름차순 안정 정렬 (동률은 입력 순서 유지)
//!
//! 본 키 집합은 엔진 인스턴스가 소유하며 `merge` 호출이 엔진을 소비하므로
//! 실행마다 새 엔진을 만들어야 합니다.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::CanonicalTradeRecord;

/// 병합 통계.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeStats {
    /// 입력 레코드 수
    pub input_records: usize,
    /// 중복으로 버린 레코드 수
    pub duplicates_dropped: usize,
    /// 대체 키를 부여한 레코드 수
    pub fallback_keys: usize,
}

/// 병합 결과.
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    /// 중복 제거 + 시각 정렬된 원장
    pub records: Vec<CanonicalTradeRecord>,
    pub stats: MergeStats,
}

/// 중복 제거/정렬 엔진.
#[derive(Debug, Default)]
pub struct MergeEngine {
    seen: HashSet<String>,
    stats: MergeStats,
}

impl MergeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// 스트림들을 병합합니다. 입력이 비어있으면 빈 원장을 반환합니다.
    pub fn merge<I, S>(mut self, streams: I) -> MergeOutcome
    where
        I: IntoIterator<Item = S>,
        S: IntoIterator<Item = CanonicalTradeRecord>,
    {
        let mut records: Vec<CanonicalTradeRecord> = streams
            .into_iter()
            .flatten()
            .filter_map(|record| self.admit(record))
            .collect();

        // sort_by_key는 안정 정렬
        records.sort_by_key(|record| record.timestamp);

        tracing::debug!(
            input = self.stats.input_records,
            kept = records.len(),
            duplicates = self.stats.duplicates_dropped,
            fallback_keys = self.stats.fallback_keys,
            "원장 병합 완료"
        );

        MergeOutcome {
            records,
            stats: self.stats,
        }
    }

    fn admit(&mut self, mut record: CanonicalTradeRecord) -> Option<CanonicalTradeRecord> {
        self.stats.input_records += 1;

        if record.identity_key().trim().is_empty() {
            record.replace_identity_key(record.fallback_identity_key());
            self.stats.fallback_keys += 1;
        }

        if self.seen.insert(record.identity_key().to_string()) {
            Some(record)
        } else {
            tracing::trace!(key = %record.identity_key(), "중복 레코드 제외");
            self.stats.duplicates_dropped += 1;
            None
        }
    }
}

/// 새 엔진으로 한 번 병합하는 편의 함수.
pub fn merge_streams<I, S>(streams: I) -> Vec<CanonicalTradeRecord>
where
    I: IntoIterator<Item = S>,
    S: IntoIterator<Item = CanonicalTradeRecord>,
{
    MergeEngine::new().merge(streams).records
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal_macros::dec;

    use super::*;
    use crate::domain::Source;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, hour, 0, 0).unwrap()
    }

    fn record(hour: u32, key: &str, notes: &str) -> CanonicalTradeRecord {
        CanonicalTradeRecord::new(at(hour), Source::KrakenFutures, "PF_XBTUSD")
            .with_realized_pnl(dec!(1))
            .with_identity_key(key)
            .with_notes(notes)
    }

    #[test]
    fn test_empty_input() {
        let outcome = MergeEngine::new().merge(Vec::<Vec<CanonicalTradeRecord>>::new());
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.stats, MergeStats::default());
    }

    #[test]
    fn test_first_seen_wins_across_streams() {
        let a = vec![record(2, "k1", "first")];
        let b = vec![record(1, "k1", "second"), record(3, "k2", "other")];

        let outcome = MergeEngine::new().merge([a, b]);

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[0].notes, "first");
        assert_eq!(outcome.records[0].timestamp, at(2));
        assert_eq!(outcome.stats.duplicates_dropped, 1);
    }

    #[test]
    fn test_sorted_with_stable_ties() {
        let stream = vec![
            record(5, "a", "late"),
            record(1, "b", "tie-1"),
            record(1, "c", "tie-2"),
            record(0, "d", "early"),
        ];

        let notes: Vec<_> = merge_streams([stream])
            .into_iter()
            .map(|r| r.notes)
            .collect();

        assert_eq!(notes, ["early", "tie-1", "tie-2", "late"]);
    }

    #[test]
    fn test_empty_key_rewritten_to_fallback() {
        let keyless = CanonicalTradeRecord::new(at(1), Source::BybitFutures, "BTCUSDT")
            .with_realized_pnl(dec!(2.5));
        let duplicate = keyless.clone();

        let outcome = MergeEngine::new().merge([vec![keyless, duplicate]]);

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.stats.fallback_keys, 2);
        assert_eq!(
            outcome.records[0].identity_key(),
            "2024-03-05T01:00:00+00:00|BYBITF|BTCUSDT|2.5"
        );
    }

    #[test]
    fn test_reingestion_is_idempotent() {
        let a = vec![record(3, "a1", "a"), record(1, "a2", "a")];
        let b = vec![record(2, "b1", "b")];

        let once = merge_streams([a.clone(), b.clone()]);
        let twice = merge_streams([a.clone(), b.clone(), a, b]);

        assert_eq!(once, twice);
    }
}
