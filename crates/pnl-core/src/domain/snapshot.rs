//! 거래소 라이브 스냅샷 타입.
//!
//! 서명된 API로 조회한 현재 상태(체결, 미결제 포지션, 계좌 잔고)를 담습니다.
//! 스냅샷은 원장에 병합되지 않고 메타데이터로만 첨부됩니다.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 계좌 키 요약에 포함할 최대 개수.
const MAX_SUMMARY_ACCOUNT_KEYS: usize = 50;

/// 스냅샷 조회 대상.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SnapshotEndpoint {
    /// 최근 체결 내역
    Fills,
    /// 미결제 포지션
    OpenPositions,
    /// 계좌별 잔고
    Accounts,
}

impl SnapshotEndpoint {
    /// 응답 본문에서 페이로드를 담고 있는 키.
    pub fn payload_key(&self) -> &'static str {
        match self {
            SnapshotEndpoint::Fills => "fills",
            SnapshotEndpoint::OpenPositions => "openPositions",
            SnapshotEndpoint::Accounts => "accounts",
        }
    }
}

impl fmt::Display for SnapshotEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.payload_key())
    }
}

/// 엔드포인트 단위 조회 실패 (치명적이지 않음).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotWarning {
    pub endpoint: SnapshotEndpoint,
    pub message: String,
}

impl SnapshotWarning {
    pub fn new(endpoint: SnapshotEndpoint, message: impl Into<String>) -> Self {
        Self {
            endpoint,
            message: message.into(),
        }
    }
}

/// 라이브 스냅샷.
///
/// 조회하지 않았거나 실패한 항목은 `None`으로 남고, 실패 사유는
/// `warnings`에 기록됩니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveSnapshot {
    /// 조회 시각
    pub fetched_at: Option<DateTime<Utc>>,
    /// 원본 체결 목록
    pub fills: Option<Vec<Value>>,
    /// 원본 미결제 포지션 목록
    pub open_positions: Option<Vec<Value>>,
    /// 계좌 식별자 → 잔고 원본
    pub accounts: Option<Map<String, Value>>,
    /// 엔드포인트별 실패 내역
    pub warnings: Vec<SnapshotWarning>,
}

impl LiveSnapshot {
    /// 조회 시각만 채운 빈 스냅샷.
    pub fn started_at(fetched_at: DateTime<Utc>) -> Self {
        Self {
            fetched_at: Some(fetched_at),
            ..Default::default()
        }
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// 메타데이터용 요약.
    pub fn summary(&self) -> SnapshotSummary {
        SnapshotSummary {
            fills_count: self.fills.as_ref().map(Vec::len),
            open_positions_count: self.open_positions.as_ref().map(Vec::len),
            accounts_keys: self
                .accounts
                .as_ref()
                .map(|accounts| {
                    accounts
                        .keys()
                        .take(MAX_SUMMARY_ACCOUNT_KEYS)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

/// 스냅샷 요약 (건수와 계좌 키).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSummary {
    pub fills_count: Option<usize>,
    pub open_positions_count: Option<usize>,
    /// 응답에 나온 순서대로 최대 50개
    pub accounts_keys: Vec<String>,
}
