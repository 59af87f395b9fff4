//! 계좌 로그(account log) 매퍼.
//!
//! 거래소 계좌 로그 내보내기는 체결, 펀딩, 입출금, 담보 변경 등 모든 장부
//! 이벤트를 한 파일에 담습니다. 손익 규칙:
//!
//! | 유형 | realized_pnl | fees | funding |
//! |---|---|---|---|
//! | `futures trade` 포함 | 실현 손익 | \|수수료\| | 0 |
//! | `funding` 포함 | 0 | 0 | 실현 펀딩 (0이면 `change`) |
//! | 그 외 | 실현 손익 | \|수수료\| | 실현 펀딩 |
//!
//! 그 외 유형 중 순손익이 0인 행은 장부 정리용 노이즈로 버립니다.
//! 계좌 로그에는 신뢰할 만한 수량 컬럼이 없으므로 수량은 항상 0입니다.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::{key_timestamp, MapReport, MappedBatch, SourceMapper};
use crate::domain::{CanonicalTradeRecord, Source};
use crate::normalize::{parse_number, parse_timestamp, TimestampFormat};
use crate::table::{RawRow, RawTable};

const ROW_ID: &[&str] = &["uid", "id", "log id", "transaction id"];
const TIMESTAMP: &[&str] = &["datetime", "date time", "timestamp", "time", "date"];
const KIND: &[&str] = &["type", "transaction type"];
const SYMBOL: &[&str] = &["symbol", "contract", "instrument"];
const SIDE: &[&str] = &["side", "direction"];
const TRADE_PRICE: &[&str] = &["trade price", "price"];
const REALIZED_PNL: &[&str] = &["realized pnl", "realised pnl"];
const FEE: &[&str] = &["fee", "fees"];
const REALIZED_FUNDING: &[&str] = &["realized funding", "realised funding"];
const CHANGE: &[&str] = &["change", "amount"];

/// 순손익 0 판정 허용 오차.
const NOISE_EPSILON: Decimal = dec!(0.000000000001);

const DEFAULT_HINTS: [TimestampFormat; 4] = [
    TimestampFormat::Iso8601,
    TimestampFormat::DayMonthNameYear,
    TimestampFormat::MonthDayYear,
    TimestampFormat::EpochMillis,
];

/// 계좌 로그 매퍼.
#[derive(Debug, Clone)]
pub struct AccountLogMapper {
    source: Source,
    timestamp_hints: Vec<TimestampFormat>,
}

impl AccountLogMapper {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            timestamp_hints: DEFAULT_HINTS.to_vec(),
        }
    }

    /// Kraken Futures 계좌 로그 매퍼.
    pub fn kraken_futures() -> Self {
        Self::new(Source::KrakenFutures)
    }

    /// 시각 형식 후보 교체 (앞쪽이 우선).
    pub fn with_timestamp_hints(mut self, hints: impl Into<Vec<TimestampFormat>>) -> Self {
        self.timestamp_hints = hints.into();
        self
    }

    fn map_row(&self, row: &RawRow, report: &mut MapReport) -> Option<CanonicalTradeRecord> {
        let row_id = row.get(ROW_ID);
        let kind_label = row.get(KIND);
        let symbol = row.get(SYMBOL);

        if row.is_blank() || (row_id.is_empty() && kind_label.is_empty() && symbol.is_empty()) {
            report.skipped_shape += 1;
            return None;
        }

        let kind = kind_label.to_lowercase();
        let is_trade = kind.contains("futures trade");
        let is_funding = kind.contains("funding");

        let raw_ts = row.get(TIMESTAMP);
        let parsed_ts = parse_timestamp(raw_ts, &self.timestamp_hints);
        if parsed_ts.is_fallback() {
            report.timestamp_fallbacks += 1;
            tracing::warn!(
                line = row.line(),
                raw = %raw_ts,
                "계좌 로그 시각 해석 실패, 현재 시각 사용"
            );
        }

        let side = match row.get(SIDE) {
            "" => kind_label.to_string(),
            side => side.to_uppercase(),
        };

        let mut record = CanonicalTradeRecord::new(parsed_ts.value(), self.source, symbol)
            .with_side(side)
            .with_price(parse_number(row.get(TRADE_PRICE)));

        if is_trade {
            record = record
                .with_realized_pnl(parse_number(row.get(REALIZED_PNL)))
                .with_fees(parse_number(row.get(FEE)));
        }

        if is_funding {
            let realized_funding = parse_number(row.get(REALIZED_FUNDING));
            let funding = if realized_funding.is_zero() {
                parse_number(row.get(CHANGE))
            } else {
                realized_funding
            };
            record = record.with_funding(funding);
        }

        if !is_trade && !is_funding {
            record = record
                .with_realized_pnl(parse_number(row.get(REALIZED_PNL)))
                .with_fees(parse_number(row.get(FEE)))
                .with_funding(parse_number(row.get(REALIZED_FUNDING)));

            if record.net_pnl().abs() <= NOISE_EPSILON {
                report.skipped_noise += 1;
                return None;
            }
        }

        if record.is_net_saturated() {
            report.skipped_overflow += 1;
            tracing::warn!(line = row.line(), "계좌 로그 금액이 표현 범위를 넘음, 행 건너뜀");
            return None;
        }

        let identity_key = if row_id.is_empty() {
            format!(
                "LOG|{}|{}|{}",
                key_timestamp(raw_ts, &parsed_ts),
                record.symbol,
                record.net_pnl().normalize()
            )
        } else {
            format!("{}|LOG|{}", self.source.code(), row_id)
        };

        let notes = if kind_label.is_empty() {
            format!("{} account log", self.source.description())
        } else {
            format!("{} account log: {}", self.source.description(), kind_label)
        };

        Some(record.with_identity_key(identity_key).with_notes(notes))
    }
}

impl SourceMapper for AccountLogMapper {
    fn source(&self) -> Source {
        self.source
    }

    fn kind(&self) -> &'static str {
        "account_log"
    }

    fn map(&self, table: &RawTable) -> MappedBatch {
        let mut report = MapReport {
            rows_read: table.len() + table.malformed_rows(),
            skipped_shape: table.malformed_rows(),
            ..Default::default()
        };

        if table.rows().first().is_some_and(|row| !row.has_column(TIMESTAMP)) {
            tracing::warn!(
                origin = %table.origin(),
                "계좌 로그 시각 컬럼 없음, 모든 행에 현재 시각을 사용합니다"
            );
        }

        let records: Vec<_> = table
            .rows()
            .iter()
            .filter_map(|row| self.map_row(row, &mut report))
            .collect();
        report.records_emitted = records.len();

        tracing::debug!(
            origin = %table.origin(),
            source = %self.source,
            rows = report.rows_read,
            records = report.records_emitted,
            noise = report.skipped_noise,
            "계좌 로그 매핑 완료"
        );

        MappedBatch { records, report }
    }
}
