//! 주문 내역(order history) 매퍼.
//!
//! 주문 내역 내보내기에는 펀딩 개념이 없고 신뢰할 수 있는 고유 ID도 없습니다.
//! 체결 완료(`filled`) 주문 중 손익 값이 있는 행만 레코드로 만들며,
//! identity key는 관측 가능한 필드 조합으로 만듭니다.

use super::{key_timestamp, MapReport, MappedBatch, SourceMapper};
use crate::domain::{CanonicalTradeRecord, Source};
use crate::normalize::{is_placeholder, parse_number, parse_timestamp, TimestampFormat};
use crate::table::{RawRow, RawTable};

const TIMESTAMP: &[&str] = &[
    "time",
    "date",
    "datetime",
    "date time",
    "order time",
    "created time",
    "create time",
    "updated time",
    "timestamp",
];
const STATUS: &[&str] = &["status", "order status", "state"];
const SIDE: &[&str] = &["side", "direction", "buy/sell"];
const SYMBOL: &[&str] = &["symbol", "contract", "instrument", "market", "pair"];
const FILLED_QTY: &[&str] = &[
    "filled",
    "filled qty",
    "filled quantity",
    "executed qty",
    "qty",
    "quantity",
    "size",
];
const AVG_PRICE: &[&str] = &["avg price", "average price", "avg. price", "avg fill price"];
const LIMIT_PRICE: &[&str] = &["price", "limit price", "order price"];
const PNL: &[&str] = &["pnl", "realized pnl", "realised pnl", "closed pnl", "profit"];
const FEE: &[&str] = &["fee", "fees", "trading fee", "commission"];
const OPTIONS: &[&str] = &["options", "order options", "order id", "order no"];

const DEFAULT_HINTS: [TimestampFormat; 4] = [
    TimestampFormat::DayMonthNameYear,
    TimestampFormat::MonthDayYear,
    TimestampFormat::Iso8601,
    TimestampFormat::EpochMillis,
];

/// 주문 내역 매퍼.
#[derive(Debug, Clone)]
pub struct OrderHistoryMapper {
    source: Source,
    timestamp_hints: Vec<TimestampFormat>,
}

impl OrderHistoryMapper {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            timestamp_hints: DEFAULT_HINTS.to_vec(),
        }
    }

    pub fn with_timestamp_hints(mut self, hints: impl Into<Vec<TimestampFormat>>) -> Self {
        self.timestamp_hints = hints.into();
        self
    }

    fn map_row(&self, row: &RawRow, report: &mut MapReport) -> Option<CanonicalTradeRecord> {
        let raw_ts = row.get(TIMESTAMP);
        let symbol = row.get(SYMBOL);
        if row.is_blank() || (raw_ts.is_empty() && symbol.is_empty()) {
            report.skipped_shape += 1;
            return None;
        }

        let status = row.get(STATUS);
        if !status.is_empty() && !status.eq_ignore_ascii_case("filled") {
            report.skipped_status += 1;
            return None;
        }

        let raw_pnl = row.get(PNL);
        if is_placeholder(raw_pnl) {
            report.skipped_placeholder += 1;
            return None;
        }

        let parsed_ts = parse_timestamp(raw_ts, &self.timestamp_hints);
        if parsed_ts.is_fallback() {
            report.timestamp_fallbacks += 1;
            tracing::warn!(
                line = row.line(),
                raw = %raw_ts,
                "주문 내역 시각 해석 실패, 현재 시각 사용"
            );
        }

        let side = if row.get(SIDE).to_lowercase().contains("sell") {
            "SELL"
        } else {
            "BUY"
        };

        let avg_price = parse_number(row.get(AVG_PRICE));
        let price = if avg_price.is_zero() {
            parse_number(row.get(LIMIT_PRICE))
        } else {
            avg_price
        };

        let record = CanonicalTradeRecord::new(parsed_ts.value(), self.source, symbol)
            .with_side(side)
            .with_quantity(parse_number(row.get(FILLED_QTY)))
            .with_price(price)
            .with_realized_pnl(parse_number(raw_pnl))
            .with_fees(parse_number(row.get(FEE)));

        if record.is_net_saturated() {
            report.skipped_overflow += 1;
            tracing::warn!(line = row.line(), "주문 내역 금액이 표현 범위를 넘음, 행 건너뜀");
            return None;
        }

        let identity_key = format!(
            "ORD|{}|{}|{}|{}|{}|{}|{}",
            key_timestamp(raw_ts, &parsed_ts),
            record.symbol,
            record.side,
            record.quantity.normalize(),
            record.price.normalize(),
            record.realized_pnl().normalize(),
            record.fees().normalize()
        );

        let notes = match row.get(OPTIONS) {
            "" => format!("{} order history", self.source.description()),
            options => format!("{} order history: {}", self.source.description(), options),
        };

        Some(record.with_identity_key(identity_key).with_notes(notes))
    }
}

impl SourceMapper for OrderHistoryMapper {
    fn source(&self) -> Source {
        self.source
    }

    fn kind(&self) -> &'static str {
        "order_history"
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
                "주문 내역 시각 컬럼 없음, 모든 행에 현재 시각을 사용합니다"
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
            status = report.skipped_status,
            placeholder = report.skipped_placeholder,
            "주문 내역 매핑 완료"
        );

        MappedBatch { records, report }
    }
}
