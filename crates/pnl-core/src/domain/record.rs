//! 정규화된 손익 원장 레코드.
//!
//! 거래소 계좌 로그, 주문 내역 등 서로 다른 형식의 원천 데이터를
//! 하나의 통일된 형식([`CanonicalTradeRecord`])으로 표현합니다.
//! 각 Source Mapper는 원천 행을 이 타입으로 변환합니다.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// =============================================================================
// 원천 / 시장 구분
// =============================================================================

/// 레코드를 만든 원천 거래소.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Source {
    /// Kraken Futures
    KrakenFutures,
    /// Binance USDⓈ-M Futures
    BinanceFutures,
    /// Bybit Derivatives
    BybitFutures,
}

impl Source {
    /// 모든 원천 목록.
    pub const ALL: [Source; 3] = [
        Source::KrakenFutures,
        Source::BinanceFutures,
        Source::BybitFutures,
    ];

    /// identity key 접두어로 쓰는 짧은 코드.
    pub fn code(&self) -> &'static str {
        match self {
            Source::KrakenFutures => "KRAKENF",
            Source::BinanceFutures => "BINANCEF",
            Source::BybitFutures => "BYBITF",
        }
    }

    /// 사람이 읽는 원천 설명 (notes 필드용).
    pub fn description(&self) -> &'static str {
        match self {
            Source::KrakenFutures => "Kraken Futures",
            Source::BinanceFutures => "Binance Futures",
            Source::BybitFutures => "Bybit Futures",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Source {
    type Err = CoreError;

    /// 코드(`KRAKENF`) 또는 serde 이름(`KRAKEN_FUTURES`)을 대소문자 구분 없이 인식합니다.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        Source::ALL
            .into_iter()
            .find(|source| {
                source.code() == wanted
                    || serde_json::to_value(source)
                        .ok()
                        .and_then(|v| v.as_str().map(|name| name == wanted))
                        .unwrap_or(false)
            })
            .ok_or_else(|| CoreError::UnknownSource(s.to_string()))
    }
}

/// 시장 구분.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketType {
    /// 선물 (무기한/만기)
    Futures,
}

// =============================================================================
// 원장 레코드
// =============================================================================

/// 원장의 단위 레코드 (실현 손익 이벤트 1건).
///
/// 금액 필드(`realized_pnl`, `fees`, `funding`)는 값이 없으면 0이며
/// `net_pnl`은 항상 세 값에서 다시 계산됩니다.
///
/// ```text
/// net_pnl = realized_pnl - |fees| + funding
/// ```
///
/// 금액 필드는 setter를 거쳐야만 바뀌므로 `net_pnl`이 원천 값을 그대로
/// 복사하는 일은 없습니다.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalTradeRecord {
    /// 체결/정산 시각 (UTC)
    pub timestamp: DateTime<Utc>,
    /// 원천 거래소
    pub source: Source,
    /// 정규화된 종목 코드 (대문자)
    pub symbol: String,
    /// 시장 구분
    pub market_type: MarketType,
    /// BUY/SELL 또는 방향이 없는 이벤트의 거래 유형 라벨
    pub side: String,
    /// 수량 (원천이 제공하지 않으면 0)
    pub quantity: Decimal,
    /// 가격 (해당 없으면 0)
    pub price: Decimal,
    realized_pnl: Decimal,
    fees: Decimal,
    funding: Decimal,
    net_pnl: Decimal,
    identity_key: String,
    /// 출처 설명
    pub notes: String,
    #[serde(skip)]
    net_saturated: bool,
}

impl CanonicalTradeRecord {
    /// 금액이 모두 0인 새 레코드 생성.
    pub fn new(timestamp: DateTime<Utc>, source: Source, symbol: impl AsRef<str>) -> Self {
        Self {
            timestamp,
            source,
            symbol: symbol.as_ref().trim().to_uppercase(),
            market_type: MarketType::Futures,
            side: String::new(),
            quantity: Decimal::ZERO,
            price: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            fees: Decimal::ZERO,
            funding: Decimal::ZERO,
            net_pnl: Decimal::ZERO,
            identity_key: String::new(),
            notes: String::new(),
            net_saturated: false,
        }
    }

    pub fn with_side(mut self, side: impl Into<String>) -> Self {
        self.side = side.into();
        self
    }

    pub fn with_quantity(mut self, quantity: Decimal) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_price(mut self, price: Decimal) -> Self {
        self.price = price;
        self
    }

    /// 실현 손익 설정.
    pub fn with_realized_pnl(mut self, realized_pnl: Decimal) -> Self {
        self.realized_pnl = realized_pnl;
        self.recompute_net();
        self
    }

    /// 수수료 설정. 원천의 부호 규칙과 무관하게 절대값으로 저장합니다.
    pub fn with_fees(mut self, fees: Decimal) -> Self {
        self.fees = fees.abs();
        self.recompute_net();
        self
    }

    /// 펀딩 손익 설정 (받으면 +, 내면 -).
    pub fn with_funding(mut self, funding: Decimal) -> Self {
        self.funding = funding;
        self.recompute_net();
        self
    }

    pub fn with_identity_key(mut self, key: impl Into<String>) -> Self {
        self.identity_key = key.into();
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.realized_pnl
    }

    pub fn fees(&self) -> Decimal {
        self.fees
    }

    pub fn funding(&self) -> Decimal {
        self.funding
    }

    pub fn net_pnl(&self) -> Decimal {
        self.net_pnl
    }

    /// 순손익이 `Decimal` 표현 범위를 넘어 경계값으로 잘렸는지.
    ///
    /// Source Mapper는 이런 행을 해석 불가로 보고 건너뜁니다.
    pub fn is_net_saturated(&self) -> bool {
        self.net_saturated
    }

    /// 중복 제거 키. 아직 정해지지 않았으면 빈 문자열.
    pub fn identity_key(&self) -> &str {
        &self.identity_key
    }

    /// 원천 식별자가 없을 때 Merge Engine이 쓰는 대체 키.
    ///
    /// 시각 + 원천 + 종목 + 순손익 조합입니다.
    pub fn fallback_identity_key(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.timestamp.to_rfc3339(),
            self.source.code(),
            self.symbol,
            self.net_pnl.normalize()
        )
    }

    /// Merge Engine 전용: 원장에 넣기 직전에만 키를 바꿉니다.
    pub(crate) fn replace_identity_key(&mut self, key: String) {
        self.identity_key = key;
    }

    fn recompute_net(&mut self) {
        let net = self
            .realized_pnl
            .checked_sub(self.fees)
            .and_then(|partial| partial.checked_add(self.funding));

        let saturated = match self.realized_pnl.checked_sub(self.fees) {
            // fees >= 0 이므로 뺄셈은 음의 방향으로만 넘칩니다
            None => Decimal::MIN,
            Some(_) if self.funding.is_sign_positive() => Decimal::MAX,
            Some(_) => Decimal::MIN,
        };

        self.net_saturated = net.is_none();
        self.net_pnl = net.unwrap_or(saturated);
    }
}

// =============================================================================
// 테스트
// =============================================================================
