//! 값 정규화 (Value Normalizer).
//!
//! 원천마다 제각각인 숫자/시각 텍스트를 `Decimal`과 UTC 시각으로 바꿉니다.
//! 어떤 입력에도 실패하지 않으며, 해석할 수 없는 값은 문서화된 기본값
//! (숫자는 0, 시각은 현재 시각)으로 대체합니다.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;

/// "값 없음"을 뜻하는 자리표시자.
const PLACEHOLDERS: [&str; 4] = ["--", "\u{2014}", "\u{2013}", "-"];

// =============================================================================
// 숫자
// =============================================================================

/// 빈 값 또는 대시 자리표시자인지 확인.
pub fn is_placeholder(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty() || PLACEHOLDERS.contains(&trimmed)
}

/// 숫자 텍스트를 `Decimal`로 변환합니다.
///
/// - 빈 문자열, `--`, em-dash는 0
/// - `,`와 `.`가 함께 있으면 `,`는 천 단위 구분자로 보고 제거
/// - `,`만 있으면 소수점으로 취급
/// - 뒤에 붙은 통화 접미사(`12.5 USD`)는 숫자 구간 이후를 잘라냄
///
/// 해석할 수 없으면 0을 반환합니다.
///
/// # 예시
///
/// ```
/// use pnl_core::normalize::parse_number;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(parse_number("1,234.50"), dec!(1234.50));
/// assert_eq!(parse_number("0,25"), dec!(0.25));
/// assert_eq!(parse_number("-3.1 USD"), dec!(-3.1));
/// assert_eq!(parse_number("--"), dec!(0));
/// ```
pub fn parse_number(text: &str) -> Decimal {
    if is_placeholder(text) {
        return Decimal::ZERO;
    }

    let trimmed = text.trim();
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let cleaned = match (unsigned.contains(','), unsigned.contains('.')) {
        (true, true) => unsigned.replace(',', ""),
        (true, false) => unsigned.replace(',', "."),
        _ => unsigned.to_string(),
    };

    if let Ok(value) = Decimal::from_str(&cleaned) {
        return value;
    }
    if cleaned.contains(['e', 'E']) {
        if let Ok(value) = Decimal::from_scientific(&cleaned) {
            return value;
        }
    }

    // 통화 접미사 제거: 숫자/점/마이너스 구간까지만 사용
    let end = cleaned
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.' || *c == '-'))
        .map(|(idx, _)| idx)
        .unwrap_or(cleaned.len());

    Decimal::from_str(&cleaned[..end]).unwrap_or(Decimal::ZERO)
}

// =============================================================================
// 시각
// =============================================================================

/// 원천별 시각 형식 후보.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampFormat {
    /// ISO-8601 (`2024-03-05T14:22:01Z`, 존이 없으면 UTC로 간주)
    Iso8601,
    /// `05/Mar/2024 14:22:01`
    DayMonthNameYear,
    /// `03/05/2024 14:22:01`
    MonthDayYear,
    /// `05/03/2024 14:22:01`, `05.03.2024 14:22:01`
    DayMonthYear,
    /// 유닉스 epoch (13자리 이상이면 밀리초, 아니면 초)
    EpochMillis,
    /// 임의의 chrono 형식 문자열 (존 없음, UTC로 간주)
    Custom(&'static str),
}

impl TimestampFormat {
    fn parse(&self, text: &str) -> Option<DateTime<Utc>> {
        match self {
            TimestampFormat::Iso8601 => parse_iso8601(text),
            TimestampFormat::DayMonthNameYear => parse_naive_any(
                text,
                &[
                    "%d/%b/%Y %H:%M:%S%.f",
                    "%d/%b/%Y %H:%M",
                    "%d-%b-%Y %H:%M:%S%.f",
                    "%d %b %Y %H:%M:%S%.f",
                ],
            ),
            TimestampFormat::MonthDayYear => parse_naive_any(
                text,
                &[
                    "%m/%d/%Y %H:%M:%S%.f",
                    "%m/%d/%Y %H:%M",
                    "%m/%d/%Y %I:%M:%S %p",
                    "%m/%d/%Y, %H:%M:%S",
                ],
            ),
            TimestampFormat::DayMonthYear => parse_naive_any(
                text,
                &[
                    "%d/%m/%Y %H:%M:%S%.f",
                    "%d/%m/%Y %H:%M",
                    "%d.%m.%Y %H:%M:%S%.f",
                    "%d-%m-%Y %H:%M:%S%.f",
                ],
            ),
            TimestampFormat::EpochMillis => parse_epoch(text),
            TimestampFormat::Custom(format) => parse_naive_any(text, &[*format]),
        }
    }
}

/// 시각 해석 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedTimestamp {
    /// 후보 형식 중 하나로 해석됨
    Parsed(DateTime<Utc>),
    /// 모든 형식이 실패하여 현재 시각으로 대체됨 (데이터 품질 경고)
    Fallback(DateTime<Utc>),
}

impl ParsedTimestamp {
    pub fn value(&self) -> DateTime<Utc> {
        match self {
            ParsedTimestamp::Parsed(ts) | ParsedTimestamp::Fallback(ts) => *ts,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ParsedTimestamp::Fallback(_))
    }
}

/// 후보 형식을 순서대로 시도하고 첫 성공을 반환합니다.
pub fn try_parse_timestamp(text: &str, hints: &[TimestampFormat]) -> Option<DateTime<Utc>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    hints.iter().find_map(|hint| hint.parse(trimmed))
}

/// 시각 텍스트를 UTC 시각으로 변환합니다.
///
/// 모든 후보가 실패하면 현재 시각으로 대체하고 `Fallback`을 반환합니다.
/// 호출자는 대체 횟수를 집계해야 합니다.
pub fn parse_timestamp(text: &str, hints: &[TimestampFormat]) -> ParsedTimestamp {
    match try_parse_timestamp(text, hints) {
        Some(ts) => ParsedTimestamp::Parsed(ts),
        None => {
            tracing::debug!(raw = %text, "시각 해석 실패, 현재 시각으로 대체");
            ParsedTimestamp::Fallback(Utc::now())
        }
    }
}

fn parse_iso8601(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    // `2024-03-05 14:22:01+00:00` 처럼 공백 구분 + 존 포함
    for format in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z", "%Y-%m-%dT%H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(text, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    // 존 표기가 없으면 UTC
    let naive = text
        .strip_suffix(" UTC")
        .or_else(|| text.strip_suffix('Z'))
        .unwrap_or(text);
    if let Some(ts) = parse_naive_any(
        naive,
        &[
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%dT%H:%M",
            "%Y-%m-%d %H:%M",
        ],
    ) {
        return Some(ts);
    }

    NaiveDate::parse_from_str(naive, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn parse_naive_any(text: &str, formats: &[&str]) -> Option<DateTime<Utc>> {
    formats
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc())
}

fn parse_epoch(text: &str) -> Option<DateTime<Utc>> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: i64 = text.parse().ok()?;
    if text.len() >= 13 {
        DateTime::from_timestamp_millis(value)
    } else {
        DateTime::from_timestamp(value, 0)
    }
}

// =============================================================================
// 테스트
// =============================================================================
