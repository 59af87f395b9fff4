//! 거래소 데이터 제공자.

pub mod snapshot;
