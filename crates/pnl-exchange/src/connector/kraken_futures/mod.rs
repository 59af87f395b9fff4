//! Kraken Futures 커넥터.
//!
//! 요청 하나의 처리 순서:
//!
//! ```text
//! endpoint path ─▶ canonical query ─▶ nonce ─▶ Authent 서명 ─▶ GET
//! /api/v3/...      키 정렬, %20       ms, 증가  scheme 선택     /derivatives 접두사
//! ```
//!
//! 서명 대상 path에는 `/derivatives` 접두사가 붙지 않습니다.
//! 접두사는 요청 URL에만 붙습니다.

mod client;
mod signing;

pub use client::{
    KrakenFuturesClient, KrakenFuturesConfig, API_PREFIX, API_VERSION, DEFAULT_BASE_URL,
};
pub use signing::{
    canonical_query, decode_secret, scheme_by_name, sign, HmacSha256, NonceSource, QueryParams,
    RequestSigner, Sha256HmacSha512, SignatureScheme, SignedRequest, DEFAULT_SCHEME,
};
