//! 거래소 커넥터.
//!
//! 서명된 REST API로 거래소 보유 상태(체결, 미결제 포지션, 계좌 잔고)를
//! 조회합니다. 조회 결과는 원장에 병합되지 않고 라이브 스냅샷으로만
//! 첨부됩니다.
//!
//! # 구성
//!
//! - [`connector::kraken_futures`]: 요청 서명, nonce, 서명된 GET 클라이언트
//! - [`provider::snapshot`]: 엔드포인트 동시 조회 + 실패를 경고로 변환
//! - [`retry`]: 일시적 오류 재시도

pub mod connector;
pub mod error;
pub mod provider;
pub mod retry;

pub use connector::kraken_futures::{
    canonical_query, decode_secret, scheme_by_name, sign, HmacSha256, KrakenFuturesClient,
    KrakenFuturesConfig, NonceSource, QueryParams, RequestSigner, Sha256HmacSha512,
    SignatureScheme, SignedRequest,
};
pub use error::{ExchangeError, Result};
pub use provider::snapshot::{fetch_live_snapshot, SnapshotRequest};
pub use retry::{with_retry, RetryConfig};
