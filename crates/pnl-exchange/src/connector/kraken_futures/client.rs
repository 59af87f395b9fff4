//! Kraken Futures 서명 REST 클라이언트.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::ACCEPT;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use super::signing::{
    canonical_query, NonceSource, QueryParams, RequestSigner, Sha256HmacSha512, SignatureScheme,
    SignedRequest,
};
use crate::retry::{with_retry, RetryConfig};
use crate::{ExchangeError, Result};

pub const DEFAULT_BASE_URL: &str = "https://futures.kraken.com";
/// 요청 URL에만 붙는 API 계열 접두사 (서명 대상 아님).
pub const API_PREFIX: &str = "/derivatives";
pub const API_VERSION: &str = "/api/v3";

const USER_AGENT: &str = concat!("pnl-sync/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_RETRIES: u32 = 2;

// ============================================================================
// 설정
// ============================================================================

/// 클라이언트 설정.
#[derive(Clone)]
pub struct KrakenFuturesConfig {
    pub api_key: String,
    /// base64 인코딩된 API secret
    pub api_secret: SecretString,
    pub base_url: String,
    /// 요청 하나당 제한 시간
    pub timeout: Duration,
    /// 전송 오류 재시도 횟수
    pub max_retries: u32,
    pub signing_scheme: Arc<dyn SignatureScheme>,
}

impl fmt::Debug for KrakenFuturesConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KrakenFuturesConfig")
            .field("api_key", &"***")
            .field("api_secret", &"***")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("signing_scheme", &self.signing_scheme.name())
            .finish()
    }
}

impl KrakenFuturesConfig {
    pub fn new(api_key: impl Into<String>, api_secret: SecretString) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            signing_scheme: Arc::new(Sha256HmacSha512),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_signing_scheme(mut self, scheme: Arc<dyn SignatureScheme>) -> Self {
        self.signing_scheme = scheme;
        self
    }
}

// ============================================================================
// 클라이언트
// ============================================================================

/// Kraken Futures 클라이언트.
///
/// 같은 자격 증명으로 나가는 요청은 하나의 [`NonceSource`]를 공유하므로
/// 동시에 요청해도 nonce가 겹치지 않습니다.
pub struct KrakenFuturesClient {
    http: Client,
    config: KrakenFuturesConfig,
    signer: RequestSigner,
    nonces: NonceSource,
    retry: RetryConfig,
}

impl KrakenFuturesClient {
    /// 클라이언트 생성.
    ///
    /// # Errors
    /// - 키/secret이 비어있으면 `MissingCredentials`
    /// - secret을 디코딩할 수 없으면 `InvalidSecret`
    pub fn new(config: KrakenFuturesConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(ExchangeError::MissingCredentials("API 키가 비어있음".into()));
        }
        if config.api_secret.expose_secret().trim().is_empty() {
            return Err(ExchangeError::MissingCredentials("API secret이 비어있음".into()));
        }

        let signer = RequestSigner::new(
            config.api_secret.expose_secret(),
            Arc::clone(&config.signing_scheme),
        )?;
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ExchangeError::NetworkError(format!("HTTP 클라이언트 생성 실패: {e}")))?;
        let retry = RetryConfig::default().with_max_retries(config.max_retries);

        Ok(Self {
            http,
            config,
            signer,
            nonces: NonceSource::new(),
            retry,
        })
    }

    /// nonce 발급기 교체 (고정 시계 테스트 등).
    pub fn with_nonce_source(mut self, nonces: NonceSource) -> Self {
        self.nonces = nonces;
        self
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &KrakenFuturesConfig {
        &self.config
    }

    /// 요청 URL: `<base><API_PREFIX><endpoint_path>[?query]`.
    fn request_url(&self, signed: &SignedRequest) -> String {
        let mut url = format!(
            "{}{}{}",
            self.config.base_url.trim_end_matches('/'),
            API_PREFIX,
            signed.endpoint_path
        );
        if !signed.query.is_empty() {
            url.push('?');
            url.push_str(&signed.query);
        }
        url
    }

    /// 서명된 GET 요청.
    ///
    /// `endpoint_path`는 `/api/v3/...` 형태입니다. 전송 오류는 재시도하며
    /// 시도마다 새 nonce로 다시 서명합니다. `result`가 `"success"`인 본문만
    /// 성공으로 취급합니다.
    pub async fn signed_get(&self, endpoint_path: &str, params: &QueryParams) -> Result<Value> {
        let query = canonical_query(params)?;
        with_retry(&self.retry, || self.send_signed(endpoint_path, &query)).await
    }

    async fn send_signed(&self, endpoint_path: &str, query: &str) -> Result<Value> {
        let signed = self
            .signer
            .sign_get(endpoint_path, query, self.nonces.next())?;
        let url = self.request_url(&signed);

        debug!(
            endpoint = endpoint_path,
            nonce = %signed.nonce,
            scheme = self.signer.scheme().name(),
            "서명 요청 전송"
        );

        let response = self
            .http
            .get(&url)
            .header("APIKey", &self.config.api_key)
            .header("Nonce", &signed.nonce)
            .header("Authent", &signed.authent)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ExchangeError::http_status(status.as_u16(), &text));
        }

        let body: Value = serde_json::from_str(&text).map_err(|e| {
            ExchangeError::ParseError(format!("{endpoint_path} 응답이 JSON이 아님: {e}"))
        })?;

        let result = body.get("result").and_then(Value::as_str);
        if result == Some("success") {
            return Ok(body);
        }

        let reason = body
            .get("error")
            .and_then(Value::as_str)
            .or(result)
            .unwrap_or("result 필드 없음")
            .to_string();
        Err(ExchangeError::Rejected(reason))
    }

    /// 성공 본문에서 페이로드 키를 꺼내 역직렬화합니다.
    fn take_payload<T: DeserializeOwned>(mut body: Value, key: &str) -> Result<T> {
        let payload = body
            .get_mut(key)
            .map(Value::take)
            .ok_or_else(|| ExchangeError::MissingPayload(key.to_string()))?;
        serde_json::from_value(payload)
            .map_err(|e| ExchangeError::ParseError(format!("'{key}' 형식 오류: {e}")))
    }

    /// 최근 체결 (`/api/v3/fills`).
    pub async fn fetch_fills(&self, last_fill_time: Option<DateTime<Utc>>) -> Result<Vec<Value>> {
        let mut params = QueryParams::new();
        if let Some(ts) = last_fill_time {
            params.insert(
                "lastFillTime".to_string(),
                ts.to_rfc3339_opts(SecondsFormat::Millis, true),
            );
        }
        let body = self.signed_get(&format!("{API_VERSION}/fills"), &params).await?;
        Self::take_payload(body, "fills")
    }

    /// 미결제 포지션 (`/api/v3/openpositions`).
    pub async fn fetch_open_positions(&self) -> Result<Vec<Value>> {
        let body = self
            .signed_get(&format!("{API_VERSION}/openpositions"), &QueryParams::new())
            .await?;
        Self::take_payload(body, "openPositions")
    }

    /// 계좌별 잔고 (`/api/v3/accounts`).
    pub async fn fetch_accounts(&self) -> Result<Map<String, Value>> {
        let body = self
            .signed_get(&format!("{API_VERSION}/accounts"), &QueryParams::new())
            .await?;
        Self::take_payload(body, "accounts")
    }
}

impl fmt::Debug for KrakenFuturesClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KrakenFuturesClient")
            .field("config", &self.config)
            .finish()
    }
}
