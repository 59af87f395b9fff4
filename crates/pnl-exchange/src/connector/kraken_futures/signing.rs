//! 요청 서명.
//!
//! `Authent = base64(scheme(secret, postdata + nonce + endpointPath))`
//!
//! 기본 scheme은 SHA-256 digest를 SHA-512 HMAC으로 서명하는
//! `sha256-hmac-sha512`입니다. 이전 방식(`hmac-sha256`)도 이름으로 선택할 수
//! 있습니다.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretSlice};
use sha2::{Digest, Sha256, Sha512};

use crate::{ExchangeError, Result};

/// 기본 서명 방식 이름.
pub const DEFAULT_SCHEME: &str = "sha256-hmac-sha512";

/// 쿼리 파라미터 (키 순서 고정).
pub type QueryParams = BTreeMap<String, String>;

// ============================================================================
// secret / 서명 방식
// ============================================================================

/// base64 secret을 관대하게 디코딩합니다.
///
/// 공백/개행을 제거하고 길이가 4의 배수가 되도록 `=`을 채운 뒤 디코딩합니다.
pub fn decode_secret(secret_b64: &str) -> Result<Vec<u8>> {
    let mut compact: String = secret_b64.chars().filter(|c| !c.is_whitespace()).collect();
    let missing = (4 - compact.len() % 4) % 4;
    compact.extend(std::iter::repeat('=').take(missing));

    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| ExchangeError::InvalidSecret(e.to_string()))
}

/// 서명 방식.
pub trait SignatureScheme: Send + Sync + fmt::Debug {
    /// 설정에서 쓰는 이름.
    fn name(&self) -> &'static str;

    /// 메시지 서명 (base64 인코딩 전 바이트).
    fn sign(&self, key: &[u8], message: &[u8]) -> Result<Vec<u8>>;
}

/// SHA-256(message)를 HMAC-SHA512로 서명.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256HmacSha512;

impl SignatureScheme for Sha256HmacSha512 {
    fn name(&self) -> &'static str {
        DEFAULT_SCHEME
    }

    fn sign(&self, key: &[u8], message: &[u8]) -> Result<Vec<u8>> {
        let digest = Sha256::digest(message);
        let mut mac = Hmac::<Sha512>::new_from_slice(key)
            .map_err(|e| ExchangeError::InvalidSecret(e.to_string()))?;
        mac.update(&digest);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

/// 메시지 원문을 HMAC-SHA256으로 서명 (이전 방식).
#[derive(Debug, Clone, Copy, Default)]
pub struct HmacSha256;

impl SignatureScheme for HmacSha256 {
    fn name(&self) -> &'static str {
        "hmac-sha256"
    }

    fn sign(&self, key: &[u8], message: &[u8]) -> Result<Vec<u8>> {
        let mut mac = Hmac::<Sha256>::new_from_slice(key)
            .map_err(|e| ExchangeError::InvalidSecret(e.to_string()))?;
        mac.update(message);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

/// 이름으로 서명 방식 조회 (대소문자 무시).
pub fn scheme_by_name(name: &str) -> Option<Arc<dyn SignatureScheme>> {
    match name.trim().to_ascii_lowercase().as_str() {
        "sha256-hmac-sha512" => Some(Arc::new(Sha256HmacSha512)),
        "hmac-sha256" => Some(Arc::new(HmacSha256)),
        _ => None,
    }
}

/// 기본 서명 방식으로 `Authent` 값을 계산합니다.
///
/// 같은 입력에는 항상 같은 서명을 반환합니다.
pub fn sign(secret_b64: &str, endpoint_path: &str, nonce: &str, postdata: &str) -> Result<String> {
    RequestSigner::new(secret_b64, Arc::new(Sha256HmacSha512))?.sign(endpoint_path, nonce, postdata)
}

// ============================================================================
// canonical query
// ============================================================================

/// 키 정렬 + URL 인코딩된 쿼리 문자열 (공백은 `%20`).
///
/// 요청 URL에 붙는 문자열과 GET 요청의 서명 postdata가 같은 값입니다.
pub fn canonical_query(params: &QueryParams) -> Result<String> {
    if params.is_empty() {
        return Ok(String::new());
    }
    let encoded = serde_urlencoded::to_string(params)
        .map_err(|e| ExchangeError::ParseError(format!("쿼리 인코딩 실패: {e}")))?;
    // 값 안의 '+'는 %2B로 인코딩되므로 남은 '+'는 모두 공백
    Ok(encoded.replace('+', "%20"))
}

// ============================================================================
// nonce
// ============================================================================

type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

fn system_millis() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default()
}

/// 밀리초 nonce 발급기.
///
/// 같은 발급기에서 나온 nonce는 엄격히 증가합니다. 같은 밀리초에 여러 요청이
/// 나가면 직전 값 + 1을 씁니다.
pub struct NonceSource {
    last: AtomicU64,
    clock: Clock,
}

impl NonceSource {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(system_millis))
    }

    /// 시계를 주입합니다 (테스트용 고정 시각 등).
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            last: AtomicU64::new(0),
            clock,
        }
    }

    pub fn next(&self) -> u64 {
        let now = (self.clock)();
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last.saturating_add(1)))
            })
            .unwrap_or(now);
        now.max(previous.saturating_add(1))
    }
}

impl Default for NonceSource {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NonceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NonceSource")
            .field("last", &self.last.load(Ordering::SeqCst))
            .finish()
    }
}

// ============================================================================
// 서명기
// ============================================================================

/// 서명이 끝난 요청 정보.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    /// 서명 대상 path (`/api/v3/...`)
    pub endpoint_path: String,
    /// canonical query (GET의 postdata)
    pub query: String,
    pub nonce: String,
    pub authent: String,
}

/// 디코딩된 secret과 서명 방식을 묶은 서명기.
#[derive(Clone)]
pub struct RequestSigner {
    key: Arc<SecretSlice<u8>>,
    scheme: Arc<dyn SignatureScheme>,
}

impl RequestSigner {
    pub fn new(secret_b64: &str, scheme: Arc<dyn SignatureScheme>) -> Result<Self> {
        let key = SecretSlice::from(decode_secret(secret_b64)?);
        Ok(Self {
            key: Arc::new(key),
            scheme,
        })
    }

    pub fn scheme(&self) -> &dyn SignatureScheme {
        self.scheme.as_ref()
    }

    /// `postdata + nonce + endpoint_path`를 서명하고 base64로 인코딩합니다.
    pub fn sign(&self, endpoint_path: &str, nonce: &str, postdata: &str) -> Result<String> {
        let message = format!("{postdata}{nonce}{endpoint_path}");
        let raw = self
            .scheme
            .sign(self.key.expose_secret(), message.as_bytes())?;
        Ok(STANDARD.encode(raw))
    }

    /// GET 요청 서명. canonical query가 곧 postdata입니다.
    pub fn sign_get(&self, endpoint_path: &str, query: &str, nonce: u64) -> Result<SignedRequest> {
        let nonce = nonce.to_string();
        let authent = self.sign(endpoint_path, &nonce, query)?;
        Ok(SignedRequest {
            endpoint_path: endpoint_path.to_string(),
            query: query.to_string(),
            nonce,
            authent,
        })
    }
}

impl fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSigner")
            .field("key", &"***")
            .field("scheme", &self.scheme.name())
            .finish()
    }
}
