//! 거래소 커넥터 에러 타입.

use thiserror::Error;

/// 응답 본문을 에러 메시지에 포함할 때의 최대 길이.
const MAX_BODY_IN_ERROR: usize = 512;

/// 거래소 API 에러.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// API 키 또는 secret이 비어있음
    #[error("자격 증명 누락: {0}")]
    MissingCredentials(String),

    /// API secret을 base64로 디코딩할 수 없음
    #[error("API secret 디코딩 실패: {0}")]
    InvalidSecret(String),

    #[error("네트워크 오류: {0}")]
    NetworkError(String),

    #[error("요청 시간 초과: {0}")]
    Timeout(String),

    /// 2xx가 아닌 HTTP 응답
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// 응답의 `result`가 `"success"`가 아님
    #[error("API 요청 거부: {0}")]
    Rejected(String),

    #[error("응답 파싱 실패: {0}")]
    ParseError(String),

    /// 성공 응답에 기대한 페이로드 키가 없음
    #[error("응답에 '{0}' 항목 없음")]
    MissingPayload(String),
}

pub type Result<T> = std::result::Result<T, ExchangeError>;

impl ExchangeError {
    /// HTTP 상태 에러 생성 (본문은 잘라서 보관).
    pub fn http_status(status: u16, body: &str) -> Self {
        let body = match body.char_indices().nth(MAX_BODY_IN_ERROR) {
            Some((idx, _)) => format!("{}...", &body[..idx]),
            None => body.to_string(),
        };
        ExchangeError::HttpStatus { status, body }
    }

    /// 재시도로 해결될 수 있는 일시적 오류인지 확인.
    ///
    /// nonce 관련 거부는 새 nonce로 다시 서명하면 통과할 수 있으므로 포함합니다.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExchangeError::NetworkError(_) | ExchangeError::Timeout(_) => true,
            ExchangeError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            ExchangeError::Rejected(reason) => reason.to_lowercase().contains("nonce"),
            _ => false,
        }
    }

    /// 재시도해도 해결되지 않는 치명적 오류인지 확인.
    pub fn is_fatal(&self) -> bool {
        match self {
            ExchangeError::MissingCredentials(_) | ExchangeError::InvalidSecret(_) => true,
            ExchangeError::HttpStatus { status, .. } => *status == 401 || *status == 403,
            ExchangeError::Rejected(reason) => reason.to_lowercase().contains("authentication"),
            _ => false,
        }
    }

    /// 에러가 권장하는 재시도 대기 시간 (밀리초).
    pub fn retry_delay_ms(&self) -> Option<u64> {
        match self {
            ExchangeError::HttpStatus { status: 429, .. } => Some(2_000),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExchangeError::Timeout(err.to_string())
        } else {
            ExchangeError::NetworkError(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(ExchangeError::NetworkError("reset".into()).is_retryable());
        assert!(ExchangeError::Timeout("30s".into()).is_retryable());
        assert!(ExchangeError::http_status(503, "unavailable").is_retryable());
        assert!(ExchangeError::http_status(429, "slow down").is_retryable());
        assert!(!ExchangeError::http_status(404, "not found").is_retryable());
        assert!(ExchangeError::Rejected("nonceBelowThreshold".into()).is_retryable());

        assert!(ExchangeError::http_status(401, "").is_fatal());
        assert!(ExchangeError::Rejected("authenticationError".into()).is_fatal());
        assert!(ExchangeError::InvalidSecret("bad".into()).is_fatal());
        assert!(!ExchangeError::NetworkError("reset".into()).is_fatal());
    }

    #[test]
    fn test_retry_delay_hint() {
        assert_eq!(ExchangeError::http_status(429, "").retry_delay_ms(), Some(2_000));
        assert_eq!(ExchangeError::http_status(500, "").retry_delay_ms(), None);
    }

    #[test]
    fn test_long_body_truncated() {
        let body = "x".repeat(2_000);
        match ExchangeError::http_status(500, &body) {
            ExchangeError::HttpStatus { body, .. } => {
                assert_eq!(body.len(), MAX_BODY_IN_ERROR + 3);
                assert!(body.ends_with("..."));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
