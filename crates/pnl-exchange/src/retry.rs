//! 일시적 오류 재시도.
//!
//! 네트워크 오류, 시간 초과, HTTP 429/5xx에 대해 지수 백오프로 재시도합니다.
//! 작업 클로저는 시도마다 새로 호출되므로, 서명 요청은 시도마다 새 nonce로
//! 다시 서명됩니다.
//!
//! ```rust,ignore
//! let config = RetryConfig::default().with_max_retries(2);
//! let body = with_retry(&config, || client.send_signed(&path, &query)).await?;
//! ```

use std::{future::Future, time::Duration};

use rand::Rng;
use tracing::{debug, warn};

use crate::ExchangeError;

/// 재시도 설정.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// 최대 재시도 횟수 (초기 시도 제외)
    pub max_retries: u32,
    /// 기본 대기 시간
    pub base_delay: Duration,
    /// 최대 대기 시간
    pub max_delay: Duration,
    /// 시도마다 곱하는 백오프 배수
    pub backoff_multiplier: f64,
    /// ±25% 지터 적용 여부
    pub add_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }
}

impl RetryConfig {
    /// 재시도 없음 (단일 시도).
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// `attempt`번째 재시도 전 대기 시간.
    fn delay_for(&self, attempt: u32, error: &ExchangeError) -> Duration {
        let base = error
            .retry_delay_ms()
            .map(Duration::from_millis)
            .unwrap_or(self.base_delay);

        let scaled = base.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        let delay = Duration::from_secs_f64(scaled).min(self.max_delay);

        if !self.add_jitter || delay.is_zero() {
            return delay;
        }

        let factor = rand::thread_rng().gen_range(0.75..=1.25);
        delay.mul_f64(factor).min(self.max_delay)
    }
}

/// 재시도를 포함해 비동기 작업을 실행합니다.
///
/// 치명적 오류와 재시도 불가 오류는 즉시 반환하고, 재시도 횟수를 모두 쓰면
/// 마지막 오류를 반환합니다.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, operation: F) -> Result<T, ExchangeError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ExchangeError>>,
{
    let mut attempt = 0;

    loop {
        let error = match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(attempts = attempt + 1, "재시도 후 성공");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if error.is_fatal() || !error.is_retryable() {
            debug!(error = %error, fatal = error.is_fatal(), "재시도 불가 오류");
            return Err(error);
        }

        if attempt >= config.max_retries {
            warn!(
                error = %error,
                attempts = attempt + 1,
                "최대 재시도 횟수 초과"
            );
            return Err(error);
        }

        let delay = config.delay_for(attempt, &error);
        warn!(
            error = %error,
            attempt = attempt + 1,
            max_retries = config.max_retries,
            delay_ms = delay.as_millis() as u64,
            "재시도 대기 중"
        );

        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    };

    use super::*;

    fn quick(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            base_delay: Duration::from_millis(5),
            add_jitter: false,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_recovers_after_transient_errors() {
        let counter = Arc::new(AtomicU32::new(0));

        let result = with_retry(&quick(3), || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ExchangeError::http_status(502, "bad gateway"))
                } else {
                    Ok("ok")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rejection_not_retried() {
        let counter = Arc::new(AtomicU32::new(0));

        let result = with_retry(&quick(3), || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ExchangeError::Rejected("apiLimitExceeded".into()))
            }
        })
        .await;

        assert!(matches!(result, Err(ExchangeError::Rejected(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let counter = Arc::new(AtomicU32::new(0));

        let result = with_retry(&quick(2), || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ExchangeError::Timeout("30s".into()))
            }
        })
        .await;

        assert!(matches!(result, Err(ExchangeError::Timeout(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_retry_runs_once() {
        let counter = Arc::new(AtomicU32::new(0));

        let result = with_retry(&RetryConfig::no_retry(), || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ExchangeError::http_status(503, "unavailable"))
            }
        })
        .await;

        assert!(matches!(result, Err(ExchangeError::HttpStatus { status: 503, .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delay_backoff_capped() {
        let config = RetryConfig {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(3),
            add_jitter: false,
            ..Default::default()
        };
        let err = ExchangeError::NetworkError("reset".into());

        assert_eq!(config.delay_for(0, &err), Duration::from_secs(1));
        assert_eq!(config.delay_for(1, &err), Duration::from_secs(2));
        assert_eq!(config.delay_for(5, &err), Duration::from_secs(3));
    }

    #[test]
    fn test_delay_uses_error_hint() {
        let config = RetryConfig {
            add_jitter: false,
            ..Default::default()
        };
        let err = ExchangeError::http_status(429, "");
        assert_eq!(config.delay_for(0, &err), Duration::from_secs(2));
    }
}
