//! 환경변수 기반 설정 모듈.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use pnl_core::Source;
use pnl_exchange::connector::kraken_futures::{DEFAULT_BASE_URL, DEFAULT_SCHEME};
use pnl_exchange::{scheme_by_name, KrakenFuturesConfig, SignatureScheme};
use secrecy::{ExposeSecret, SecretString};

use crate::error::SyncError;
use crate::Result;

const DEFAULT_ACCOUNT_LOG: &str = "account_log.csv";
const DEFAULT_OUTPUT_PATH: &str = "site/data/pnl.json";

/// 라이브 스냅샷 조회 모드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SnapshotMode {
    /// 자격 증명이 있을 때만 조회
    #[default]
    Auto,
    /// 반드시 조회 (자격 증명이 없으면 실행 실패)
    Required,
    /// 조회하지 않음
    Off,
}

impl FromStr for SnapshotMode {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(SnapshotMode::Auto),
            "required" | "require" => Ok(SnapshotMode::Required),
            "off" | "false" | "0" => Ok(SnapshotMode::Off),
            other => Err(SyncError::Config(format!(
                "LIVE_SNAPSHOT 값이 올바르지 않습니다: {other} (auto, required, off)"
            ))),
        }
    }
}

/// 거래소 API 자격 증명
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: SecretString,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"***")
            .field("api_secret", &"***")
            .finish()
    }
}

/// 입력 파일 설정
#[derive(Debug, Clone)]
pub struct InputConfig {
    /// 계좌 로그 CSV 경로
    pub account_logs: Vec<PathBuf>,
    /// 주문 내역 CSV 경로
    pub order_histories: Vec<PathBuf>,
    /// 주문 내역 파일의 원천 거래소
    pub order_history_source: Source,
}

/// 거래소 API 설정
#[derive(Clone)]
pub struct ExchangeConfig {
    pub base_url: String,
    pub signing_scheme: Arc<dyn SignatureScheme>,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl fmt::Debug for ExchangeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeConfig")
            .field("base_url", &self.base_url)
            .field("signing_scheme", &self.signing_scheme.name())
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

/// 스냅샷 설정
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    pub mode: SnapshotMode,
    /// `/fills`도 조회할지 여부
    pub include_fills: bool,
}

/// 동기화 전체 설정
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// 키와 secret이 모두 있을 때만 Some
    pub credentials: Option<Credentials>,
    pub inputs: InputConfig,
    pub output_path: PathBuf,
    pub exchange: ExchangeConfig,
    pub snapshot: SnapshotConfig,
}

impl SyncConfig {
    /// 환경변수에서 설정 로드 (`.env` 포함)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 조회 함수로 설정 로드.
    ///
    /// 프로세스 환경 대신 임의의 키-값 원천을 쓸 수 있습니다.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvSource(lookup);

        let credentials = match (
            env.string("KRAKEN_FUTURES_KEY"),
            env.string("KRAKEN_FUTURES_SECRET"),
        ) {
            (Some(api_key), Some(secret)) => Some(Credentials {
                api_key,
                api_secret: SecretString::from(secret),
            }),
            _ => None,
        };

        let order_history_source = match env.string("ORDER_HISTORY_SOURCE") {
            Some(code) => code
                .parse::<Source>()
                .map_err(|e| SyncError::Config(format!("ORDER_HISTORY_SOURCE: {e}")))?,
            None => Source::KrakenFutures,
        };

        let scheme_name = env
            .string("KRAKEN_FUTURES_SIGNING")
            .unwrap_or_else(|| DEFAULT_SCHEME.to_string());
        let signing_scheme = scheme_by_name(&scheme_name).ok_or_else(|| {
            SyncError::Config(format!(
                "KRAKEN_FUTURES_SIGNING 값이 올바르지 않습니다: {scheme_name} (sha256-hmac-sha512, hmac-sha256)"
            ))
        })?;

        let mode = match env.string("LIVE_SNAPSHOT") {
            Some(value) => value.parse()?,
            None => SnapshotMode::Auto,
        };

        Ok(Self {
            credentials,
            inputs: InputConfig {
                account_logs: env.paths_or("KRAKEN_FUTURES_ACCOUNT_LOG_CSV", &[DEFAULT_ACCOUNT_LOG]),
                order_histories: env.paths_or("ORDER_HISTORY_CSV", &[]),
                order_history_source,
            },
            output_path: env
                .string("PNL_OUTPUT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_PATH)),
            exchange: ExchangeConfig {
                base_url: env
                    .string("KRAKEN_FUTURES_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                signing_scheme,
                timeout: Duration::from_secs(env.parse("HTTP_TIMEOUT_SECS", 30)),
                max_retries: env.parse("HTTP_MAX_RETRIES", 2),
            },
            snapshot: SnapshotConfig {
                mode,
                include_fills: env.bool("SNAPSHOT_FILLS", true),
            },
        })
    }

    /// 자격 증명이 있으면 거래소 클라이언트 설정 생성
    pub fn client_config(&self) -> Option<KrakenFuturesConfig> {
        let credentials = self.credentials.as_ref()?;
        Some(
            KrakenFuturesConfig::new(
                credentials.api_key.clone(),
                SecretString::from(credentials.api_secret.expose_secret()),
            )
            .with_base_url(self.exchange.base_url.clone())
            .with_timeout(self.exchange.timeout)
            .with_max_retries(self.exchange.max_retries)
            .with_signing_scheme(Arc::clone(&self.exchange.signing_scheme)),
        )
    }
}

/// 환경변수 조회 헬퍼
struct EnvSource<F>(F);

impl<F> EnvSource<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// 공백을 제거한 값 (비어있으면 None)
    fn string(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// 값을 파싱 (실패 시 기본값 사용)
    fn parse<T: FromStr>(&self, key: &str, default: T) -> T {
        self.string(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn bool(&self, key: &str, default: bool) -> bool {
        self.string(key)
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(default)
    }

    /// 쉼표로 구분된 경로 목록 (설정되지 않으면 기본값)
    fn paths_or(&self, key: &str, default: &[&str]) -> Vec<PathBuf> {
        match self.string(key) {
            Some(value) => value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .collect(),
            None => default.iter().map(PathBuf::from).collect(),
        }
    }
}
