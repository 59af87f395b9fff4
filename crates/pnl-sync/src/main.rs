//! PnL 원장 동기화 CLI.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use pnl_core::Source;
use pnl_exchange::{NonceSource, RequestSigner};
use pnl_sync::{write_payload, SnapshotMode, SyncConfig, SyncPipeline};
use secrecy::ExposeSecret;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pnl-sync")]
#[command(about = "PnL Ledger Sync", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// JSON 형식 로그
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// 원장 생성 후 저장
    Run {
        /// 계좌 로그 CSV (반복 지정 가능, 지정하면 환경변수 대신 사용)
        #[arg(long = "account-log")]
        account_logs: Vec<PathBuf>,

        /// 주문 내역 CSV (반복 지정 가능)
        #[arg(long = "order-history")]
        order_histories: Vec<PathBuf>,

        /// 주문 내역 원천 거래소 (KRAKENF, BINANCEF, BYBITF)
        #[arg(long)]
        order_source: Option<Source>,

        /// 출력 경로
        #[arg(long)]
        output: Option<PathBuf>,

        /// 라이브 스냅샷 모드
        #[arg(long, value_enum)]
        snapshot: Option<SnapshotMode>,

        /// 스냅샷에서 체결 내역 조회 생략
        #[arg(long)]
        no_fills: bool,

        /// 파일을 쓰지 않고 결과만 출력
        #[arg(long)]
        dry_run: bool,
    },

    /// 설정된 secret으로 요청 서명 계산 (디버깅용)
    Sign {
        /// 서명 대상 path (예: /api/v3/accounts)
        #[arg(long)]
        path: String,

        /// nonce (생략 시 현재 시각 ms)
        #[arg(long)]
        nonce: Option<u64>,

        /// postdata (GET은 canonical query)
        #[arg(long, default_value = "")]
        postdata: String,
    },
}

fn init_tracing(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("pnl_sync={level},pnl_core={level},pnl_exchange={level}").into()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json);

    let mut config = SyncConfig::from_env().context("설정 로드 실패")?;
    tracing::debug!(config = ?config, "설정 로드 완료");

    match cli.command {
        Commands::Run {
            account_logs,
            order_histories,
            order_source,
            output,
            snapshot,
            no_fills,
            dry_run,
        } => {
            if !account_logs.is_empty() {
                config.inputs.account_logs = account_logs;
            }
            if !order_histories.is_empty() {
                config.inputs.order_histories = order_histories;
            }
            if let Some(source) = order_source {
                config.inputs.order_history_source = source;
            }
            if let Some(output) = output {
                config.output_path = output;
            }
            if let Some(mode) = snapshot {
                config.snapshot.mode = mode;
            }
            if no_fills {
                config.snapshot.include_fills = false;
            }

            tracing::info!("PnL 원장 동기화 시작");
            let pipeline = SyncPipeline::new(config);
            let (payload, stats) = pipeline.run().await?;

            for warning in &payload.meta.warnings {
                tracing::warn!(warning = %warning, "실행 경고");
            }

            if dry_run {
                println!("{}", serde_json::to_string_pretty(&payload.counts)?);
            } else {
                write_payload(&pipeline.config().output_path, &payload)?;
            }
            stats.log_summary("원장 동기화");
        }
        Commands::Sign {
            path,
            nonce,
            postdata,
        } => {
            let credentials = config
                .credentials
                .as_ref()
                .context("KRAKEN_FUTURES_KEY / KRAKEN_FUTURES_SECRET가 설정되지 않았습니다")?;
            let signer = RequestSigner::new(
                credentials.api_secret.expose_secret(),
                Arc::clone(&config.exchange.signing_scheme),
            )?;
            let nonce = nonce.unwrap_or_else(|| NonceSource::new().next()).to_string();
            let authent = signer.sign(&path, &nonce, &postdata)?;

            println!("Scheme:  {}", signer.scheme().name());
            println!("Nonce:   {nonce}");
            println!("Authent: {authent}");
        }
    }

    Ok(())
}
