//! PnL 원장 동기화 경계 계층.
//!
//! 환경 설정을 읽고, 거래소 내보내기 파일과 (선택적으로) 라이브 스냅샷으로
//! 원장 페이로드를 만들어 JSON 파일로 저장합니다.

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod stats;

pub use config::{Credentials, SnapshotMode, SyncConfig};
pub use error::{Result, SyncError};
pub use output::write_payload;
pub use pipeline::SyncPipeline;
pub use stats::RunStats;
