//! 에러 타입 정의.

use std::path::PathBuf;

use thiserror::Error;

/// 동기화 실행 에러
#[derive(Debug, Error)]
pub enum SyncError {
    /// 설정 에러
    #[error("설정 오류: {0}")]
    Config(String),

    /// 스냅샷이 필수인데 자격 증명이 없음
    #[error("라이브 스냅샷 필수 모드지만 자격 증명이 없습니다: {0}")]
    MissingCredentials(String),

    /// 출력 파일 쓰기 에러
    #[error("출력 파일 쓰기 실패 ({path}): {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 페이로드 직렬화 에러
    #[error("페이로드 직렬화 실패: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, SyncError>;
