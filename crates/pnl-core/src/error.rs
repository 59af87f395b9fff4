//! 에러 타입 정의.

use thiserror::Error;

/// pnl-core 에러.
///
/// 값 하나의 해석 실패는 에러가 아닙니다 (기본값으로 대체).
/// 입력 자체를 읽을 수 없을 때만 사용합니다.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 입력 파일 읽기 실패
    #[error("입력 파일 읽기 실패 ({path}): {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV 헤더 파싱 실패
    #[error("CSV 파싱 실패: {0}")]
    Csv(#[from] csv::Error),

    /// 알 수 없는 원천 코드
    #[error("알 수 없는 원천: {0}")]
    UnknownSource(String),
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CoreError>;
