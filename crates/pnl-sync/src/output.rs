//! 원장 페이로드 파일 저장.
//!
//! 대상 파일과 같은 디렉토리에 임시 파일을 쓴 뒤 rename으로 교체합니다.
//! 중간에 실패하면 임시 파일만 지워지고 기존 원장은 그대로 남습니다.

use std::fs;
use std::io::Write;
use std::path::Path;

use pnl_core::LedgerPayload;
use tempfile::NamedTempFile;

use crate::error::SyncError;
use crate::Result;

fn output_error(path: &Path) -> impl FnOnce(std::io::Error) -> SyncError + '_ {
    move |source| SyncError::Output {
        path: path.to_path_buf(),
        source,
    }
}

/// 페이로드를 JSON(pretty)으로 저장합니다. 상위 디렉토리는 자동 생성합니다.
pub fn write_payload(path: &Path, payload: &LedgerPayload) -> Result<()> {
    let json = serde_json::to_string_pretty(payload)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(output_error(dir))?;

    let mut file = NamedTempFile::new_in(dir).map_err(output_error(path))?;
    file.write_all(json.as_bytes()).map_err(output_error(path))?;
    file.write_all(b"\n").map_err(output_error(path))?;
    file.as_file().sync_all().map_err(output_error(path))?;
    file.persist(path)
        .map_err(|e| output_error(path)(e.error))?;

    tracing::info!(
        path = %path.display(),
        rows = payload.counts.rows,
        bytes = json.len(),
        "원장 저장 완료"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use pnl_core::{MergeEngine, RunMeta};

    use super::*;

    fn empty_payload() -> LedgerPayload {
        let outcome = MergeEngine::new().merge(Vec::<Vec<_>>::new());
        LedgerPayload::new(outcome, RunMeta::new(Utc::now()))
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("site").join("data").join("pnl.json");

        write_payload(&target, &empty_payload()).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&target).unwrap()).unwrap();
        assert_eq!(written["ok"], true);
        assert_eq!(written["exchange"], "kraken_futures");
        assert_eq!(written["counts"]["rows"], 0);
        assert!(written["rows"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_replaces_existing_file_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("pnl.json");
        fs::write(&target, "old").unwrap();

        write_payload(&target, &empty_payload()).unwrap();

        assert!(fs::read_to_string(&target).unwrap().starts_with('{'));
        let entries = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_unwritable_target_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "file").unwrap();
        let target = blocker.join("pnl.json");

        let err = write_payload(&target, &empty_payload()).unwrap_err();
        assert!(matches!(err, SyncError::Output { .. }));
    }
}
