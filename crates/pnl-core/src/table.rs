//! 헤더 기반 표 형식 입력.
//!
//! 거래소 CSV 내보내기 파일을 읽어 헤더 이름으로 접근 가능한 행 목록으로
//! 변환합니다. 헤더 이름은 소문자 + 공백 정리 형태로 정규화하며,
//! 구분자(`,` `;` 탭 `|`)는 헤더 줄에서 자동 감지합니다.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::{CoreError, Result};

const BOM: char = '\u{feff}';
const BOM_BYTES: &[u8] = b"\xef\xbb\xbf";
const DELIMITER_CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];

/// 헤더 이름 정규화: 소문자, 내부 공백 하나로 축약.
pub fn normalize_header(name: &str) -> String {
    name.trim_start_matches(BOM)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// 헤더 줄에서 구분자 추정 (따옴표 안은 무시).
fn detect_delimiter(bytes: &[u8]) -> u8 {
    let header = bytes
        .split(|byte| *byte == b'\n')
        .find(|line| !line.iter().all(u8::is_ascii_whitespace))
        .unwrap_or_default();
    let mut counts = [0usize; DELIMITER_CANDIDATES.len()];
    let mut in_quotes = false;

    for &byte in header {
        if byte == b'"' {
            in_quotes = !in_quotes;
            continue;
        }
        if in_quotes {
            continue;
        }
        if let Some(idx) = DELIMITER_CANDIDATES.iter().position(|d| *d == byte) {
            counts[idx] += 1;
        }
    }

    counts
        .iter()
        .enumerate()
        .filter(|(_, count)| **count > 0)
        .max_by_key(|(idx, count)| (**count, usize::MAX - *idx))
        .map(|(idx, _)| DELIMITER_CANDIDATES[idx])
        .unwrap_or(b',')
}

/// 원천 표 한 행.
#[derive(Debug, Clone)]
pub struct RawRow {
    line: usize,
    columns: Arc<HashMap<String, usize>>,
    values: Vec<String>,
}

impl RawRow {
    /// 원본 파일의 데이터 행 번호 (1부터).
    pub fn line(&self) -> usize {
        self.line
    }

    /// 별칭 중 비어있지 않은 첫 값. 없으면 빈 문자열.
    pub fn get(&self, aliases: &[&str]) -> &str {
        aliases
            .iter()
            .filter_map(|alias| self.columns.get(*alias))
            .filter_map(|idx| self.values.get(*idx))
            .map(|value| value.trim())
            .find(|value| !value.is_empty())
            .unwrap_or("")
    }

    /// 별칭 중 하나라도 헤더에 존재하는지.
    pub fn has_column(&self, aliases: &[&str]) -> bool {
        aliases.iter().any(|alias| self.columns.contains_key(*alias))
    }

    /// 모든 값이 비어있는 행인지.
    pub fn is_blank(&self) -> bool {
        self.values.iter().all(|value| value.trim().is_empty())
    }
}

/// 헤더 기반 표.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    origin: String,
    headers: Vec<String>,
    rows: Vec<RawRow>,
    malformed_rows: usize,
    lossy_rows: usize,
}

impl RawTable {
    /// 파일에서 읽기.
    ///
    /// UTF-8 BOM은 제거합니다. 파일 인코딩이 UTF-8이 아니어도 실패하지 않습니다
    /// ([`RawTable::from_csv_bytes`] 참고).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| CoreError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_csv_bytes(&bytes, path.display().to_string())
    }

    /// CSV 텍스트에서 읽기.
    pub fn from_csv_str(text: &str, origin: impl Into<String>) -> Result<Self> {
        Self::from_csv_bytes(text.as_bytes(), origin)
    }

    /// CSV 바이트에서 읽기.
    ///
    /// 필드 수가 맞지 않는 행도 허용하며 (부족한 컬럼은 빈 값),
    /// 디코딩할 수 없는 행은 건너뛰고 `malformed_rows`로 집계합니다.
    /// UTF-8이 아닌 바이트는 U+FFFD로 바꾸고 해당 행을 `lossy_rows`로 집계합니다.
    pub fn from_csv_bytes(bytes: &[u8], origin: impl Into<String>) -> Result<Self> {
        let origin = origin.into();
        let bytes = bytes.strip_prefix(BOM_BYTES).unwrap_or(bytes);
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self {
                origin,
                ..Default::default()
            });
        }

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(detect_delimiter(bytes))
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);

        let headers: Vec<String> = reader
            .byte_headers()?
            .iter()
            .map(|field| normalize_header(&String::from_utf8_lossy(field)))
            .collect();
        let columns = Arc::new(index_columns(&headers));

        let mut rows = Vec::new();
        let mut malformed_rows = 0;
        let mut lossy_rows = 0;
        for (idx, result) in reader.byte_records().enumerate() {
            match result {
                Ok(record) => {
                    let mut lossy = false;
                    let values = record
                        .iter()
                        .map(|field| match std::str::from_utf8(field) {
                            Ok(text) => text.to_string(),
                            Err(_) => {
                                lossy = true;
                                String::from_utf8_lossy(field).into_owned()
                            }
                        })
                        .collect();
                    if lossy {
                        tracing::debug!(origin = %origin, line = idx + 1, "UTF-8이 아닌 바이트 대체");
                        lossy_rows += 1;
                    }
                    rows.push(RawRow {
                        line: idx + 1,
                        columns: Arc::clone(&columns),
                        values,
                    });
                }
                Err(e) => {
                    tracing::debug!(origin = %origin, line = idx + 1, error = %e, "CSV 행 건너뜀");
                    malformed_rows += 1;
                }
            }
        }

        Ok(Self {
            origin,
            headers,
            rows,
            malformed_rows,
            lossy_rows,
        })
    }

    /// 이미 분리된 값으로 표 구성 (API 응답 변환, 테스트 등).
    pub fn from_rows<H, R, V>(origin: impl Into<String>, headers: H, rows: R) -> Self
    where
        H: IntoIterator,
        H::Item: AsRef<str>,
        R: IntoIterator<Item = Vec<V>>,
        V: Into<String>,
    {
        let headers: Vec<String> = headers
            .into_iter()
            .map(|h| normalize_header(h.as_ref()))
            .collect();
        let columns = Arc::new(index_columns(&headers));
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(idx, values)| RawRow {
                line: idx + 1,
                columns: Arc::clone(&columns),
                values: values.into_iter().map(Into::into).collect(),
            })
            .collect();

        Self {
            origin: origin.into(),
            headers,
            rows,
            malformed_rows: 0,
            lossy_rows: 0,
        }
    }

    /// 입력 출처 (파일 경로 등).
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[RawRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 디코딩 실패로 건너뛴 행 수.
    pub fn malformed_rows(&self) -> usize {
        self.malformed_rows
    }

    /// UTF-8이 아닌 바이트를 대체 문자로 바꾼 행 수.
    pub fn lossy_rows(&self) -> usize {
        self.lossy_rows
    }
}

/// 중복 헤더는 첫 번째 컬럼이 우선.
fn index_columns(headers: &[String]) -> HashMap<String, usize> {
    let mut columns = HashMap::with_capacity(headers.len());
    for (idx, header) in headers.iter().enumerate() {
        columns.entry(header.clone()).or_insert(idx);
    }
    columns
}
