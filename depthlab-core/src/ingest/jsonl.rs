//! JSON-lines reading with per-line failure tolerance.

use std::fs;
use std::io::{self, BufRead};
use std::path::Path;

use serde_json::Value;
use tracing::warn;

use super::error::{IngestError, RecordError};

/// A parsed line together with its 1-based line number.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub line: usize,
    pub value: Value,
}

/// Parsed records plus the lines that failed to parse.
#[derive(Debug, Clone, Default)]
pub struct JsonlBatch {
    pub records: Vec<RawRecord>,
    pub rejected: Vec<RecordError>,
}

/// Parse JSON lines from any reader. Blank lines are skipped; unparsable lines
/// are collected as [`RecordError::InvalidJson`].
pub fn parse_jsonl<R: BufRead>(reader: R) -> io::Result<JsonlBatch> {
    let mut batch = JsonlBatch::default();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => batch.records.push(RawRecord { line: i + 1, value }),
            Err(e) => {
                let err = RecordError::InvalidJson {
                    line: i + 1,
                    message: e.to_string(),
                };
                warn!(%err, "skipping record");
                batch.rejected.push(err);
            }
        }
    }

    Ok(batch)
}

/// Parse JSON lines from an in-memory string.
pub fn parse_jsonl_str(content: &str) -> JsonlBatch {
    // Reading from a byte slice cannot fail with an I/O error.
    parse_jsonl(content.as_bytes()).unwrap_or_default()
}

/// Read a JSON-lines file.
pub fn read_jsonl(path: &Path) -> Result<JsonlBatch, IngestError> {
    let file = fs::File::open(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_jsonl(io::BufReader::new(file)).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn blank_lines_are_skipped_and_numbered() {
        let batch = parse_jsonl_str("{\"a\":1}\n\n  \n{\"a\":2}\n");
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.records[0].line, 1);
        assert_eq!(batch.records[1].line, 4);
        assert!(batch.rejected.is_empty());
    }

    #[test]
    fn bad_lines_do_not_stop_the_file() {
        let batch = parse_jsonl_str("{\"a\":1}\n{not json\n{\"a\":3}\n");
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.rejected.len(), 1);
        assert_eq!(batch.rejected[0].line(), 2);
    }

    #[test]
    fn reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{\"uid\": \"a\", \"t\": 1}}").unwrap();
        writeln!(file, "{{\"uid\": \"a\", \"t\": 2}}").unwrap();
        let batch = read_jsonl(file.path()).unwrap();
        assert_eq!(batch.records.len(), 2);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_jsonl(Path::new("/definitely/not/here.jsonl")).unwrap_err();
        assert!(matches!(err, IngestError::Io { .. }));
    }
}
