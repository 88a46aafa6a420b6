// ============================================================
// Layer 4 — Manifest Index
// ============================================================
// Parses the flat manifest that enumerates every sample:
//
//   <path-or-reference>\t<classId>\n
//
// One record per line, no header row. The class id is a base-10
// non-negative integer.
//
// Ingestion is all-or-nothing: the first malformed line rejects
// the whole manifest instead of being skipped, because skipping
// would silently shift every later sequence id.
//
// The index holds no cursor state between calls, so load_all()
// can be repeated whenever the catalog has to be rebuilt.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::domain::error::{PipelineError, Result};
use crate::domain::record::RecordDescriptor;
use crate::domain::traits::RecordSource;

/// Reads `RecordDescriptor`s from a tab-delimited manifest file.
#[derive(Debug, Clone)]
pub struct ManifestIndex {
    path: PathBuf,
}

impl ManifestIndex {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Parse the manifest at `path` in one call.
    pub fn parse(path: impl AsRef<Path>) -> Result<Vec<RecordDescriptor>> {
        Self::new(path.as_ref()).load_all()
    }
}

impl RecordSource for ManifestIndex {
    fn load_all(&self) -> Result<Vec<RecordDescriptor>> {
        let file = File::open(&self.path).map_err(|source| PipelineError::ManifestUnreadable {
            path: self.path.clone(),
            source,
        })?;

        let records = parse_reader(BufReader::new(file)).map_err(|e| match e {
            // Read failures half-way through are still "unreadable"
            ManifestReadError::Io(source) => PipelineError::ManifestUnreadable {
                path: self.path.clone(),
                source,
            },
            ManifestReadError::Format(e) => e,
        })?;

        tracing::info!(
            "Indexed {} records from manifest '{}'",
            records.len(),
            self.path.display()
        );
        Ok(records)
    }
}

enum ManifestReadError {
    Io(std::io::Error),
    Format(PipelineError),
}

fn parse_reader(reader: impl BufRead) -> std::result::Result<Vec<RecordDescriptor>, ManifestReadError> {
    let mut records = Vec::new();

    for (offset, line) in reader.lines().enumerate() {
        let line = line.map_err(ManifestReadError::Io)?;
        let record = parse_line(&line, offset + 1).map_err(ManifestReadError::Format)?;
        records.push(record);
    }

    Ok(records)
}

/// Parse manifest text held in memory.
pub fn parse_str(text: &str) -> Result<Vec<RecordDescriptor>> {
    text.lines()
        .enumerate()
        .map(|(offset, line)| parse_line(line, offset + 1))
        .collect()
}

/// Parse a single manifest line. `line_no` is 1-based and only used
/// for error reporting.
pub fn parse_line(line: &str, line_no: usize) -> Result<RecordDescriptor> {
    // Tolerate Windows line endings
    let line = line.strip_suffix('\r').unwrap_or(line);

    let format_err = |reason: String| PipelineError::ManifestFormat { line: line_no, reason };

    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != 2 {
        return Err(format_err(format!(
            "expected 2 tab-delimited fields, found {}",
            fields.len()
        )));
    }

    let path = fields[0];
    if path.is_empty() {
        return Err(format_err("empty sample path".to_string()));
    }

    let raw_class = fields[1].trim();
    let class_id = raw_class
        .parse::<usize>()
        .map_err(|_| format_err(format!("class id '{raw_class}' is not a non-negative integer")))?;

    Ok(RecordDescriptor::new(path, class_id))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn manifest(text: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(text.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_parses_records_in_order() {
        let f = manifest("imgA.ext\t0\nimgB.ext\t2\n");
        let records = ManifestIndex::parse(f.path()).unwrap();
        assert_eq!(
            records,
            vec![
                RecordDescriptor::new("imgA.ext", 0),
                RecordDescriptor::new("imgB.ext", 2),
            ]
        );
    }

    #[test]
    fn test_load_all_is_restartable() {
        let f = manifest("a\t1\nb\t0\n");
        let index = ManifestIndex::new(f.path());
        assert_eq!(index.load_all().unwrap(), index.load_all().unwrap());
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let err = ManifestIndex::parse("/definitely/not/here.txt").unwrap_err();
        assert!(matches!(err, PipelineError::ManifestUnreadable { .. }));
    }

    #[test]
    fn test_missing_tab_reports_line() {
        let f = manifest("a\t0\nno-tab-here\nc\t1\n");
        match ManifestIndex::parse(f.path()).unwrap_err() {
            PipelineError::ManifestFormat { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_integer_class_id_is_rejected() {
        for bad in ["a\tcat", "a\t-1", "a\t1.5", "a\t"] {
            let err = parse_str(bad).unwrap_err();
            assert!(matches!(err, PipelineError::ManifestFormat { line: 1, .. }), "{bad:?}");
        }
    }

    #[test]
    fn test_extra_fields_are_rejected() {
        let err = parse_str("a\t0\textra").unwrap_err();
        assert!(matches!(err, PipelineError::ManifestFormat { line: 1, .. }));
    }

    #[test]
    fn test_crlf_and_padding_are_tolerated() {
        let records = parse_str("a.png\t3\r\nb.png\t 4 \r\n").unwrap();
        assert_eq!(records[0].class_id, 3);
        assert_eq!(records[1].class_id, 4);
        assert_eq!(records[1].path, "b.png");
    }

    #[test]
    fn test_empty_manifest_gives_no_records() {
        assert!(parse_str("").unwrap().is_empty());
    }
}
