//! Metadata store codec.
//!
//! `metadata.json` holds a JSON array with one object per corpus item, in
//! corpus order. A `.jsonl` file holding one object per line is accepted too.

use std::fs;
use std::path::Path;

use super::{IndexError, IndexResult};
use crate::models::PaperRecord;

/// Read and validate the metadata records at `path`.
pub fn read_records(path: &Path) -> IndexResult<Vec<PaperRecord>> {
    let text = fs::read_to_string(path)
        .map_err(|e| IndexError::IoError(format!("{}: {}", path.display(), e)))?;

    let records = if is_jsonl(path) {
        parse_jsonl(&text)
    } else {
        parse_json(&text)
    }
    .map_err(|e| match e {
        IndexError::MetadataFormatError(msg) => {
            IndexError::MetadataFormatError(format!("{}: {}", path.display(), msg))
        }
        other => other,
    })?;

    validate(&records)?;
    Ok(records)
}

/// Write records as a pretty-printed JSON array.
pub fn write_records(path: &Path, records: &[PaperRecord]) -> IndexResult<()> {
    let json = serde_json::to_string_pretty(records)
        .map_err(|e| IndexError::MetadataFormatError(e.to_string()))?;
    fs::write(path, json).map_err(|e| IndexError::IoError(format!("{}: {}", path.display(), e)))
}

fn is_jsonl(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jsonl"))
}

/// Parse a JSON array of records.
///
/// Records are decoded one by one so an error can name the offending
/// position.
pub fn parse_json(text: &str) -> IndexResult<Vec<PaperRecord>> {
    let values: Vec<serde_json::Value> = serde_json::from_str(text)
        .map_err(|e| IndexError::MetadataFormatError(format!("expected a JSON array of records: {}", e)))?;

    values
        .into_iter()
        .enumerate()
        .map(|(position, value)| {
            serde_json::from_value(value).map_err(|e| {
                IndexError::InvalidRecord(format!("record {}: {}", position, e))
            })
        })
        .collect()
}

/// Parse one record per non-blank line.
pub fn parse_jsonl(text: &str) -> IndexResult<Vec<PaperRecord>> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(position, line)| {
            serde_json::from_str(line).map_err(|e| {
                IndexError::InvalidRecord(format!("record {}: {}", position, e))
            })
        })
        .collect()
}

fn validate(records: &[PaperRecord]) -> IndexResult<()> {
    for (position, record) in records.iter().enumerate() {
        if record.paper_id.trim().is_empty() {
            return Err(IndexError::InvalidRecord(format!(
                "record {}: paper_id is blank",
                position
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_json_array() {
        let records = parse_json(
            r#"[
                {"paper_id": "a", "topic": "nlp", "summary": "First.", "title": "Alpha"},
                {"paper_id": "b", "topic": "cv", "summary": "Second.", "extra": 1}
            ]"#,
        )
        .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title.as_deref(), Some("Alpha"));
        assert_eq!(records[1].topic.as_deref(), Some("cv"));
        assert_eq!(records[1].title, None);
    }

    #[test]
    fn test_missing_required_field_names_position() {
        let err = parse_json(r#"[{"paper_id": "a", "summary": "S."}, {"paper_id": "b"}]"#).unwrap_err();
        match err {
            IndexError::InvalidRecord(msg) => {
                assert!(msg.contains("record 1"));
                assert!(msg.contains("summary"));
            }
            other => panic!("Expected InvalidRecord, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_non_array() {
        assert!(matches!(
            parse_json(r#"{"paper_id": "a"}"#),
            Err(IndexError::MetadataFormatError(_))
        ));
    }

    #[test]
    fn test_read_jsonl_skips_blank_lines() {
        let mut file = tempfile::Builder::new().suffix(".jsonl").tempfile().unwrap();
        writeln!(file, r#"{{"paper_id": "a", "summary": "One."}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"paper_id": "b", "summary": "Two."}}"#).unwrap();

        let records = read_records(file.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].paper_id, "b");
    }

    #[test]
    fn test_read_rejects_blank_paper_id() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"[{{"paper_id": "  ", "summary": "S."}}]"#).unwrap();

        assert!(matches!(
            read_records(file.path()),
            Err(IndexError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_records(&dir.path().join("metadata.json")),
            Err(IndexError::IoError(_))
        ));
    }
}
