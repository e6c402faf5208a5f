use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::normalize::Cell;
use crate::record::normalize_member;

/// Supplies raw sheet rows for one team member.
#[async_trait]
pub trait RowSource: Send + Sync {
    /// Fetch every row for `member`. An empty result is a valid empty sheet.
    async fn fetch(&self, member: &str) -> Result<Vec<Vec<Cell>>>;

    /// Stable name for logging.
    fn name(&self) -> &str;
}

/// Either a bare array of rows or the sheet API's `{ "values": [...] }` envelope.
#[derive(Deserialize)]
#[serde(untagged)]
enum JsonRows {
    Rows(Vec<Vec<Cell>>),
    Envelope {
        #[serde(default)]
        values: Vec<Vec<Cell>>,
    },
}

impl JsonRows {
    fn into_rows(self) -> Vec<Vec<Cell>> {
        match self {
            JsonRows::Rows(rows) | JsonRows::Envelope { values: rows } => rows,
        }
    }
}

/// Parse rows from JSON text, in either accepted shape.
pub fn rows_from_json(text: &str) -> Result<Vec<Vec<Cell>>> {
    let parsed: JsonRows = serde_json::from_str(text)?;
    Ok(parsed.into_rows())
}

/// Parse rows from CSV text. Every line is kept, including a header, since
/// the normalizer recognises header rows itself.
pub fn rows_from_csv<R: std::io::Read>(reader: R) -> Result<Vec<Vec<Cell>>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        rows.push(record.iter().map(Cell::from_field).collect());
    }
    Ok(rows)
}

/// Rows exported as JSON.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RowSource for JsonFileSource {
    async fn fetch(&self, member: &str) -> Result<Vec<Vec<Cell>>> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| source_error(member, &self.path, e))?;
        rows_from_json(&text).map_err(|e| source_error(member, &self.path, e))
    }

    fn name(&self) -> &str {
        "json"
    }
}

/// Rows exported as CSV, with or without a header line.
#[derive(Debug, Clone)]
pub struct CsvFileSource {
    path: PathBuf,
}

impl CsvFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RowSource for CsvFileSource {
    async fn fetch(&self, member: &str) -> Result<Vec<Vec<Cell>>> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| source_error(member, &self.path, e))?;
        rows_from_csv(bytes.as_slice()).map_err(|e| source_error(member, &self.path, e))
    }

    fn name(&self) -> &str {
        "csv"
    }
}

/// Fixed rows keyed by member. Unknown members get no rows.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    rows: HashMap<String, Vec<Vec<Cell>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, member: &str, rows: Vec<Vec<Cell>>) -> Self {
        self.rows.insert(normalize_member(member), rows);
        self
    }
}

#[async_trait]
impl RowSource for MemorySource {
    async fn fetch(&self, member: &str) -> Result<Vec<Vec<Cell>>> {
        Ok(self
            .rows
            .get(&normalize_member(member))
            .cloned()
            .unwrap_or_default())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Pick a file source by extension: `.csv` is CSV, anything else JSON.
pub fn file_source(path: &Path) -> Box<dyn RowSource> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if is_csv {
        Box::new(CsvFileSource::new(path))
    } else {
        Box::new(JsonFileSource::new(path))
    }
}

fn source_error(member: &str, path: &Path, e: impl std::fmt::Display) -> Error {
    Error::Source {
        member: normalize_member(member),
        message: format!("{}: {e}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_rows_from_json_shapes() {
        let bare = rows_from_json(r#"[["2025-01-01", 10, null], []]"#).unwrap();
        assert_eq!(bare.len(), 2);
        assert_eq!(bare[0][0], Cell::Text("2025-01-01".into()));
        assert_eq!(bare[0][1], Cell::Number(10.0));
        assert_eq!(bare[0][2], Cell::Empty);

        let envelope =
            rows_from_json(r#"{"range": "Analysis!A2:W", "values": [[45658, "5"]]}"#).unwrap();
        assert_eq!(envelope, vec![vec![Cell::Number(45658.0), Cell::Text("5".into())]]);

        assert!(rows_from_json(r#"{"range": "Analysis!A2:W"}"#).unwrap().is_empty());
        assert!(rows_from_json("not json").is_err());
    }

    #[test]
    fn test_rows_from_csv_keeps_header_and_ragged_rows() {
        let text = "Date,Outbound,Triage\n2025-01-01,10,\n2025-01-02,$1,200\n";
        let rows = rows_from_csv(text.as_bytes()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][0], Cell::Text("Date".into()));
        assert_eq!(rows[1][1], Cell::Number(10.0));
        assert_eq!(rows[1][2], Cell::Empty);
        assert_eq!(rows[2][1], Cell::Text("$1".into()));
    }

    #[tokio::test]
    async fn test_json_file_source() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"values": [["2025-01-01", 3]]}}"#).unwrap();
        let source = file_source(file.path());
        assert_eq!(source.name(), "json");
        let rows = source.fetch("chris").await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_csv_file_source() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "2025-01-01,3,1").unwrap();
        writeln!(file, "2025-01-02,4,0").unwrap();
        let source = file_source(file.path());
        assert_eq!(source.name(), "csv");
        let rows = source.fetch("chris").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][1], Cell::Number(4.0));
    }

    #[tokio::test]
    async fn test_missing_file_is_source_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = JsonFileSource::new(dir.path().join("missing.json"));
        match source.fetch("chris").await {
            Err(Error::Source { member, .. }) => assert_eq!(member, "CHRIS"),
            other => panic!("expected source error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_memory_source() {
        let source = MemorySource::new().with_rows("chris", vec![vec![Cell::from(1.0)]]);
        assert_eq!(source.fetch("Chris").await.unwrap().len(), 1);
        assert!(source.fetch("israel").await.unwrap().is_empty());
    }
}
