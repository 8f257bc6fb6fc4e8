//! Upload decoding: file type detection plus CSV/XLSX to string table conversion.

use std::io::Cursor;
use std::path::Path;

use calamine::{Data, Reader, Xlsx, XlsxError};
use thiserror::Error;

/// Supported upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Comma-separated values, UTF-8.
    Csv,
    /// Office Open XML workbook; only the first worksheet is read.
    Xlsx,
}

impl FileKind {
    /// Detects the format from the upload's file name extension.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())?
            .to_ascii_lowercase();
        match extension.as_str() {
            "csv" => Some(Self::Csv),
            "xlsx" => Some(Self::Xlsx),
            _ => None,
        }
    }
}

/// Errors surfaced while turning upload bytes into a table.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// CSV reader failure (bad UTF-8, unbalanced quotes, ...).
    #[error("invalid csv: {0}")]
    Csv(#[from] csv::Error),
    /// Workbook could not be opened or read.
    #[error("invalid workbook: {0}")]
    Workbook(#[from] XlsxError),
    /// Workbook has no worksheet to read.
    #[error("workbook contains no worksheets")]
    NoWorksheet,
    /// No header row was found.
    #[error("file has no header row")]
    MissingHeader,
}

/// Header names plus string cells, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    /// Header row.
    pub columns: Vec<String>,
    /// Data rows, each exactly `columns.len()` cells wide.
    pub records: Vec<Vec<String>>,
}

impl RawTable {
    /// Builds a table, padding or truncating every record to the header width.
    pub fn new(columns: Vec<String>, records: Vec<Vec<String>>) -> Self {
        let width = columns.len();
        let records = records
            .into_iter()
            .map(|mut record| {
                record.resize(width, String::new());
                record
            })
            .collect();
        Self { columns, records }
    }

    /// Returns true when the header row contains `column`.
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|name| name == column)
    }
}

/// Decodes upload bytes according to `kind`.
pub fn decode(kind: FileKind, bytes: &[u8]) -> Result<RawTable, DecodeError> {
    match kind {
        FileKind::Csv => decode_csv(bytes),
        FileKind::Xlsx => decode_xlsx(bytes),
    }
}

fn decode_csv(bytes: &[u8]) -> Result<RawTable, DecodeError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);
    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            if idx == 0 {
                name.trim_start_matches('\u{feff}').to_string()
            } else {
                name.to_string()
            }
        })
        .collect();
    if columns.is_empty() {
        return Err(DecodeError::MissingHeader);
    }
    let mut records = Vec::new();
    for record in reader.records() {
        let record = record?;
        records.push(record.iter().map(str::to_string).collect());
    }
    Ok(RawTable::new(columns, records))
}

fn decode_xlsx(bytes: &[u8]) -> Result<RawTable, DecodeError> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(DecodeError::NoWorksheet)??;
    let mut rows = range.rows();
    let columns: Vec<String> = rows
        .next()
        .ok_or(DecodeError::MissingHeader)?
        .iter()
        .map(cell_to_string)
        .collect();
    let records = rows
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();
    Ok(RawTable::new(columns, records))
}

/// Stringifies one spreadsheet cell.
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(text) => text.clone(),
        Data::Int(value) => value.to_string(),
        Data::Float(value) => float_to_string(*value),
        Data::Bool(true) => "True".to_string(),
        Data::Bool(false) => "False".to_string(),
        other => other.to_string(),
    }
}

// Spreadsheets store integers as floats; step numbers must read "1", not "1.0".
fn float_to_string(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn detects_supported_extensions() {
        assert_eq!(FileKind::from_file_name("cases.csv"), Some(FileKind::Csv));
        assert_eq!(FileKind::from_file_name("Cases.XLSX"), Some(FileKind::Xlsx));
        assert_eq!(FileKind::from_file_name("cases.xls"), None);
        assert_eq!(FileKind::from_file_name("cases"), None);
        assert_eq!(FileKind::from_file_name("csv"), None);
    }

    #[test]
    fn decodes_csv_and_pads_short_records() {
        let bytes = b"\xef\xbb\xbfTest Case ID,Test Step,Expected Result\nTC-1,Open app\nTC-1,\"Tap, then wait\",Spinner\n";
        let table = decode(FileKind::Csv, bytes).expect("decode csv");
        assert_eq!(
            table.columns,
            vec!["Test Case ID", "Test Step", "Expected Result"]
        );
        assert_eq!(
            table.records,
            vec![
                vec!["TC-1".to_string(), "Open app".to_string(), String::new()],
                vec![
                    "TC-1".to_string(),
                    "Tap, then wait".to_string(),
                    "Spinner".to_string()
                ],
            ]
        );
        assert!(table.has_column("Test Case ID"));
    }

    #[test]
    fn rejects_non_utf8_csv() {
        let bytes = b"Test Case ID\n\xff\xfe\n";
        assert!(decode(FileKind::Csv, bytes).is_err());
    }

    #[test]
    fn rejects_garbage_workbook() {
        let err = decode(FileKind::Xlsx, b"not a zip archive").unwrap_err();
        assert!(matches!(err, DecodeError::Workbook(_)));
    }

    #[test]
    fn renders_integral_floats_without_fraction() {
        assert_eq!(cell_to_string(&Data::Float(1.0)), "1");
        assert_eq!(cell_to_string(&Data::Float(2.5)), "2.5");
        assert_eq!(cell_to_string(&Data::Empty), "");
        assert_eq!(cell_to_string(&Data::Bool(true)), "True");
    }
}
