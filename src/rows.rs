//! Row-level stages: null cleanup, identifier forward fill, and grouping by test case.

use std::collections::{BTreeMap, HashMap};

use crate::decode::RawTable;

/// One input row keyed by column name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    cells: BTreeMap<String, String>,
}

impl RawRow {
    /// Builds a row from `(column, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            cells: pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    /// Cell value, or `None` when the column is not part of the sheet.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells.get(column).map(String::as_str)
    }

    /// Overwrites a single cell.
    pub fn set(&mut self, column: &str, value: impl Into<String>) {
        self.cells.insert(column.to_string(), value.into());
    }
}

/// Converts decoded records into rows, blanking configured null markers.
#[derive(Debug, Clone)]
pub struct RowNormalizer {
    null_markers: Vec<String>,
}

impl RowNormalizer {
    /// Builds a normalizer for the given null markers (exact matches).
    pub fn new(null_markers: Vec<String>) -> Self {
        Self { null_markers }
    }

    /// Cleans a single cell.
    pub fn normalize_cell(&self, value: &str) -> String {
        if self.null_markers.iter().any(|marker| marker == value) {
            String::new()
        } else {
            value.to_string()
        }
    }

    /// Produces one `RawRow` per record, keyed by the table's header.
    pub fn normalize(&self, table: &RawTable) -> Vec<RawRow> {
        table
            .records
            .iter()
            .map(|record| {
                RawRow::from_pairs(
                    table
                        .columns
                        .iter()
                        .zip(record.iter())
                        .map(|(column, value)| (column.clone(), self.normalize_cell(value))),
                )
            })
            .collect()
    }
}

/// Copies the last non-empty identifier into following empty identifier cells.
///
/// Only exactly empty cells are filled. A whitespace-only identifier is kept as
/// written, so it and the rows inheriting it are dropped by `fill_and_filter`.
/// Leading rows with no earlier identifier stay empty.
pub fn forward_fill_ids(rows: Vec<RawRow>, id_column: &str) -> Vec<RawRow> {
    let mut last_seen: Option<String> = None;
    rows.into_iter()
        .map(|mut row| {
            match row.get(id_column) {
                Some(id) if !id.is_empty() => last_seen = Some(id.to_string()),
                _ => {
                    if let Some(id) = &last_seen {
                        row.set(id_column, id.clone());
                    }
                }
            }
            row
        })
        .collect()
}

/// Returns true when `id` names a real test case.
pub fn is_resolved_id(id: &str) -> bool {
    let trimmed = id.trim();
    !trimmed.is_empty() && !trimmed.eq_ignore_ascii_case("NA")
}

/// Forward fills identifiers, then drops rows whose identifier is blank or "NA".
pub fn fill_and_filter(rows: Vec<RawRow>, id_column: &str) -> Vec<RawRow> {
    forward_fill_ids(rows, id_column)
        .into_iter()
        .filter(|row| row.get(id_column).is_some_and(is_resolved_id))
        .collect()
}

/// Rows sharing one test case identifier, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCaseGroup {
    /// Test case identifier as written in the sheet.
    pub id: String,
    /// Member rows; never empty.
    pub rows: Vec<RawRow>,
}

impl TestCaseGroup {
    /// First row of the group, which carries the single-valued metadata.
    pub fn first_row(&self) -> Option<&RawRow> {
        self.rows.first()
    }
}

/// Partitions rows by identifier, keeping first-seen group order and row order.
///
/// Fails with the offending position when a row has no usable identifier.
pub fn group_test_cases(rows: Vec<RawRow>, id_column: &str) -> Result<Vec<TestCaseGroup>, usize> {
    let mut groups: Vec<TestCaseGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for (position, row) in rows.into_iter().enumerate() {
        let id = match row.get(id_column) {
            Some(id) if is_resolved_id(id) => id.to_string(),
            _ => return Err(position),
        };
        match index.get(&id).copied() {
            Some(slot) => groups[slot].rows.push(row),
            None => {
                index.insert(id.clone(), groups.len());
                groups.push(TestCaseGroup { id, rows: vec![row] });
            }
        }
    }
    Ok(groups)
}
