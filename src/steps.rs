//! Collapses a group's step rows into one instruction block.

use crate::config::ColumnMap;
use crate::rows::RawRow;

/// Separator placed between rendered steps.
pub const STEP_SEPARATOR: &str = "\n\n";

/// Renders one step line. Returns `None` when the step text is blank.
///
/// Produces `Step <number>: <text>` (or just `<text>` without a number), with
/// ` → Expected: <result>` appended when an expected result is present.
pub fn format_step(number: &str, text: &str, expected: &str) -> Option<String> {
    let (number, text, expected) = (number.trim(), text.trim(), expected.trim());
    if text.is_empty() {
        return None;
    }
    let mut line = if number.is_empty() {
        text.to_string()
    } else {
        format!("Step {number}: {text}")
    };
    if !expected.is_empty() {
        line.push_str(" → Expected: ");
        line.push_str(expected);
    }
    Some(line)
}

/// Formats step rows using a column mapping.
#[derive(Debug, Clone, Copy)]
pub struct StepFormatter<'a> {
    columns: &'a ColumnMap,
}

impl<'a> StepFormatter<'a> {
    /// Builds a formatter over the given column names.
    pub fn new(columns: &'a ColumnMap) -> Self {
        Self { columns }
    }

    /// Renders a single row, skipping it when it has no step text.
    pub fn format_row(&self, row: &RawRow) -> Option<String> {
        let cell = |column: &str| row.get(column).unwrap_or("");
        format_step(
            cell(&self.columns.step_number),
            cell(&self.columns.step_text),
            cell(&self.columns.expected_result),
        )
    }

    /// Joins every non-empty step in row order; empty when no row has step text.
    pub fn format(&self, rows: &[RawRow]) -> String {
        rows.iter()
            .filter_map(|row| self.format_row(row))
            .collect::<Vec<_>>()
            .join(STEP_SEPARATOR)
    }
}
