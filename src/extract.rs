//! Single-valued test case metadata read from the first row of a group.

use serde::{Deserialize, Serialize};

use crate::config::ColumnMap;
use crate::rows::TestCaseGroup;

/// Metadata shared by every row of a test case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedMetadata {
    /// Feature under test; empty when the column is missing.
    pub feature: String,
    /// Test case description; empty when the column is missing.
    pub description: String,
    /// Prerequisites; empty when the column is missing.
    pub prerequisites: String,
    /// Trimmed, non-empty tags in sheet order.
    pub tags: Vec<String>,
    /// Priority cell, absent when the sheet has no priority column.
    pub priority: Option<String>,
    /// Platform cell, absent when the sheet has no platform column.
    pub platform: Option<String>,
}

/// Reads `ExtractedMetadata` using a column mapping.
#[derive(Debug, Clone, Copy)]
pub struct FieldExtractor<'a> {
    columns: &'a ColumnMap,
}

impl<'a> FieldExtractor<'a> {
    /// Builds an extractor over the given column names.
    pub fn new(columns: &'a ColumnMap) -> Self {
        Self { columns }
    }

    /// Extracts metadata from the group's first row. Each field falls back to its
    /// default on its own.
    pub fn extract(&self, group: &TestCaseGroup) -> ExtractedMetadata {
        let Some(first) = group.first_row() else {
            return ExtractedMetadata::default();
        };
        let text = |column: &str| first.get(column).map(str::to_string).unwrap_or_default();
        ExtractedMetadata {
            feature: text(&self.columns.feature),
            description: text(&self.columns.description),
            prerequisites: text(&self.columns.prerequisites),
            tags: first
                .get(&self.columns.tags)
                .map(parse_tags)
                .unwrap_or_default(),
            priority: first.get(&self.columns.priority).map(str::to_string),
            platform: first.get(&self.columns.platform).map(str::to_string),
        }
    }
}

/// Splits a comma-separated tag cell, dropping blank fragments.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}
