//! Postgres identifiers for the pgvector test case table.

use crate::store::StoreError;

/// Schema-qualified table that receives test case rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    schema: String,
    table: String,
}

impl TableName {
    /// Validates a schema/table pair; blank names and names containing NUL are
    /// rejected.
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Result<Self, StoreError> {
        Ok(Self {
            schema: checked("schema", schema.into())?,
            table: checked("table", table.into())?,
        })
    }

    /// `"schema"."table"`, ready to splice into SQL.
    pub fn qualified(&self) -> String {
        [&self.schema, &self.table].map(|part| quote_ident(part)).join(".")
    }

    /// Index name derived from schema, table and `suffix`, e.g.
    /// `public_test_cases_search_tsv_idx`.
    pub fn index_name(&self, suffix: &str) -> String {
        [index_fragment(&self.schema), index_fragment(&self.table), suffix.to_string()].join("_")
    }
}

fn checked(kind: &str, name: String) -> Result<String, StoreError> {
    if name.trim().is_empty() {
        return Err(StoreError::Rejected(format!("{kind} name is required")));
    }
    if name.contains('\0') {
        return Err(StoreError::Rejected(format!("{kind} name contains NUL")));
    }
    Ok(name)
}

/// Wraps an identifier in double quotes, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push('"');
    for ch in name.chars() {
        if ch == '"' {
            quoted.push('"');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

// unquoted index names: lowercase ASCII alphanumerics, everything else '_'
fn index_fragment(name: &str) -> String {
    name.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() {
                ch.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}
