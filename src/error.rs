//! Request-level failures surfaced to callers of the ingestion pipeline.

use std::fmt;

use thiserror::Error;

use crate::decode::DecodeError;
use crate::store::StoreError;

/// Coarse classification used to map failures onto caller-facing statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The upload itself is unusable (client error).
    BadInput,
    /// The pipeline failed while processing otherwise valid input.
    Processing,
    /// The final batch store failed.
    Storage,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadInput => write!(f, "bad_input"),
            Self::Processing => write!(f, "processing"),
            Self::Storage => write!(f, "storage"),
        }
    }
}

/// Fatal errors that abort a whole upload. Nothing is stored when one is returned.
#[derive(Debug, Error)]
pub enum IngestError {
    /// File extension is neither `.csv` nor `.xlsx`.
    #[error("Invalid file type. Please upload a CSV or XLSX file.")]
    InvalidFileType {
        /// Name of the rejected upload.
        file_name: String,
    },
    /// Bytes could not be decoded into a table.
    #[error("Parsing failed. Please check the file format.")]
    Unparsable(#[source] DecodeError),
    /// The identifier column is missing from the header row.
    #[error("CSV/XLSX must contain '{column}' column.")]
    MissingIdColumn {
        /// Configured identifier column name.
        column: String,
    },
    /// A row reached the grouper without a usable identifier.
    #[error("Failed grouping input file data (row {row} has no test case identifier).")]
    Grouping {
        /// Zero-based position of the offending row after filtering.
        row: usize,
    },
    /// The batch store rejected the documents.
    #[error("Error storing data: {0}")]
    Store(#[from] StoreError),
}

impl IngestError {
    /// Classification of this failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidFileType { .. } | Self::Unparsable(_) | Self::MissingIdColumn { .. } => {
                ErrorKind::BadInput
            }
            Self::Grouping { .. } => ErrorKind::Processing,
            Self::Store(_) => ErrorKind::Storage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_request_failures() {
        let missing = IngestError::MissingIdColumn {
            column: "Test Case ID".to_string(),
        };
        assert_eq!(missing.kind(), ErrorKind::BadInput);
        assert_eq!(
            missing.to_string(),
            "CSV/XLSX must contain 'Test Case ID' column."
        );

        let grouping = IngestError::Grouping { row: 3 };
        assert_eq!(grouping.kind(), ErrorKind::Processing);

        let store = IngestError::from(StoreError::Rejected("disk full".to_string()));
        assert_eq!(store.kind(), ErrorKind::Storage);
        assert!(store.to_string().contains("disk full"));
    }
}
