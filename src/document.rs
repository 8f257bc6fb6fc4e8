//! Persisted test case record and its assembly from per-group results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::embeddings::EmbeddingSet;
use crate::enrichment::EnrichmentResult;
use crate::extract::ExtractedMetadata;

/// One stored test case. Field names follow the stored record layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseDocument {
    /// Caller-generated unique identifier.
    #[serde(rename = "_id")]
    pub id: Uuid,
    /// Test case identifier from the sheet.
    #[serde(rename = "Test Case ID")]
    pub test_case_id: String,
    /// Feature under test.
    #[serde(rename = "Feature")]
    pub feature: String,
    /// Test case description.
    #[serde(rename = "Test Case Description")]
    pub description: String,
    /// Prerequisites.
    #[serde(rename = "Pre-requisites")]
    pub prerequisites: String,
    /// Formatted step block.
    #[serde(rename = "Steps")]
    pub steps: String,
    /// Enrichment summary.
    #[serde(rename = "TestCaseSummary")]
    pub summary: String,
    /// Enrichment keywords.
    #[serde(rename = "TestCaseKeywords")]
    pub keywords: Vec<String>,
    /// Description embedding.
    #[serde(rename = "desc_embedding")]
    pub desc_embedding: Vec<f32>,
    /// Steps embedding.
    #[serde(rename = "steps_embedding")]
    pub steps_embedding: Vec<f32>,
    /// Summary embedding.
    #[serde(rename = "summary_embedding")]
    pub summary_embedding: Vec<f32>,
    /// Composite embedding.
    #[serde(rename = "main_vector")]
    pub main_vector: Vec<f32>,
    /// Tags.
    #[serde(rename = "Tags")]
    pub tags: Vec<String>,
    /// Priority label.
    #[serde(rename = "Priority")]
    pub priority: Option<String>,
    /// Platform label.
    #[serde(rename = "Platform")]
    pub platform: Option<String>,
    /// Capture time.
    #[serde(rename = "CreatedAt")]
    pub created_at: DateTime<Utc>,
    /// Ranking signal; starts at zero.
    #[serde(rename = "Popularity")]
    pub popularity: f64,
}

/// Everything computed for one group before assembly.
#[derive(Debug, Clone, Default)]
pub struct DocumentParts {
    /// Test case identifier.
    pub test_case_id: String,
    /// First-row metadata.
    pub metadata: ExtractedMetadata,
    /// Formatted step block.
    pub steps: String,
    /// Enrichment output (possibly defaulted).
    pub enrichment: EnrichmentResult,
    /// Embedding output (possibly empty).
    pub embeddings: EmbeddingSet,
}

/// Reasons a group's document is discarded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblyError {
    /// The identifier is blank.
    #[error("test case identifier is blank")]
    BlankIdentifier,
    /// A vector holds NaN or infinity and cannot be stored.
    #[error("{field} contains a non-finite value at position {position}")]
    NonFiniteVector {
        /// Name of the offending vector field.
        field: &'static str,
        /// Index of the first bad component.
        position: usize,
    },
}

/// Builds `TestCaseDocument` values.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentAssembler;

impl DocumentAssembler {
    /// Assembles a document stamped with a fresh id and the current time.
    pub fn assemble(&self, parts: DocumentParts) -> Result<TestCaseDocument, AssemblyError> {
        self.assemble_at(parts, Uuid::new_v4(), Utc::now())
    }

    /// Assembles a document with an explicit id and timestamp.
    pub fn assemble_at(
        &self,
        parts: DocumentParts,
        id: Uuid,
        created_at: DateTime<Utc>,
    ) -> Result<TestCaseDocument, AssemblyError> {
        if parts.test_case_id.trim().is_empty() {
            return Err(AssemblyError::BlankIdentifier);
        }
        const FIELDS: [&str; 4] = [
            "desc_embedding",
            "steps_embedding",
            "summary_embedding",
            "main_vector",
        ];
        for (field, vector) in FIELDS.into_iter().zip(parts.embeddings.vectors()) {
            if let Some(position) = vector.iter().position(|v| !v.is_finite()) {
                return Err(AssemblyError::NonFiniteVector { field, position });
            }
        }

        let DocumentParts {
            test_case_id,
            metadata,
            steps,
            enrichment,
            embeddings,
        } = parts;
        Ok(TestCaseDocument {
            id,
            test_case_id,
            feature: metadata.feature,
            description: metadata.description,
            prerequisites: metadata.prerequisites,
            steps,
            summary: enrichment.summary,
            keywords: enrichment.keywords,
            desc_embedding: embeddings.description,
            steps_embedding: embeddings.steps,
            summary_embedding: embeddings.summary,
            main_vector: embeddings.main,
            tags: metadata.tags,
            priority: metadata.priority,
            platform: metadata.platform,
            created_at,
            popularity: 0.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parts() -> DocumentParts {
        DocumentParts {
            test_case_id: "TC-7".to_string(),
            metadata: ExtractedMetadata {
                feature: "Cart".to_string(),
                description: "Adds an item".to_string(),
                prerequisites: String::new(),
                tags: vec!["cart".to_string()],
                priority: Some("P1".to_string()),
                platform: None,
            },
            steps: "Step 1: Add item".to_string(),
            enrichment: EnrichmentResult {
                summary: "Adds an item to the cart.".to_string(),
                keywords: vec!["cart".to_string()],
            },
            embeddings: EmbeddingSet {
                description: vec![1.0],
                steps: vec![0.0],
                summary: Vec::new(),
                main: vec![1.0],
            },
        }
    }

    #[test]
    fn assembles_all_fields() {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let doc = DocumentAssembler
            .assemble_at(parts(), id, now)
            .expect("assemble");
        assert_eq!(doc.id, id);
        assert_eq!(doc.test_case_id, "TC-7");
        assert_eq!(doc.feature, "Cart");
        assert_eq!(doc.steps, "Step 1: Add item");
        assert_eq!(doc.summary, "Adds an item to the cart.");
        assert_eq!(doc.desc_embedding, vec![1.0]);
        assert!(doc.summary_embedding.is_empty());
        assert_eq!(doc.priority.as_deref(), Some("P1"));
        assert_eq!(doc.platform, None);
        assert_eq!(doc.created_at, now);
        assert_eq!(doc.popularity, 0.0);
    }

    #[test]
    fn fresh_ids_are_unique() {
        let a = DocumentAssembler.assemble(parts()).expect("a");
        let b = DocumentAssembler.assemble(parts()).expect("b");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn rejects_blank_identifier() {
        let mut bad = parts();
        bad.test_case_id = "  ".to_string();
        assert_eq!(
            DocumentAssembler.assemble(bad),
            Err(AssemblyError::BlankIdentifier)
        );
    }

    #[test]
    fn rejects_non_finite_vectors() {
        let mut bad = parts();
        bad.embeddings.steps = vec![0.1, f32::NAN];
        assert_eq!(
            DocumentAssembler.assemble(bad),
            Err(AssemblyError::NonFiniteVector {
                field: "steps_embedding",
                position: 1,
            })
        );
    }

    #[test]
    fn serializes_with_stored_field_names() {
        let doc = DocumentAssembler.assemble(parts()).expect("assemble");
        let value = serde_json::to_value(&doc).expect("json");
        for key in [
            "_id",
            "Test Case ID",
            "Feature",
            "Test Case Description",
            "Pre-requisites",
            "Steps",
            "TestCaseSummary",
            "TestCaseKeywords",
            "desc_embedding",
            "steps_embedding",
            "summary_embedding",
            "main_vector",
            "Tags",
            "Priority",
            "Platform",
            "CreatedAt",
            "Popularity",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["Platform"], serde_json::Value::Null);
    }
}
