//! Upload-to-documents orchestration with per-field, per-row and per-group failure isolation.
//!
//! Request-level problems (bad file, missing identifier column, grouping or store
//! failure) abort with an [`IngestError`]. Everything below that degrades locally:
//! enrichment and embedding failures leave empty results, assembly failures drop
//! only the affected test case.

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::IngestConfig;
use crate::decode::{self, FileKind, RawTable};
use crate::document::{DocumentAssembler, DocumentParts, TestCaseDocument};
use crate::embeddings::{EmbeddingClient, EmbeddingSet};
use crate::enrichment::{EnrichmentClient, EnrichmentResult};
use crate::error::IngestError;
use crate::extract::FieldExtractor;
use crate::rows::{self, RowNormalizer, TestCaseGroup};
use crate::steps::StepFormatter;
use crate::store::BulkPersister;

/// Sub-step of a test case that fell back to its default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradedStage {
    /// Summary and keywords are empty.
    Enrichment,
    /// All four vectors are empty.
    Embedding,
}

/// One degraded sub-step, kept for the caller-facing report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Degradation {
    /// Affected test case.
    pub test_case_id: String,
    /// Which sub-step degraded.
    pub stage: DegradedStage,
    /// Collaborator error text.
    pub reason: String,
}

/// Documents assembled from one upload, ready for the batch store.
#[derive(Debug, Clone, Default)]
pub struct DocumentBatch {
    /// Assembled documents in first-seen group order.
    pub documents: Vec<TestCaseDocument>,
    /// Number of test case groups found.
    pub groups: usize,
    /// Identifiers whose document was dropped at assembly.
    pub skipped: Vec<String>,
    /// Sub-steps that fell back to defaults.
    pub degraded: Vec<Degradation>,
}

/// Outcome reported to the caller after a successful request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Number of test case groups found.
    pub groups: usize,
    /// Documents assembled and handed to the store.
    pub documents: usize,
    /// Documents the store reported as written.
    pub stored: usize,
    /// Identifiers whose document was dropped at assembly.
    pub skipped: Vec<String>,
    /// Sub-steps that fell back to defaults.
    pub degraded: Vec<Degradation>,
}

impl IngestReport {
    /// Human-readable outcome line. The empty-file message depends on whether any
    /// document was built, not on what the store reported.
    pub fn message(&self) -> String {
        if self.documents == 0 {
            "No valid test cases found to process in the file.".to_string()
        } else {
            format!(
                "Successfully processed and stored {} test cases.",
                self.stored
            )
        }
    }

    /// Outcome line for a run whose sink discards documents.
    pub fn dry_run_message(&self) -> String {
        if self.documents == 0 {
            "No valid test cases found to process in the file.".to_string()
        } else {
            format!(
                "Dry run: processed {} test cases; nothing was stored.",
                self.documents
            )
        }
    }
}

/// Turns uploads into test case documents using the given collaborators.
pub struct IngestPipeline<E, M> {
    config: IngestConfig,
    normalizer: RowNormalizer,
    enricher: E,
    embedder: M,
    assembler: DocumentAssembler,
}

impl<E, M> IngestPipeline<E, M>
where
    E: EnrichmentClient,
    M: EmbeddingClient,
{
    /// Builds a pipeline.
    pub fn new(config: IngestConfig, enricher: E, embedder: M) -> Self {
        let normalizer = RowNormalizer::new(config.null_markers().to_vec());
        Self {
            config,
            normalizer,
            enricher,
            embedder,
            assembler: DocumentAssembler,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Validates the file type and decodes the upload into a table.
    pub fn decode_upload(&self, file_name: &str, bytes: &[u8]) -> Result<RawTable, IngestError> {
        let kind =
            FileKind::from_file_name(file_name).ok_or_else(|| IngestError::InvalidFileType {
                file_name: file_name.to_string(),
            })?;
        decode::decode(kind, bytes).map_err(|err| {
            error!(file = file_name, error = %err, "file parse failed");
            IngestError::Unparsable(err)
        })
    }

    /// Splits a table into test case groups: normalize, forward fill, filter, group.
    pub fn group(&self, table: &RawTable) -> Result<Vec<TestCaseGroup>, IngestError> {
        let id_column = self.config.columns().id.as_str();
        if !table.has_column(id_column) {
            return Err(IngestError::MissingIdColumn {
                column: id_column.to_string(),
            });
        }
        let normalized = self.normalizer.normalize(table);
        let resolved = rows::fill_and_filter(normalized, id_column);
        rows::group_test_cases(resolved, id_column).map_err(|row| {
            error!(row, "failed to group rows by test case id");
            IngestError::Grouping { row }
        })
    }

    /// Builds one document per test case. Groups are processed sequentially in
    /// first-seen order.
    pub fn build(&self, table: &RawTable) -> Result<DocumentBatch, IngestError> {
        let groups = self.group(table)?;
        info!("processing {} unique test cases...", groups.len());
        let mut batch = DocumentBatch {
            groups: groups.len(),
            ..DocumentBatch::default()
        };
        for group in &groups {
            self.process_group(group, &mut batch);
        }
        Ok(batch)
    }

    /// Decodes and builds in one step.
    pub fn build_upload(&self, file_name: &str, bytes: &[u8]) -> Result<DocumentBatch, IngestError> {
        let table = self.decode_upload(file_name, bytes)?;
        self.build(&table)
    }

    fn process_group(&self, group: &TestCaseGroup, batch: &mut DocumentBatch) {
        let columns = self.config.columns();
        let metadata = FieldExtractor::new(columns).extract(group);
        let steps = StepFormatter::new(columns).format(&group.rows);

        let enrichment = match self
            .enricher
            .enrich(&metadata.description, &metadata.feature, &steps)
        {
            Ok(result) => result,
            Err(err) => {
                warn!(test_case_id = %group.id, error = %err, "enrichment failed; continuing without summary");
                batch.degraded.push(Degradation {
                    test_case_id: group.id.clone(),
                    stage: DegradedStage::Enrichment,
                    reason: err.to_string(),
                });
                EnrichmentResult::default()
            }
        };

        let embeddings = match self
            .embedder
            .embed(&metadata.description, &steps, &enrichment.summary)
        {
            Ok(set) => set,
            Err(err) => {
                warn!(test_case_id = %group.id, error = %err, "embedding failed; storing empty vectors");
                batch.degraded.push(Degradation {
                    test_case_id: group.id.clone(),
                    stage: DegradedStage::Embedding,
                    reason: err.to_string(),
                });
                EmbeddingSet::default()
            }
        };

        let parts = DocumentParts {
            test_case_id: group.id.clone(),
            metadata,
            steps,
            enrichment,
            embeddings,
        };
        match self.assembler.assemble(parts) {
            Ok(document) => {
                debug!(
                    test_case_id = %group.id,
                    rows = group.rows.len(),
                    "assembled test case document"
                );
                batch.documents.push(document);
            }
            Err(err) => {
                warn!(test_case_id = %group.id, error = %err, "dropping test case; assembly failed");
                batch.skipped.push(group.id.clone());
            }
        }
    }
}

/// Stores a built batch in one operation.
///
/// An empty batch never reaches the store and reports zero stored.
pub async fn persist<S: BulkPersister>(
    batch: DocumentBatch,
    store: &S,
) -> Result<IngestReport, IngestError> {
    let DocumentBatch {
        documents,
        groups,
        skipped,
        degraded,
    } = batch;
    let document_count = documents.len();
    let stored = if documents.is_empty() {
        info!("no valid test cases found; nothing to store");
        0
    } else {
        let stored = store.insert_many(&documents).await.map_err(|err| {
            error!(error = %err, "batch store failed");
            IngestError::from(err)
        })?;
        info!("inserted {} test cases.", stored);
        stored
    };
    Ok(IngestReport {
        groups,
        documents: document_count,
        stored,
        skipped,
        degraded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::NoEmbeddings;
    use crate::enrichment::NoEnrichment;
    use crate::error::ErrorKind;
    use crate::store::{MemoryStore, StoreError};
    use anyhow::anyhow;
    use pretty_assertions::assert_eq;
    use std::future::Future;

    struct FailingEnricher;

    impl EnrichmentClient for FailingEnricher {
        fn enrich(&self, _: &str, _: &str, _: &str) -> anyhow::Result<EnrichmentResult> {
            Err(anyhow!("enrichment service unavailable"))
        }
    }

    /// Accepts every batch and reports nothing written, like an upsert that hit
    /// only existing rows.
    struct SilentStore;

    impl BulkPersister for SilentStore {
        fn insert_many(
            &self,
            _: &[TestCaseDocument],
        ) -> impl Future<Output = Result<usize, StoreError>> + Send {
            async { Ok(0) }
        }
    }

    struct NanEmbedder;

    impl EmbeddingClient for NanEmbedder {
        fn embed(&self, _: &str, _: &str, _: &str) -> anyhow::Result<EmbeddingSet> {
            Ok(EmbeddingSet {
                main: vec![f32::NAN],
                ..EmbeddingSet::default()
            })
        }
    }

    fn table(columns: &[&str], records: &[&[&str]]) -> RawTable {
        RawTable::new(
            columns.iter().map(|c| c.to_string()).collect(),
            records
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    fn pipeline() -> IngestPipeline<NoEnrichment, NoEmbeddings> {
        IngestPipeline::new(IngestConfig::default(), NoEnrichment, NoEmbeddings)
    }

    #[test]
    fn rejects_unknown_file_type() {
        let err = pipeline()
            .decode_upload("cases.txt", b"Test Case ID\nTC-1\n")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadInput);
        assert!(matches!(err, IngestError::InvalidFileType { .. }));
    }

    #[test]
    fn missing_id_column_fails_before_grouping() {
        let input = table(&["Feature", "Test Step"], &[&["Login", "Open app"]]);
        let err = pipeline().build(&input).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadInput);
        assert_eq!(err.to_string(), "CSV/XLSX must contain 'Test Case ID' column.");
    }

    #[test]
    fn nan_ids_are_blank_and_forward_filled() {
        let input = table(
            &["Test Case ID", "Test Step"],
            &[&["TC-1", "Open app"], &["nan", "Log in"], &["NA", "Skip me"]],
        );
        let groups = pipeline().group(&input).expect("group");
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].rows.len(), 2);
    }

    #[test]
    fn enrichment_failure_keeps_the_document() {
        let pipeline = IngestPipeline::new(IngestConfig::default(), FailingEnricher, NoEmbeddings);
        let input = table(
            &["Test Case ID", "Feature", "Test Step"],
            &[&["TC-1", "Login", "Open app"]],
        );
        let batch = pipeline.build(&input).expect("build");
        assert_eq!(batch.documents.len(), 1);
        let doc = &batch.documents[0];
        assert_eq!(doc.test_case_id, "TC-1");
        assert_eq!(doc.feature, "Login");
        assert_eq!(doc.steps, "Open app");
        assert_eq!(doc.summary, "");
        assert!(doc.keywords.is_empty());
        assert_eq!(batch.degraded.len(), 1);
        assert_eq!(batch.degraded[0].stage, DegradedStage::Enrichment);
    }

    #[test]
    fn assembly_failure_drops_only_that_group() {
        let pipeline = IngestPipeline::new(IngestConfig::default(), NoEnrichment, NanEmbedder);
        let input = table(&["Test Case ID", "Test Step"], &[&["TC-1", "Open app"]]);
        let batch = pipeline.build(&input).expect("build");
        assert!(batch.documents.is_empty());
        assert_eq!(batch.groups, 1);
        assert_eq!(batch.skipped, vec!["TC-1"]);
    }

    #[tokio::test]
    async fn empty_batch_never_reaches_the_store() {
        let input = table(&["Test Case ID", "Test Step"], &[&["", "orphan"], &["NA", "x"]]);
        let batch = pipeline().build(&input).expect("build");
        let store = MemoryStore::failing("must not be called");
        let report = persist(batch, &store).await.expect("persist");
        assert_eq!(report.stored, 0);
        assert_eq!(report.groups, 0);
        assert_eq!(report.message(), "No valid test cases found to process in the file.");
        assert_eq!(store.batch_count(), 0);
    }

    #[tokio::test]
    async fn store_failure_is_classified() {
        let input = table(&["Test Case ID", "Test Step"], &[&["TC-1", "Open app"]]);
        let batch = pipeline().build(&input).expect("build");
        let store = MemoryStore::failing("connection reset");
        let err = persist(batch, &store).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert!(store.documents().is_empty());
    }

    #[test]
    fn report_message_counts_stored_documents() {
        let report = IngestReport {
            groups: 3,
            documents: 2,
            stored: 2,
            skipped: vec!["TC-9".to_string()],
            degraded: Vec::new(),
        };
        assert_eq!(
            report.message(),
            "Successfully processed and stored 2 test cases."
        );
    }

    #[tokio::test]
    async fn non_empty_batch_is_not_reported_as_empty_file() {
        let input = table(&["Test Case ID", "Test Step"], &[&["TC-1", "Open app"]]);
        let batch = pipeline().build(&input).expect("build");
        let report = persist(batch, &SilentStore).await.expect("persist");
        assert_eq!(report.documents, 1);
        assert_eq!(report.stored, 0);
        assert_eq!(
            report.message(),
            "Successfully processed and stored 0 test cases."
        );
    }

    #[tokio::test]
    async fn dry_run_message_counts_built_documents() {
        let input = table(
            &["Test Case ID", "Test Step"],
            &[&["TC-1", "Open app"], &["TC-2", "Close app"]],
        );
        let batch = pipeline().build(&input).expect("build");
        let report = persist(batch, &MemoryStore::new()).await.expect("persist");
        assert_eq!(
            report.dry_run_message(),
            "Dry run: processed 2 test cases; nothing was stored."
        );

        let empty = IngestReport {
            groups: 0,
            documents: 0,
            stored: 0,
            skipped: Vec::new(),
            degraded: Vec::new(),
        };
        assert_eq!(
            empty.dry_run_message(),
            "No valid test cases found to process in the file."
        );
    }
}
