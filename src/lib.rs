#![warn(missing_docs)]
//! Core library entry points for the fastcase test case ingestion pipeline.

pub mod config;
pub mod decode;
pub mod document;
pub mod embedder;
pub mod embeddings;
pub mod enrichment;
pub mod error;
pub mod extract;
mod http;
pub mod pipeline;
pub mod rows;
pub mod steps;
pub mod store;
pub mod vector_store;

pub use config::{ColumnArgs, ColumnMap, IngestConfig};
pub use decode::{DecodeError, FileKind, RawTable};
pub use document::{AssemblyError, DocumentAssembler, DocumentParts, TestCaseDocument};
pub use embedder::TextEmbedder;
pub use embeddings::{EmbeddingClient, EmbeddingSet, MultiVectorEmbedder, NoEmbeddings};
pub use enrichment::{EnrichmentClient, EnrichmentResult, NoEnrichment, OpenAiEnricher};
pub use error::{ErrorKind, IngestError};
pub use extract::{ExtractedMetadata, FieldExtractor};
pub use pipeline::{persist, DegradedStage, Degradation, DocumentBatch, IngestPipeline, IngestReport};
pub use rows::{RawRow, RowNormalizer, TestCaseGroup};
pub use steps::StepFormatter;
pub use store::{BulkPersister, JsonlStore, MemoryStore, PgTestCaseStore, StoreError};
pub use vector_store::TableName;
