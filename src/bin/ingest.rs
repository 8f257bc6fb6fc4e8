use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use fastcase::embedder::{OpenAiEmbedder, QdrantEmbedder};
use fastcase::{
    persist, ColumnArgs, DocumentBatch, EmbeddingClient, EnrichmentClient, IngestError,
    IngestPipeline, IngestReport, JsonlStore, MemoryStore, MultiVectorEmbedder, NoEmbeddings,
    NoEnrichment, OpenAiEnricher, PgTestCaseStore, TableName, TextEmbedder,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "fastcase-ingest",
    about = "Ingest a CSV/XLSX test case sheet into enriched, embedded documents"
)]
struct IngestCli {
    /// CSV or XLSX file to ingest
    #[arg(long, short = 'i')]
    input: PathBuf,

    #[command(flatten)]
    columns: ColumnArgs,

    /// Where assembled documents are stored
    #[arg(long, value_enum, env = "FASTCASE_SINK", default_value = "jsonl")]
    sink: Sink,

    /// Output path for the jsonl sink
    #[arg(long, env = "FASTCASE_OUTPUT", default_value = "testcases.jsonl")]
    output: PathBuf,

    /// Postgres connection string (postgres://...) for the pgvector sink
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Target schema for the test case table
    #[arg(long, env = "FASTCASE_PGVECTOR_SCHEMA", default_value = "public")]
    schema: String,

    /// Target table name inside the schema
    #[arg(long, env = "FASTCASE_PGVECTOR_TABLE", default_value = "test_cases")]
    table: String,

    /// Create the vector extension/table automatically if missing
    #[arg(long, env = "FASTCASE_PGVECTOR_PREPARE", default_value_t = true)]
    prepare_table: bool,

    /// Skip summary/keyword generation
    #[arg(long, env = "FASTCASE_SKIP_ENRICHMENT", default_value_t = false)]
    skip_enrichment: bool,

    /// Skip vector generation; documents carry empty vectors
    #[arg(long, env = "FASTCASE_SKIP_EMBEDDINGS", default_value_t = false)]
    skip_embeddings: bool,

    /// OpenAI API key used for enrichment and OpenAI embeddings
    #[arg(long, env = "OPENAI_API_KEY")]
    openai_api_key: Option<String>,

    /// Base URL for OpenAI-compatible APIs
    #[arg(
        long,
        env = "OPENAI_BASE_URL",
        default_value = "https://api.openai.com/v1"
    )]
    openai_base_url: String,

    /// Chat model used to summarize test cases
    #[arg(long, env = "FASTCASE_ENRICHMENT_MODEL", default_value = "gpt-4o-mini")]
    enrichment_model: String,

    /// Sampling temperature for enrichment
    #[arg(long, env = "FASTCASE_ENRICHMENT_TEMPERATURE", default_value_t = 0.2)]
    enrichment_temperature: f32,

    /// Maximum completion tokens for enrichment
    #[arg(long, env = "FASTCASE_ENRICHMENT_MAX_TOKENS", default_value_t = 400)]
    enrichment_max_tokens: usize,

    /// Embedding backend
    #[arg(
        long,
        value_enum,
        env = "FASTCASE_EMBEDDING_PROVIDER",
        default_value = "openai"
    )]
    embedding_provider: EmbeddingProvider,

    /// Embedding model for the OpenAI provider
    #[arg(
        long,
        env = "FASTCASE_OPENAI_EMBEDDING_MODEL",
        default_value = "text-embedding-3-small"
    )]
    openai_embedding_model: String,

    /// Optional output dimensions for OpenAI embeddings
    #[arg(long, env = "FASTCASE_OPENAI_DIMENSIONS")]
    openai_dimensions: Option<usize>,

    /// Qdrant cloud inference API key
    #[arg(long, env = "QDRANT_API_KEY")]
    qdrant_api_key: Option<String>,

    /// Qdrant cloud inference endpoint
    #[arg(long, env = "QDRANT_INFERENCE_ENDPOINT")]
    qdrant_endpoint: Option<String>,

    /// Embedding model served by Qdrant inference
    #[arg(
        long,
        env = "QDRANT_EMBEDDING_MODEL",
        default_value = "sentence-transformers/all-minilm-l6-v2"
    )]
    qdrant_model: String,

    /// Per-request timeout for remote services; waits indefinitely when unset
    #[arg(long, env = "FASTCASE_REQUEST_TIMEOUT_SECS")]
    request_timeout_secs: Option<u64>,

    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Sink {
    Pgvector,
    Jsonl,
    /// Build and report without storing anything.
    #[value(name = "none")]
    Discard,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum EmbeddingProvider {
    Openai,
    Qdrant,
}

fn main() -> Result<()> {
    let cli = IngestCli::parse();
    init_tracing(cli.verbose);

    let bytes = std::fs::read(&cli.input)
        .with_context(|| format!("failed to read input {:?}", cli.input))?;
    let file_name = cli
        .input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let timeout = cli.request_timeout_secs.map(Duration::from_secs);
    let enricher = build_enricher(&cli, timeout)?;
    let embedder = build_embedder(&cli, timeout)?;
    let pipeline = IngestPipeline::new(cli.columns.build_config(), enricher, embedder);

    let batch = pipeline
        .build_upload(&file_name, &bytes)
        .map_err(report_failure)?;

    // Collaborators above use blocking HTTP clients; the runtime only drives the store.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    let report = runtime.block_on(store_batch(&cli, batch))?;

    if cli.sink == Sink::Discard {
        println!("{}", report.dry_run_message());
    } else {
        println!("{}", report.message());
    }
    if !report.skipped.is_empty() {
        println!("Skipped test cases: {}", report.skipped.join(", "));
    }
    if !report.degraded.is_empty() {
        info!(
            degraded = report.degraded.len(),
            "some test cases were stored without enrichment or embeddings"
        );
    }
    Ok(())
}

async fn store_batch(cli: &IngestCli, batch: DocumentBatch) -> Result<IngestReport> {
    let report = match cli.sink {
        Sink::Pgvector => {
            let database_url = cli
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow!("--database-url is required for the pgvector sink"))?;
            let table = TableName::new(cli.schema.clone(), cli.table.clone())?;
            let store = PgTestCaseStore::connect(database_url, table, cli.prepare_table)
                .await
                .map_err(|err| report_failure(IngestError::from(err)))?;
            persist(batch, &store).await
        }
        Sink::Jsonl => persist(batch, &JsonlStore::new(cli.output.clone())).await,
        Sink::Discard => persist(batch, &MemoryStore::new()).await,
    };
    report.map_err(report_failure)
}

fn build_enricher(
    cli: &IngestCli,
    timeout: Option<Duration>,
) -> Result<Box<dyn EnrichmentClient>> {
    if cli.skip_enrichment {
        return Ok(Box::new(NoEnrichment));
    }
    let api_key = cli
        .openai_api_key
        .clone()
        .ok_or_else(|| anyhow!("--openai-api-key is required unless --skip-enrichment is set"))?;
    let enricher = OpenAiEnricher::new(
        api_key,
        cli.openai_base_url.clone(),
        cli.enrichment_model.clone(),
        cli.enrichment_temperature,
        cli.enrichment_max_tokens,
        timeout,
    )?;
    Ok(Box::new(enricher))
}

fn build_embedder(cli: &IngestCli, timeout: Option<Duration>) -> Result<Box<dyn EmbeddingClient>> {
    if cli.skip_embeddings {
        return Ok(Box::new(NoEmbeddings));
    }
    let text: Box<dyn TextEmbedder> = match cli.embedding_provider {
        EmbeddingProvider::Openai => {
            let api_key = cli.openai_api_key.clone().ok_or_else(|| {
                anyhow!("--openai-api-key is required for the openai embedding provider")
            })?;
            Box::new(OpenAiEmbedder::new(
                api_key,
                cli.openai_base_url.clone(),
                cli.openai_embedding_model.clone(),
                cli.openai_dimensions,
                timeout,
            )?)
        }
        EmbeddingProvider::Qdrant => {
            let api_key = cli
                .qdrant_api_key
                .clone()
                .ok_or_else(|| anyhow!("--qdrant-api-key is required for the qdrant provider"))?;
            let endpoint = cli
                .qdrant_endpoint
                .clone()
                .ok_or_else(|| anyhow!("--qdrant-endpoint is required for the qdrant provider"))?;
            Box::new(QdrantEmbedder::new(
                api_key,
                endpoint,
                cli.qdrant_model.clone(),
                timeout,
            )?)
        }
    };
    Ok(Box::new(MultiVectorEmbedder::new(text)))
}

fn report_failure(err: IngestError) -> anyhow::Error {
    error!(kind = %err.kind(), error = %err, "ingest request failed");
    anyhow::Error::new(err)
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
