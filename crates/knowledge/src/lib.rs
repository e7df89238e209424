//! Tabular knowledge base.
//!
//! Turns tables plus their column metadata into retrievable chunks stored in
//! a local SQLite vector index, and answers questions over them with a
//! grounded retrieval pipeline.

pub mod chunker;
pub mod embeddings;
pub mod format;
pub mod ingest;
pub mod rag;
pub mod sqlite_index;
pub mod table;
pub mod vector_index;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use chunker::chunk_text;
pub use embeddings::{create_provider, EmbeddingProvider};
pub use format::{format_document, METADATA_MARKER, RECORDS_MARKER};
pub use ingest::{
    discover_tables, ingest_directory, ingest_tables, insert_batches, prepare_table,
    IngestBatch, IngestManifest, IngestOptions, IngestStats, TableSource,
};
pub use rag::{
    ChatHistory, Explanation, QaLog, QaLogEntry, QueryType, RagAnswer, RagPipeline,
    RetrievalTrace, COMPLETION_FAILED_ANSWER, NO_DATA_ANSWER, QUERY_FAILED_ANSWER,
};
pub use sqlite_index::SqliteIndex;
pub use table::{
    load_metadata, load_table, normalize_column_name, ColumnInfo, ColumnMetadata, RecordTable,
};
pub use vector_index::{ChunkMetadata, QueryResult, VectorIndex};

use std::sync::Arc;
use tabula_core::{AppConfig, AppResult};
use tabula_llm::create_client;
use tabula_prompt::{load_prompt_or_default, DEFAULT_CHAT_PROMPT_ID};

/// Open the workspace vector index with the configured embedding provider.
pub fn open_index(config: &AppConfig) -> AppResult<SqliteIndex> {
    config.ensure_tabula_dir()?;

    let embedder = create_provider(&config.embedding)?;
    let index_path = config.index_path();

    tracing::debug!(
        "Opening vector index at {:?} ({}/{})",
        index_path,
        embedder.provider_name(),
        embedder.model_name()
    );

    SqliteIndex::open(&index_path, embedder)
}

/// Ingestion options drawn from the configuration.
pub fn ingest_options(config: &AppConfig, force: bool, reset: bool) -> IngestOptions {
    IngestOptions {
        chunk_size: config.rag.chunk_size,
        batch_size: config.rag.batch_size,
        force,
        reset,
        manifest_path: Some(config.manifest_path()),
    }
}

/// Build the retrieval pipeline for the workspace.
///
/// The completion client, chat prompt and QA log are constructed here once
/// and shared by every query the pipeline answers.
pub fn build_pipeline(config: &AppConfig, index: Arc<dyn VectorIndex>) -> AppResult<RagPipeline> {
    let api_key = config.resolve_api_key();
    let llm = create_client(&config.provider, config.endpoint.as_deref(), api_key.as_deref())?;
    let prompt = load_prompt_or_default(&config.prompts_dir(), DEFAULT_CHAT_PROMPT_ID)?;
    let qa_log = QaLog::new(config.qa_log_path());

    tracing::debug!(
        "Pipeline ready: provider={}, model={}, prompt={}",
        config.provider,
        config.model,
        prompt.id
    );

    Ok(
        RagPipeline::new(index, llm, config.model.clone(), config.rag.clone())
            .with_prompt(prompt)
            .with_qa_log(Arc::new(qa_log)),
    )
}
