//! Table ingestion: format, chunk, and upsert into the vector index.
//!
//! Each data file is paired with a column metadata file of the same stem.
//! A manifest of content digests lets repeated runs skip tables that have not
//! changed since they were last ingested.

use crate::chunker::chunk_text;
use crate::format::format_document;
use crate::table::{load_metadata, load_table, ColumnMetadata, RecordTable};
use crate::vector_index::{ChunkMetadata, VectorIndex, TABLE_CONTENT_TYPE};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tabula_core::{AppError, AppResult};
use walkdir::WalkDir;

const METADATA_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// Chunks of one table, ready for upsert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestBatch {
    pub ids: Vec<String>,
    pub documents: Vec<String>,
    pub metadatas: Vec<ChunkMetadata>,
}

impl IngestBatch {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// A data file and the metadata file that describes its columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSource {
    pub data_path: PathBuf,
    pub metadata_path: PathBuf,
}

/// Options for an ingestion run.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Maximum characters per chunk
    pub chunk_size: usize,

    /// Maximum chunks per upsert call
    pub batch_size: usize,

    /// Re-ingest tables even when their content is unchanged
    pub force: bool,

    /// Clear the index and manifest before ingesting
    pub reset: bool,

    /// Manifest location; `None` disables change tracking
    pub manifest_path: Option<PathBuf>,
}

/// Summary of an ingestion run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestStats {
    /// Tables ingested
    pub tables: usize,

    /// Chunks upserted
    pub chunks: usize,

    /// Tables skipped (unchanged, or without metadata)
    pub skipped: usize,

    pub duration_secs: f64,
}

/// Format and chunk one table.
///
/// Chunk ids are `<file_name>_chunk_<i>`; every chunk is tagged with its
/// source and metadata file names.
pub fn prepare_table(
    file_name: &str,
    metadata_file_name: &str,
    table: &RecordTable,
    metadata: &ColumnMetadata,
    chunk_size: usize,
) -> IngestBatch {
    let document = format_document(table, metadata);
    let chunks = chunk_text(&document, chunk_size);

    let mut batch = IngestBatch::default();
    for (i, chunk) in chunks.into_iter().enumerate() {
        batch.ids.push(format!("{}_chunk_{}", file_name, i));
        batch.documents.push(chunk);
        batch.metadatas.push(ChunkMetadata {
            source: file_name.to_string(),
            chunk: i,
            content_type: TABLE_CONTENT_TYPE.to_string(),
            metadata_file: metadata_file_name.to_string(),
        });
    }

    tracing::debug!(
        "Prepared {} chunks from {} ({} rows)",
        batch.len(),
        file_name,
        table.rows().len()
    );

    batch
}

/// Upsert a batch in slices of at most `batch_size` chunks.
///
/// Returns the number of chunks written.
pub async fn insert_batches(
    index: &dyn VectorIndex,
    batch: &IngestBatch,
    batch_size: usize,
) -> AppResult<usize> {
    if batch_size == 0 {
        return Err(AppError::Config(
            "Batch size must be greater than zero".to_string(),
        ));
    }

    let mut written = 0;
    for start in (0..batch.len()).step_by(batch_size) {
        let end = (start + batch_size).min(batch.len());
        index
            .upsert(
                &batch.ids[start..end],
                &batch.documents[start..end],
                &batch.metadatas[start..end],
            )
            .await
            .map_err(|e| match e {
                AppError::Ingestion(_) | AppError::Config(_) => e,
                other => AppError::Ingestion(format!("Failed to insert chunks: {}", other)),
            })?;
        written += end - start;
    }

    Ok(written)
}

/// Pair every `*.json` data file with its metadata file.
///
/// Returns the pairs, sorted by data file name, and the data files that have
/// no metadata.
pub fn discover_tables(
    data_dir: &Path,
    metadata_dir: &Path,
) -> AppResult<(Vec<TableSource>, Vec<PathBuf>)> {
    if !data_dir.is_dir() {
        return Err(AppError::Ingestion(format!(
            "Data directory not found: {:?}",
            data_dir
        )));
    }

    let mut data_files: Vec<PathBuf> = WalkDir::new(data_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && p.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    data_files.sort();

    let mut sources = Vec::new();
    let mut missing = Vec::new();

    for data_path in data_files {
        let Some(stem) = data_path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        let metadata_path = METADATA_EXTENSIONS
            .iter()
            .map(|ext| metadata_dir.join(format!("{}.{}", stem, ext)))
            .find(|candidate| candidate.is_file() && *candidate != data_path);

        match metadata_path {
            Some(metadata_path) => sources.push(TableSource {
                data_path,
                metadata_path,
            }),
            None => {
                tracing::warn!("No metadata file found for {:?}", data_path);
                missing.push(data_path);
            }
        }
    }

    Ok((sources, missing))
}

/// Ingest every table in `data_dir` described in `metadata_dir`.
pub async fn ingest_directory(
    index: &dyn VectorIndex,
    data_dir: &Path,
    metadata_dir: &Path,
    options: &IngestOptions,
) -> AppResult<IngestStats> {
    let (sources, missing) = discover_tables(data_dir, metadata_dir)?;
    let mut stats = ingest_tables(index, &sources, options).await?;
    stats.skipped += missing.len();
    Ok(stats)
}

/// Ingest the given tables.
///
/// Each table is fully loaded and chunked before anything is written, so a
/// malformed file fails the run without touching its existing chunks. New
/// chunks replace old ones by id and only then are leftover ids of the table
/// removed, so a failed embedding keeps the previous chunks searchable.
/// Tables ingested before the failure stay ingested and recorded in the
/// manifest.
pub async fn ingest_tables(
    index: &dyn VectorIndex,
    sources: &[TableSource],
    options: &IngestOptions,
) -> AppResult<IngestStats> {
    let start = Instant::now();
    let mut stats = IngestStats::default();

    let mut manifest = match (&options.manifest_path, options.reset) {
        (Some(path), false) => IngestManifest::load(path),
        _ => IngestManifest::default(),
    };

    if options.reset {
        tracing::info!("Resetting vector index");
        index.reset().await?;
        if let Some(path) = &options.manifest_path {
            manifest.save(path)?;
        }
    }

    for source in sources {
        let file_name = path_file_name(&source.data_path)?;
        let metadata_file_name = path_file_name(&source.metadata_path)?;

        let data = std::fs::read(&source.data_path).map_err(|e| {
            AppError::Ingestion(format!("Failed to read {:?}: {}", source.data_path, e))
        })?;
        let meta = std::fs::read(&source.metadata_path).map_err(|e| {
            AppError::Ingestion(format!("Failed to read {:?}: {}", source.metadata_path, e))
        })?;
        let digest = content_digest(&data, &meta);

        if !options.force && manifest.is_current(&file_name, &digest) {
            tracing::info!("Skipping unchanged table {}", file_name);
            stats.skipped += 1;
            continue;
        }

        let table = load_table(&source.data_path)?;
        let metadata = load_metadata(&source.metadata_path)?;
        let batch = prepare_table(
            &file_name,
            &metadata_file_name,
            &table,
            &metadata,
            options.chunk_size,
        );

        let written = insert_batches(index, &batch, options.batch_size).await?;

        let removed = index.remove_stale(&file_name, &batch.ids).await?;
        if removed > 0 {
            tracing::debug!("Removed {} stale chunks of {}", removed, file_name);
        }

        tracing::info!("Ingested {}: {} chunks", file_name, written);
        stats.tables += 1;
        stats.chunks += written;

        manifest.record(&file_name, digest, &metadata_file_name, written);
        if let Some(path) = &options.manifest_path {
            manifest.save(path)?;
        }
    }

    stats.duration_secs = start.elapsed().as_secs_f64();

    tracing::info!(
        "Ingestion completed: {} tables, {} chunks, {} skipped in {:.2}s",
        stats.tables,
        stats.chunks,
        stats.skipped,
        stats.duration_secs
    );

    Ok(stats)
}

fn path_file_name(path: &Path) -> AppResult<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| AppError::Ingestion(format!("Invalid file name: {:?}", path)))
}

/// SHA-256 over the data and metadata contents.
fn content_digest(data: &[u8], metadata: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.update([0u8]);
    hasher.update(metadata);
    format!("{:x}", hasher.finalize())
}

/// Record of what has been ingested, keyed by data file name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestManifest {
    #[serde(default)]
    pub files: BTreeMap<String, ManifestEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub digest: String,
    pub metadata_file: String,
    pub chunks: usize,
    pub ingested_at: DateTime<Utc>,
}

impl IngestManifest {
    /// Load the manifest; a missing or unreadable manifest starts empty.
    pub fn load(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(_) => return Self::default(),
        };

        serde_json::from_str(&contents).unwrap_or_else(|e| {
            tracing::warn!("Ignoring unreadable ingest manifest {:?}: {}", path, e);
            Self::default()
        })
    }

    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Persistence(format!("Failed to create {:?}: {}", parent, e))
            })?;
        }

        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| {
            AppError::Persistence(format!("Failed to write manifest {:?}: {}", path, e))
        })
    }

    pub fn is_current(&self, file_name: &str, digest: &str) -> bool {
        self.files
            .get(file_name)
            .map(|entry| entry.digest == digest)
            .unwrap_or(false)
    }

    pub fn record(&mut self, file_name: &str, digest: String, metadata_file: &str, chunks: usize) {
        self.files.insert(
            file_name.to_string(),
            ManifestEntry {
                digest,
                metadata_file: metadata_file.to_string(),
                chunks,
                ingested_at: Utc::now(),
            },
        );
    }
}
