//! SQLite-backed vector index.
//!
//! Chunks are stored with their embedding as a little-endian `f32` blob and
//! searched by brute-force cosine similarity, which is plenty for the table
//! sizes a single workspace ingests.

use crate::embeddings::EmbeddingProvider;
use crate::vector_index::{ChunkMetadata, QueryResult, VectorIndex};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tabula_core::{AppError, AppResult};

/// Vector index persisted in a single SQLite file.
pub struct SqliteIndex {
    conn: Mutex<Connection>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl std::fmt::Debug for SqliteIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteIndex")
            .field("embedder", &self.embedder)
            .finish_non_exhaustive()
    }
}

impl SqliteIndex {
    /// Open (or create) the index at `db_path`.
    ///
    /// An index that already holds chunks embedded by a different model is
    /// rejected; its scores would be meaningless.
    pub fn open(db_path: &Path, embedder: Arc<dyn EmbeddingProvider>) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Retrieval(format!("Failed to create index directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::Retrieval(format!("Failed to open SQLite index: {}", e)))?;

        Self::with_connection(conn, embedder)
    }

    /// Open a throwaway in-memory index.
    pub fn in_memory(embedder: Arc<dyn EmbeddingProvider>) -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Retrieval(format!("Failed to open SQLite index: {}", e)))?;

        Self::with_connection(conn, embedder)
    }

    fn with_connection(conn: Connection, embedder: Arc<dyn EmbeddingProvider>) -> AppResult<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                source TEXT NOT NULL,
                document TEXT NOT NULL,
                metadata TEXT NOT NULL,
                embedding BLOB NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source);

            CREATE TABLE IF NOT EXISTS index_info (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| AppError::Retrieval(format!("Failed to create tables: {}", e)))?;

        let fingerprint = embedder_fingerprint(embedder.as_ref());
        let stored: Option<String> = conn
            .query_row(
                "SELECT value FROM index_info WHERE key = 'embedder'",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| AppError::Retrieval(format!("Failed to read index info: {}", e)))?;

        match stored {
            Some(stored) if stored != fingerprint => {
                return Err(AppError::Config(format!(
                    "Index was built with embedder '{}' but '{}' is configured. Run `tabula ingest --reset`.",
                    stored, fingerprint
                )));
            }
            Some(_) => {}
            None => {
                conn.execute(
                    "INSERT INTO index_info (key, value) VALUES ('embedder', ?1)",
                    params![fingerprint],
                )
                .map_err(|e| AppError::Retrieval(format!("Failed to write index info: {}", e)))?;
            }
        }

        tracing::debug!("Opened SQLite index with embedder {}", fingerprint);

        Ok(Self {
            conn: Mutex::new(conn),
            embedder,
        })
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Other("SQLite index lock poisoned".to_string()))
    }
}

fn embedder_fingerprint(embedder: &dyn EmbeddingProvider) -> String {
    format!(
        "{}/{}/{}",
        embedder.provider_name(),
        embedder.model_name(),
        embedder.dimensions()
    )
}

#[async_trait::async_trait]
impl VectorIndex for SqliteIndex {
    async fn upsert(
        &self,
        ids: &[String],
        documents: &[String],
        metadatas: &[ChunkMetadata],
    ) -> AppResult<()> {
        if ids.len() != documents.len() || ids.len() != metadatas.len() {
            return Err(AppError::Ingestion(format!(
                "Mismatched upsert lengths: {} ids, {} documents, {} metadatas",
                ids.len(),
                documents.len(),
                metadatas.len()
            )));
        }

        if ids.is_empty() {
            return Ok(());
        }

        let embeddings = self
            .embedder
            .embed_batch(documents)
            .await
            .map_err(|e| AppError::Ingestion(format!("Failed to embed chunks: {}", e)))?;

        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Ingestion(format!("Failed to start transaction: {}", e)))?;

        for (((id, document), metadata), embedding) in
            ids.iter().zip(documents).zip(metadatas).zip(&embeddings)
        {
            let metadata_json = serde_json::to_string(metadata)?;
            tx.execute(
                "INSERT OR REPLACE INTO chunks (id, source, document, metadata, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id,
                    metadata.source,
                    document,
                    metadata_json,
                    embedding_to_bytes(embedding)
                ],
            )
            .map_err(|e| AppError::Ingestion(format!("Failed to insert chunk {}: {}", id, e)))?;
        }

        tx.commit()
            .map_err(|e| AppError::Ingestion(format!("Failed to commit chunks: {}", e)))?;

        tracing::debug!("Upserted {} chunks", ids.len());
        Ok(())
    }

    async fn query(&self, text: &str, k: usize) -> AppResult<QueryResult> {
        let query_embedding = self.embedder.embed(text).await?;

        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT document, metadata, embedding FROM chunks")
            .map_err(|e| AppError::Retrieval(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                ))
            })
            .map_err(|e| AppError::Retrieval(format!("Failed to query chunks: {}", e)))?;

        let mut scored: Vec<(String, ChunkMetadata, f32)> = Vec::new();
        for row in rows {
            let (document, metadata_json, embedding_bytes) =
                row.map_err(|e| AppError::Retrieval(format!("Failed to read chunk: {}", e)))?;

            let metadata: ChunkMetadata = serde_json::from_str(&metadata_json)
                .map_err(|e| AppError::Retrieval(format!("Corrupt chunk metadata: {}", e)))?;
            let embedding = bytes_to_embedding(&embedding_bytes)?;

            let score = cosine_similarity(&query_embedding, &embedding);
            scored.push((document, metadata, score));
        }

        scored.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        tracing::debug!(
            "Retrieved {} chunks (requested top-{})",
            scored.len(),
            k
        );

        let mut result = QueryResult::default();
        for (document, metadata, score) in scored {
            result.documents.push(document);
            result.metadatas.push(metadata);
            result.scores.push(score);
        }
        Ok(result)
    }

    async fn remove_stale(&self, source: &str, keep_ids: &[String]) -> AppResult<usize> {
        let keep: HashSet<&str> = keep_ids.iter().map(String::as_str).collect();

        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Ingestion(format!("Failed to start transaction: {}", e)))?;

        let stored: Vec<String> = {
            let mut stmt = tx
                .prepare("SELECT id FROM chunks WHERE source = ?1")
                .map_err(|e| AppError::Ingestion(format!("Failed to list {}: {}", source, e)))?;
            let ids = stmt
                .query_map(params![source], |row| row.get::<_, String>(0))
                .map_err(|e| AppError::Ingestion(format!("Failed to list {}: {}", source, e)))?;
            let stored = ids
                .collect::<Result<Vec<String>, _>>()
                .map_err(|e| AppError::Ingestion(format!("Failed to list {}: {}", source, e)))?;
            stored
        };

        let mut removed = 0;
        for id in stored.iter().filter(|id| !keep.contains(id.as_str())) {
            removed += tx
                .execute("DELETE FROM chunks WHERE id = ?1", params![id])
                .map_err(|e| AppError::Ingestion(format!("Failed to remove {}: {}", id, e)))?;
        }

        tx.commit()
            .map_err(|e| AppError::Ingestion(format!("Failed to commit removal: {}", e)))?;
        Ok(removed)
    }

    async fn count(&self) -> AppResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
            .map_err(|e| AppError::Retrieval(format!("Failed to count chunks: {}", e)))?;
        Ok(count as usize)
    }

    async fn reset(&self) -> AppResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "DELETE FROM chunks;
             DELETE FROM index_info WHERE key = 'embedder';",
        )
        .map_err(|e| AppError::Ingestion(format!("Failed to reset index: {}", e)))?;

        conn.execute(
            "INSERT INTO index_info (key, value) VALUES ('embedder', ?1)",
            params![embedder_fingerprint(self.embedder.as_ref())],
        )
        .map_err(|e| AppError::Ingestion(format!("Failed to write index info: {}", e)))?;

        tracing::info!("Reset vector index");
        Ok(())
    }
}

fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Retrieval(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Cosine similarity; 0.0 for mismatched lengths or zero vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashingProvider;
    use crate::vector_index::TABLE_CONTENT_TYPE;
    use tempfile::TempDir;

    fn meta(source: &str, chunk: usize) -> ChunkMetadata {
        ChunkMetadata {
            source: source.to_string(),
            chunk,
            content_type: TABLE_CONTENT_TYPE.to_string(),
            metadata_file: "meta.yaml".to_string(),
        }
    }

    fn hashing(dimensions: usize) -> Arc<dyn EmbeddingProvider> {
        Arc::new(HashingProvider::new(dimensions))
    }

    async fn seeded_index() -> SqliteIndex {
        let index = SqliteIndex::in_memory(hashing(256)).unwrap();
        index
            .upsert(
                &["sales.json_chunk_0".into(), "weather.json_chunk_0".into()],
                &[
                    "Sale Price (Sale Price in USD): 500000, Borough: Queens.".into(),
                    "Temperature: 21, Forecast: sunny.".into(),
                ],
                &[meta("sales.json", 0), meta("weather.json", 0)],
            )
            .await
            .unwrap();
        index
    }

    #[tokio::test]
    async fn test_query_ranks_by_similarity() {
        let index = seeded_index().await;

        let result = index.query("sale price in Queens", 2).await.unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.metadatas[0].source, "sales.json");
        assert!(result.scores[0] >= result.scores[1]);
    }

    #[tokio::test]
    async fn test_query_truncates_to_k() {
        let index = seeded_index().await;
        let result = index.query("sale price", 1).await.unwrap();
        assert_eq!(result.len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let index = seeded_index().await;
        index
            .upsert(
                &["sales.json_chunk_0".into()],
                &["Borough: Bronx.".into()],
                &[meta("sales.json", 0)],
            )
            .await
            .unwrap();

        assert_eq!(index.count().await.unwrap(), 2);
        let result = index.query("Bronx", 1).await.unwrap();
        assert_eq!(result.documents[0], "Borough: Bronx.");
    }

    #[tokio::test]
    async fn test_mismatched_lengths_rejected() {
        let index = SqliteIndex::in_memory(hashing(16)).unwrap();
        let err = index
            .upsert(&["a".into()], &[], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Ingestion(_)));
    }

    #[tokio::test]
    async fn test_remove_stale_keeps_listed_ids_and_reset() {
        let index = seeded_index().await;

        let keep = vec!["sales.json_chunk_0".to_string()];
        assert_eq!(index.remove_stale("sales.json", &keep).await.unwrap(), 0);
        assert_eq!(index.remove_stale("weather.json", &keep).await.unwrap(), 1);
        assert_eq!(index.count().await.unwrap(), 1);
        assert_eq!(
            index.query("anything", 3).await.unwrap().metadatas[0].source,
            "sales.json"
        );

        index.reset().await.unwrap();
        assert_eq!(index.count().await.unwrap(), 0);
        assert!(index.query("anything", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persists_and_rejects_other_embedder() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.sqlite");

        {
            let index = SqliteIndex::open(&path, hashing(64)).unwrap();
            index
                .upsert(&["a".into()], &["Borough: Queens.".into()], &[meta("a.json", 0)])
                .await
                .unwrap();
        }

        let reopened = SqliteIndex::open(&path, hashing(64)).unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);

        let err = SqliteIndex::open(&path, hashing(128)).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 0.001);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 0.001);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_embedding_bytes_roundtrip() {
        let embedding = vec![0.25, -1.5, 3.0];
        assert_eq!(
            bytes_to_embedding(&embedding_to_bytes(&embedding)).unwrap(),
            embedding
        );
        assert!(bytes_to_embedding(&[1, 2, 3]).is_err());
    }
}
