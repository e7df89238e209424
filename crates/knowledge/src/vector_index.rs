//! Vector index abstraction for table chunks.

use serde::{Deserialize, Serialize};
use tabula_core::AppResult;

/// Content type recorded for chunks produced from a table and its metadata.
pub const TABLE_CONTENT_TYPE: &str = "table_with_metadata";

/// Metadata stored alongside every chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// File name of the table the chunk came from
    pub source: String,

    /// Position of the chunk within its table document
    pub chunk: usize,

    pub content_type: String,

    /// File name of the column metadata used to format the table
    pub metadata_file: String,
}

/// Ranked results of one index query.
///
/// The three vectors are parallel. `metadatas` may be shorter than
/// `documents` for backends that do not store metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub documents: Vec<String>,

    /// Similarity scores, higher is more relevant
    pub scores: Vec<f32>,

    pub metadatas: Vec<ChunkMetadata>,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Iterate `(document, score, metadata)` in rank order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f32, Option<&ChunkMetadata>)> {
        self.documents
            .iter()
            .zip(&self.scores)
            .enumerate()
            .map(move |(i, (doc, score))| (doc.as_str(), *score, self.metadatas.get(i)))
    }
}

/// Trait for vector index backends.
///
/// Scores are similarities: higher means more relevant. Backends whose
/// native metric is a distance convert before returning. Implementations
/// must be safe to share between concurrent pipelines.
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace chunks by id.
    ///
    /// `ids`, `documents` and `metadatas` must have equal length.
    async fn upsert(
        &self,
        ids: &[String],
        documents: &[String],
        metadatas: &[ChunkMetadata],
    ) -> AppResult<()>;

    /// Return up to `k` chunks most similar to `text`, by descending score.
    async fn query(&self, text: &str, k: usize) -> AppResult<QueryResult>;

    /// Remove the chunks of `source` whose id is not in `keep_ids`.
    /// Returns the number removed.
    async fn remove_stale(&self, source: &str, keep_ids: &[String]) -> AppResult<usize>;

    /// Number of stored chunks.
    async fn count(&self) -> AppResult<usize>;

    /// Remove all chunks.
    async fn reset(&self) -> AppResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_result_iter_tolerates_missing_metadata() {
        let result = QueryResult {
            documents: vec!["a".into(), "b".into()],
            scores: vec![0.9, 0.5],
            metadatas: vec![ChunkMetadata {
                source: "sales.json".into(),
                chunk: 0,
                content_type: TABLE_CONTENT_TYPE.into(),
                metadata_file: "sales.yaml".into(),
            }],
        };

        let items: Vec<_> = result.iter().collect();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].2.map(|m| m.source.as_str()), Some("sales.json"));
        assert_eq!(items[1], ("b", 0.5, None));
    }

    #[test]
    fn test_chunk_metadata_serialization() {
        let metadata = ChunkMetadata {
            source: "sales.json".into(),
            chunk: 3,
            content_type: TABLE_CONTENT_TYPE.into(),
            metadata_file: "sales.yaml".into(),
        };

        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["chunk"], 3);
        assert_eq!(json["content_type"], "table_with_metadata");
    }
}
