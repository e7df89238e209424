//! Confidence filtering of retrieved chunks.

use super::context::extract_source;
use crate::vector_index::QueryResult;
use serde::{Deserialize, Serialize};

/// A retrieved chunk that met the confidence threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPassage {
    pub text: String,
    pub score: f32,

    /// Table file the chunk came from, or a best-effort label
    pub source: String,
}

/// Keep results scoring at least `threshold`, in their original order.
pub fn filter_by_confidence(result: &QueryResult, threshold: f32) -> Vec<ScoredPassage> {
    result
        .iter()
        .filter(|(_, score, _)| *score >= threshold)
        .map(|(text, score, metadata)| ScoredPassage {
            text: text.to_string(),
            score,
            source: metadata
                .map(|m| m.source.clone())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| extract_source(text)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_index::{ChunkMetadata, TABLE_CONTENT_TYPE};

    fn result(scores: &[f32]) -> QueryResult {
        QueryResult {
            documents: (0..scores.len()).map(|i| format!("doc{}", i)).collect(),
            scores: scores.to_vec(),
            metadatas: Vec::new(),
        }
    }

    #[test]
    fn test_keeps_scores_at_or_above_threshold() {
        let kept = filter_by_confidence(&result(&[0.8, 0.4, 0.6, 0.59]), 0.6);

        let texts: Vec<_> = kept.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["doc0", "doc2"]);
        assert!(kept.iter().all(|p| p.score >= 0.6));
    }

    #[test]
    fn test_preserves_order_and_subset() {
        for threshold in [-1.0, 0.0, 0.3, 0.5, 0.9, 1.1] {
            let input = result(&[0.2, 0.9, 0.5, 0.7, 0.3]);
            let kept = filter_by_confidence(&input, threshold);

            let mut last_index = None;
            for passage in &kept {
                let idx = input.documents.iter().position(|d| *d == passage.text).unwrap();
                assert!(last_index.map_or(true, |last| idx > last));
                assert!(passage.score >= threshold);
                last_index = Some(idx);
            }
        }
    }

    #[test]
    fn test_all_below_threshold() {
        assert!(filter_by_confidence(&result(&[0.1, 0.2]), 0.6).is_empty());
    }

    #[test]
    fn test_source_from_metadata() {
        let mut input = result(&[0.9]);
        input.metadatas.push(ChunkMetadata {
            source: "sales.json".into(),
            chunk: 0,
            content_type: TABLE_CONTENT_TYPE.into(),
            metadata_file: "sales.yaml".into(),
        });

        let kept = filter_by_confidence(&input, 0.5);
        assert_eq!(kept[0].source, "sales.json");
    }

    #[test]
    fn test_source_fallback() {
        let kept = filter_by_confidence(&result(&[0.9]), 0.5);
        assert_eq!(kept[0].source, "Unknown source");
    }
}
