//! Offline embedding provider based on hashed word and trigram features.

use crate::embeddings::provider::EmbeddingProvider;
use std::collections::HashMap;
use tabula_core::AppResult;

const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "what", "how",
];

/// Deterministic feature-hashing embedder.
///
/// Each token contributes its whole-word hash and the hashes of its padded
/// character trigrams; the vector is then scaled to unit length. Tokens are
/// alphanumeric runs, so column names, codes and numbers in table rows all
/// produce features. Not semantic, but stable and dependency free.
#[derive(Debug)]
pub struct HashingProvider {
    dimensions: usize,
}

impl HashingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];

        let lower = text.to_lowercase();
        let mut frequencies: HashMap<&str, u32> = HashMap::new();
        for token in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.chars().count() >= 2 && !STOP_WORDS.contains(t))
        {
            *frequencies.entry(token).or_insert(0) += 1;
        }

        for (token, freq) in &frequencies {
            let weight = (*freq as f32).sqrt();

            embedding[self.bucket(token)] += weight;

            let padded: Vec<char> = format!("#{}#", token).chars().collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                embedding[self.bucket(&trigram)] += weight * 0.5;
            }
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding
    }

    fn bucket(&self, feature: &str) -> usize {
        // FNV-1a
        let hash = feature.bytes().fold(0xcbf29ce484222325u64, |acc, b| {
            (acc ^ b as u64).wrapping_mul(0x100000001b3)
        });
        (hash % self.dimensions as u64) as usize
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for HashingProvider {
    fn provider_name(&self) -> &str {
        "hashing"
    }

    fn model_name(&self) -> &str {
        "hashing-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_unit_length() {
        let provider = HashingProvider::new(384);
        let embedding = provider.embed("Sale Price (Sale Price in USD): 500000").await.unwrap();

        assert_eq!(embedding.len(), 384);
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_deterministic() {
        let provider = HashingProvider::new(128);
        let a = provider.embed("borough queens").await.unwrap();
        let b = provider.embed("borough queens").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_overlapping_text_scores_higher() {
        let provider = HashingProvider::new(384);
        let query = provider.embed("average sale price").await.unwrap();
        let related = provider
            .embed("Sale Price (Sale Price in USD): 500000, Borough: Queens")
            .await
            .unwrap();
        let unrelated = provider.embed("Weather forecast for tomorrow").await.unwrap();

        assert!(cosine(&query, &related) > cosine(&query, &unrelated));
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let provider = HashingProvider::new(64);
        let embedding = provider.embed("").await.unwrap();
        assert!(embedding.iter().all(|&x| x == 0.0));
    }

    #[tokio::test]
    async fn test_batch_order() {
        let provider = HashingProvider::new(64);
        let texts = vec!["first text".to_string(), "second text".to_string()];
        let batch = provider.embed_batch(&texts).await.unwrap();

        assert_eq!(batch[1], provider.embed("second text").await.unwrap());
    }
}
