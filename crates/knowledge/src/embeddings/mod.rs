//! Embedding providers used by the vector index.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};
pub use providers::{HashingProvider, OllamaEmbeddingProvider};
