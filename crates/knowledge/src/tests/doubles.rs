//! Stub index and completion client.

use crate::vector_index::{ChunkMetadata, QueryResult, VectorIndex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tabula_core::{AppError, AppResult};
use tabula_llm::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};

/// Index that returns a fixed result and records every requested `k`.
#[derive(Default)]
pub struct StubIndex {
    result: QueryResult,
    fail: bool,
    requested_k: Mutex<Vec<usize>>,
}

impl StubIndex {
    pub fn with_scored(passages: &[(&str, f32)]) -> Self {
        Self {
            result: QueryResult {
                documents: passages.iter().map(|(text, _)| text.to_string()).collect(),
                scores: passages.iter().map(|(_, score)| *score).collect(),
                metadatas: Vec::new(),
            },
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn requested_k(&self) -> Vec<usize> {
        self.requested_k.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl VectorIndex for StubIndex {
    async fn upsert(
        &self,
        _ids: &[String],
        _documents: &[String],
        _metadatas: &[ChunkMetadata],
    ) -> AppResult<()> {
        Ok(())
    }

    async fn query(&self, _text: &str, k: usize) -> AppResult<QueryResult> {
        self.requested_k.lock().unwrap().push(k);
        if self.fail {
            return Err(AppError::Retrieval("index unavailable".to_string()));
        }
        Ok(self.result.clone())
    }

    async fn remove_stale(&self, _source: &str, _keep_ids: &[String]) -> AppResult<usize> {
        Ok(0)
    }

    async fn count(&self) -> AppResult<usize> {
        Ok(self.result.len())
    }

    async fn reset(&self) -> AppResult<()> {
        Ok(())
    }
}

/// Completion client that streams a canned answer in fragments.
#[derive(Default)]
pub struct StubLlm {
    fragments: Vec<String>,
    fail: bool,
    calls: AtomicUsize,
    last_request: Mutex<Option<LlmRequest>>,
}

impl StubLlm {
    pub fn answering(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<LlmRequest> {
        self.last_request.lock().unwrap().clone()
    }

    fn record(&self, request: &LlmRequest) -> AppResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        if self.fail {
            return Err(AppError::Completion("model unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl LlmClient for StubLlm {
    fn provider_name(&self) -> &str {
        "stub"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.record(request)?;
        Ok(LlmResponse {
            content: self.fragments.concat(),
            model: request.model.clone(),
            usage: LlmUsage::default(),
        })
    }

    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
        self.record(request)?;
        let mut items: Vec<AppResult<LlmStreamChunk>> = self
            .fragments
            .iter()
            .map(|f| Ok(LlmStreamChunk::text(f.clone())))
            .collect();
        items.push(Ok(LlmStreamChunk::finished()));
        Ok(Box::pin(futures::stream::iter(items)))
    }
}
