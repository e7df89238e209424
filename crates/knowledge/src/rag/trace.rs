//! Retrieval trace and its human-readable summary.

use super::filter::ScoredPassage;
use serde::{Deserialize, Serialize};
use tabula_core::{AppError, ErrorKind};

/// A chunk used as grounding context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceChunk {
    pub source: String,
    pub score: f32,
}

/// Every decision taken while answering one query.
///
/// Created at query start, appended to as the pipeline advances, and
/// returned with the answer whether or not the query succeeded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalTrace {
    /// Pipeline steps, in execution order
    pub steps: Vec<String>,

    /// Chunks that passed the confidence filter, in filter order
    pub chunks: Vec<TraceChunk>,

    /// Scores of `chunks`, in the same order
    pub scores: Vec<f32>,

    /// Whether the query was classified as metadata-oriented
    pub metadata_used: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl RetrievalTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&mut self, description: impl Into<String>) {
        let description = description.into();
        tracing::info!("{}", description);
        self.steps.push(description);
    }

    /// Record a passage that will be used as context.
    pub fn record_passage(&mut self, passage: &ScoredPassage) {
        self.chunks.push(TraceChunk {
            source: passage.source.clone(),
            score: passage.score,
        });
        self.scores.push(passage.score);
    }

    /// Record the failure that ended (or degraded) the query.
    pub fn fail(&mut self, error: &AppError) {
        self.error = Some(error.to_string());
        self.error_kind = Some(error.kind());
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Per-answer summary of a trace, for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub chunks_retrieved: usize,

    /// Source files, deduplicated in first-seen order
    pub relevant_files: Vec<String>,

    /// Scores formatted to two decimals
    pub confidence_scores: Vec<String>,

    pub processing_steps: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Explanation {
    pub fn from_trace(trace: &RetrievalTrace) -> Self {
        let mut relevant_files: Vec<String> = Vec::new();
        for chunk in &trace.chunks {
            if !relevant_files.contains(&chunk.source) {
                relevant_files.push(chunk.source.clone());
            }
        }

        Self {
            chunks_retrieved: trace.chunks.len(),
            relevant_files,
            confidence_scores: trace.scores.iter().map(|s| format!("{:.2}", s)).collect(),
            processing_steps: trace.steps.clone(),
            error: trace.error.clone(),
        }
    }
}

impl std::fmt::Display for Explanation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Chunks retrieved: {}", self.chunks_retrieved)?;
        if !self.relevant_files.is_empty() {
            writeln!(f, "Relevant files: {}", self.relevant_files.join(", "))?;
        }
        if !self.confidence_scores.is_empty() {
            writeln!(f, "Confidence scores: {}", self.confidence_scores.join(", "))?;
        }
        writeln!(f, "Processing steps:")?;
        for (i, step) in self.processing_steps.iter().enumerate() {
            writeln!(f, "  {}. {}", i + 1, step)?;
        }
        if let Some(ref error) = self.error {
            writeln!(f, "Error: {}", error)?;
        }
        Ok(())
    }
}
