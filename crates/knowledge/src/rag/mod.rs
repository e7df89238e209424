//! Grounded question answering over ingested tables.
//!
//! [`RagPipeline`] classifies a query, retrieves chunks from a
//! [`VectorIndex`](crate::VectorIndex), keeps those above the confidence
//! threshold, and asks the completion provider for an answer grounded in
//! them. Every answer carries a [`RetrievalTrace`].

pub mod context;
pub mod filter;
pub mod pipeline;
pub mod qa_log;
pub mod query;
pub mod trace;
pub mod types;

pub use context::{assemble_context, extract_source, PASSAGE_SEPARATOR};
pub use filter::{filter_by_confidence, ScoredPassage};
pub use pipeline::{
    RagPipeline, Stage, COMPLETION_FAILED_ANSWER, NO_DATA_ANSWER, QUERY_FAILED_ANSWER,
};
pub use qa_log::{QaLog, QaLogEntry};
pub use query::{
    classify_query, enhance_query, extract_history_context, retrieval_count, METADATA_KEYWORDS,
};
pub use trace::{Explanation, RetrievalTrace, TraceChunk};
pub use types::{ChatHistory, ChatTurn, QueryType, RagAnswer};
