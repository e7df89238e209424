//! Query classification and rewriting.

use super::types::{ChatHistory, QueryType};

/// Phrases that mark a query as asking about columns rather than values.
pub const METADATA_KEYWORDS: [&str; 6] = [
    "metadata",
    "column",
    "field",
    "description",
    "data type",
    "what kind of",
];

/// Prior exchanges folded into the rewritten query.
pub const HISTORY_CONTEXT_TURNS: usize = 3;

/// Classify by case-insensitive keyword match.
pub fn classify_query(query: &str) -> QueryType {
    let lower = query.to_lowercase();
    if METADATA_KEYWORDS.iter().any(|k| lower.contains(k)) {
        QueryType::Metadata
    } else {
        QueryType::Data
    }
}

/// Number of chunks to retrieve; metadata queries get twice the base.
pub fn retrieval_count(base: usize, query_type: QueryType) -> usize {
    match query_type {
        QueryType::Metadata => base * 2,
        QueryType::Data => base,
    }
}

/// Render the most recent turns as `Previous Q:`/`A:` pairs.
pub fn extract_history_context(history: &ChatHistory) -> String {
    history
        .recent(HISTORY_CONTEXT_TURNS)
        .iter()
        .map(|turn| format!("Previous Q: {}\nA: {}", turn.question, turn.answer))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Rewrite `query` with history context and a type-specific instruction.
pub fn enhance_query(query: &str, query_type: QueryType, history_context: &str) -> String {
    let base = if history_context.is_empty() {
        query.to_string()
    } else {
        format!(
            "Given this context from previous exchanges: {}\n{}",
            history_context, query
        )
    };

    match query_type {
        QueryType::Metadata => format!(
            "Based on the column information and data provided, please answer: {}. \
             Include relevant metadata details in your response.",
            base
        ),
        QueryType::Data => format!(
            "Based on the data records provided, please answer: {}. \
             Reference the column descriptions when relevant.",
            base
        ),
    }
}
