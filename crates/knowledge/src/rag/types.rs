//! Conversation and answer types.

use super::trace::RetrievalTrace;
use serde::{Deserialize, Serialize};
use tabula_core::ErrorKind;

/// One question and the answer given to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub question: String,
    pub answer: String,
}

impl ChatTurn {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Append-only record of a conversation, oldest turn first.
///
/// Owned by the caller for the lifetime of one session; the pipeline only
/// reads it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatHistory {
    turns: Vec<ChatTurn>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.turns.push(ChatTurn::new(question, answer));
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    /// The last `n` turns, oldest first.
    pub fn recent(&self, n: usize) -> &[ChatTurn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    /// Turns as `(question, answer)` pairs.
    pub fn pairs(&self) -> Vec<(&str, &str)> {
        self.turns
            .iter()
            .map(|t| (t.question.as_str(), t.answer.as_str()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// What a query asks about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    /// Column and schema semantics
    Metadata,
    /// Data values
    Data,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Metadata => "metadata",
            QueryType::Data => "data",
        }
    }
}

/// Answer to one query, with the trace of how it was produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagAnswer {
    pub answer: String,
    pub query_type: QueryType,

    /// Why `answer` is not a grounded response: `NoRelevantData` when no
    /// chunk met the threshold, otherwise the kind of the failure. `None`
    /// for a generated answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ErrorKind>,

    pub trace: RetrievalTrace,
}

impl RagAnswer {
    /// Whether the answer was generated from retrieved context.
    pub fn is_grounded(&self) -> bool {
        self.outcome.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_turns() {
        let mut history = ChatHistory::new();
        for i in 0..5 {
            history.push(format!("q{}", i), format!("a{}", i));
        }

        let recent = history.recent(3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].question, "q2");
        assert_eq!(recent[2].answer, "a4");
        assert_eq!(history.recent(10).len(), 5);
    }

    #[test]
    fn test_query_type_serialization() {
        assert_eq!(serde_json::to_string(&QueryType::Metadata).unwrap(), "\"metadata\"");
        assert_eq!(QueryType::Data.as_str(), "data");
    }
}
