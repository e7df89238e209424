//! Error types for Tabula.
//!
//! Every failure in the workspace is represented by [`AppError`]. The
//! variants follow the failure taxonomy of the retrieval pipeline so callers
//! can branch on [`ErrorKind`] instead of inspecting message text.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for Tabula.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed table or metadata input, unsupported file types
    #[error("Ingestion error: {0}")]
    Ingestion(String),

    /// Vector index unavailable or query failure
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// No retrieved passage met the confidence threshold
    #[error("No relevant data: {0}")]
    NoRelevantData(String),

    /// Language-model completion failures
    #[error("Completion error: {0}")]
    Completion(String),

    /// QA log and manifest persistence failures
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Prompt loading and rendering errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

/// Coarse failure category, recorded in retrieval traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Ingestion,
    Retrieval,
    NoRelevantData,
    Completion,
    Persistence,
    Config,
    Internal,
}

impl AppError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Ingestion(_) => ErrorKind::Ingestion,
            AppError::Retrieval(_) => ErrorKind::Retrieval,
            AppError::NoRelevantData(_) => ErrorKind::NoRelevantData,
            AppError::Completion(_) => ErrorKind::Completion,
            AppError::Persistence(_) => ErrorKind::Persistence,
            AppError::Config(_) => ErrorKind::Config,
            AppError::Io(_)
            | AppError::Prompt(_)
            | AppError::Serialization(_)
            | AppError::Other(_) => ErrorKind::Internal,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            AppError::Retrieval("down".into()).kind(),
            ErrorKind::Retrieval
        );
        assert_eq!(
            AppError::Completion("timeout".into()).kind(),
            ErrorKind::Completion
        );
        assert_eq!(AppError::Other("x".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::NoRelevantData).unwrap();
        assert_eq!(json, "\"no_relevant_data\"");
    }

    #[test]
    fn test_json_error_converts_to_serialization() {
        let err: AppError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
