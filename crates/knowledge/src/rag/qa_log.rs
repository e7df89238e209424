//! Durable log of answered questions.
//!
//! The log is one pretty-printed JSON array, rewritten in full on every
//! append. Appends within a process go through a single async mutex; separate
//! processes writing the same file can still lose entries.

use super::trace::RetrievalTrace;
use super::types::QueryType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tabula_core::{AppError, AppResult};
use tokio::sync::Mutex;

/// One answered question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaLogEntry {
    pub question: String,
    pub answer: String,
    pub query_type: QueryType,
    pub retrieval_details: RetrievalTrace,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Append-only QA log file.
#[derive(Debug)]
pub struct QaLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl QaLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an entry.
    ///
    /// A missing or empty file starts a fresh log. A file that is not a JSON
    /// array is replaced by a log holding only this entry.
    pub async fn append(&self, entry: &QaLogEntry) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;

        let mut entries = self.read_raw().await?;
        entries.push(serde_json::to_value(entry)?);

        let json = serde_json::to_string_pretty(&entries)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    AppError::Persistence(format!("Failed to create {:?}: {}", parent, e))
                })?;
            }
        }

        // Never leave a truncated log behind.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| AppError::Persistence(format!("Failed to write {:?}: {}", tmp, e)))?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            AppError::Persistence(format!("Failed to replace {:?}: {}", self.path, e))
        })?;

        tracing::debug!("Appended QA log entry ({} total)", entries.len());
        Ok(())
    }

    /// Load all entries. Entries that do not match the current shape are
    /// skipped.
    pub async fn load(&self) -> AppResult<Vec<QaLogEntry>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(AppError::Persistence(format!(
                    "Failed to read {:?}: {}",
                    self.path, e
                )))
            }
        };

        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }

        let values: Vec<Value> = serde_json::from_str(&contents).map_err(|e| {
            AppError::Persistence(format!("QA log {:?} is corrupted: {}", self.path, e))
        })?;

        Ok(values
            .into_iter()
            .enumerate()
            .filter_map(|(i, value)| match serde_json::from_value(value) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("Skipping QA log entry {}: {}", i, e);
                    None
                }
            })
            .collect())
    }

    async fn read_raw(&self) -> AppResult<Vec<Value>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(AppError::Persistence(format!(
                    "Failed to read {:?}: {}",
                    self.path, e
                )))
            }
        };

        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str::<Vec<Value>>(&contents) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                tracing::warn!(
                    "QA log {:?} is corrupted ({}); starting a fresh log",
                    self.path,
                    e
                );
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn entry(question: &str) -> QaLogEntry {
        QaLogEntry {
            question: question.to_string(),
            answer: "42".to_string(),
            query_type: QueryType::Data,
            retrieval_details: RetrievalTrace::new(),
            timestamp: None,
        }
    }

    #[tokio::test]
    async fn test_append_to_missing_file() {
        let temp = TempDir::new().unwrap();
        let log = QaLog::new(temp.path().join("nested").join("qa_log.json"));

        log.append(&entry("first")).await.unwrap();
        log.append(&entry("second")).await.unwrap();

        let entries = log.load().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].question, "second");
    }

    #[tokio::test]
    async fn test_empty_file_starts_fresh() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("qa_log.json");
        std::fs::write(&path, "").unwrap();

        let log = QaLog::new(&path);
        log.append(&entry("only")).await.unwrap();
        assert_eq!(log.load().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupted_file_replaced_with_single_entry() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("qa_log.json");
        std::fs::write(&path, "{ this is not json ]").unwrap();

        let log = QaLog::new(&path);
        assert!(log.load().await.is_err());

        log.append(&entry("after corruption")).await.unwrap();

        let entries = log.load().await.unwrap();
        assert_eq!(entries, vec![entry("after corruption")]);
    }

    #[tokio::test]
    async fn test_foreign_entries_preserved() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("qa_log.json");
        std::fs::write(&path, r#"[{"note": "hand written"}]"#).unwrap();

        let log = QaLog::new(&path);
        log.append(&entry("q")).await.unwrap();

        let raw: Vec<Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(log.load().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_not_lost() {
        let temp = TempDir::new().unwrap();
        let log = Arc::new(QaLog::new(temp.path().join("qa_log.json")));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let log = Arc::clone(&log);
                tokio::spawn(async move { log.append(&entry(&format!("q{}", i))).await })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(log.load().await.unwrap().len(), 8);
    }

    #[test]
    fn test_entry_format() {
        let json = serde_json::to_value(entry("q")).unwrap();
        assert_eq!(json["query_type"], "data");
        assert!(json["retrieval_details"]["steps"].is_array());
        assert!(json.get("timestamp").is_none());
    }
}
