//! Record tables and their column metadata.
//!
//! Tables are JSON arrays of flat objects. Metadata files are YAML or JSON
//! lists describing each column.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use tabula_core::{AppError, AppResult};

/// Ordered rows of scalar cells.
///
/// Column order is the order in which keys first appear, starting with the
/// first record. Columns are fixed once the table is loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl RecordTable {
    /// Build a table from column names and row values.
    ///
    /// Every row must have exactly one cell per column.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> AppResult<Self> {
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(AppError::Ingestion(format!(
                "Row {} has {} cells, expected {}",
                i,
                row.len(),
                columns.len()
            )));
        }

        Ok(Self { columns, rows })
    }

    /// Build a table from JSON records.
    pub fn from_records(records: Vec<Map<String, Value>>) -> AppResult<Self> {
        let mut columns: Vec<String> = Vec::new();
        for record in &records {
            for key in record.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }

        let mut rows = Vec::with_capacity(records.len());
        for (i, record) in records.into_iter().enumerate() {
            let mut row = Vec::with_capacity(columns.len());
            for column in &columns {
                let cell = record.get(column).cloned().unwrap_or(Value::Null);
                if cell.is_array() || cell.is_object() {
                    return Err(AppError::Ingestion(format!(
                        "Record {} column '{}' is not a scalar value",
                        i, column
                    )));
                }
                row.push(cell);
            }
            rows.push(row);
        }

        Ok(Self { columns, rows })
    }

    /// Parse a table from JSON text.
    pub fn from_json_str(contents: &str) -> AppResult<Self> {
        let values: Vec<Value> = serde_json::from_str(contents)
            .map_err(|e| AppError::Ingestion(format!("Table is not a JSON array: {}", e)))?;

        let records = values
            .into_iter()
            .enumerate()
            .map(|(i, value)| match value {
                Value::Object(map) => Ok(map),
                other => Err(AppError::Ingestion(format!(
                    "Record {} is not an object: {}",
                    i, other
                ))),
            })
            .collect::<AppResult<Vec<_>>>()?;

        Self::from_records(records)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Description of one column, as read from a metadata file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name as spelled in the metadata file
    #[serde(rename = "column_name")]
    pub name: String,

    #[serde(default)]
    pub data_type: String,

    /// Allowed values, free-form (string, list or range)
    #[serde(rename = "values", default)]
    pub allowed_values: Value,

    #[serde(default)]
    pub full_name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub notes: String,
}

/// Column metadata keyed by normalized column name.
#[derive(Debug, Clone, Default)]
pub struct ColumnMetadata {
    columns: HashMap<String, ColumnInfo>,
}

impl ColumnMetadata {
    /// Index entries by normalized name.
    ///
    /// Two entries that normalize to the same name collide; the later one
    /// wins.
    pub fn from_entries(entries: Vec<ColumnInfo>) -> Self {
        let mut columns = HashMap::with_capacity(entries.len());
        for entry in entries {
            let key = normalize_column_name(&entry.name);
            if let Some(previous) = columns.insert(key.clone(), entry) {
                tracing::warn!(
                    "Metadata columns collide on '{}'; '{}' is replaced",
                    key,
                    previous.name
                );
            }
        }
        Self { columns }
    }

    /// Parse metadata from YAML text (JSON is valid YAML).
    pub fn from_yaml_str(contents: &str) -> AppResult<Self> {
        let entries: Vec<ColumnInfo> = serde_yaml::from_str(contents)
            .map_err(|e| AppError::Ingestion(format!("Malformed column metadata: {}", e)))?;
        Ok(Self::from_entries(entries))
    }

    /// Look up a column by any spelling that normalizes to the same name.
    pub fn get(&self, column: &str) -> Option<&ColumnInfo> {
        self.columns.get(&normalize_column_name(column))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Lowercase, with spaces and hyphens replaced by underscores.
pub fn normalize_column_name(name: &str) -> String {
    name.to_lowercase().replace([' ', '-'], "_")
}

/// Load a record table from a `.json` file.
pub fn load_table(path: &Path) -> AppResult<RecordTable> {
    match extension(path).as_deref() {
        Some("json") => {}
        other => {
            return Err(AppError::Ingestion(format!(
                "Unsupported table format {:?} for {:?}",
                other.unwrap_or(""),
                path
            )))
        }
    }

    let contents = std::fs::read_to_string(path)
        .map_err(|e| AppError::Ingestion(format!("Failed to read table {:?}: {}", path, e)))?;

    let table = RecordTable::from_json_str(&contents)
        .map_err(|e| AppError::Ingestion(format!("{:?}: {}", path, e)))?;

    tracing::debug!(
        "Loaded table {:?}: {} columns, {} rows",
        path,
        table.columns().len(),
        table.rows().len()
    );

    Ok(table)
}

/// Load column metadata from a `.yaml`, `.yml` or `.json` file.
pub fn load_metadata(path: &Path) -> AppResult<ColumnMetadata> {
    match extension(path).as_deref() {
        Some("yaml") | Some("yml") | Some("json") => {}
        other => {
            return Err(AppError::Ingestion(format!(
                "Unsupported metadata format {:?} for {:?}",
                other.unwrap_or(""),
                path
            )))
        }
    }

    let contents = std::fs::read_to_string(path)
        .map_err(|e| AppError::Ingestion(format!("Failed to read metadata {:?}: {}", path, e)))?;

    ColumnMetadata::from_yaml_str(&contents)
        .map_err(|e| AppError::Ingestion(format!("{:?}: {}", path, e)))
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}
