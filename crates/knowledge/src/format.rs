//! Renders a table and its column metadata as one retrievable document.

use crate::table::{ColumnInfo, ColumnMetadata, RecordTable};
use serde_json::Value;

/// Opens the column description section.
pub const METADATA_MARKER: &str = "FILE METADATA:";

/// Opens the row section.
pub const RECORDS_MARKER: &str = "DATA RECORDS:";

/// Render `table` with its column metadata.
///
/// The document starts with one `Column/Type/Description/Notes` block per
/// table column, in table order, followed by one line per row. Columns
/// without metadata get placeholder values. Every document produced from the
/// same table and metadata shares the same header.
pub fn format_document(table: &RecordTable, metadata: &ColumnMetadata) -> String {
    let mapping: Vec<Option<&ColumnInfo>> = table
        .columns()
        .iter()
        .map(|column| metadata.get(column))
        .collect();

    let unmapped = mapping.iter().filter(|m| m.is_none()).count();
    if unmapped > 0 {
        tracing::debug!(
            "{} of {} columns have no metadata",
            unmapped,
            mapping.len()
        );
    }

    let mut header = format!("{}\n", METADATA_MARKER);
    for (column, info) in table.columns().iter().zip(&mapping) {
        match info {
            Some(info) => header.push_str(&format!(
                "Column: {}\nType: {}\nDescription: {}\nNotes: {}\n\n",
                column, info.data_type, info.description, info.notes
            )),
            None => header.push_str(&format!(
                "Column: {}\nType: unknown\nDescription: No metadata available\nNotes: No metadata available\n\n",
                column
            )),
        }
    }

    let rows: Vec<String> = table
        .rows()
        .iter()
        .map(|row| {
            table
                .columns()
                .iter()
                .zip(&mapping)
                .zip(row)
                .map(|((column, info), cell)| match info {
                    Some(info) => format!("{} ({}): {}", column, info.full_name, render_cell(cell)),
                    None => format!("{}: {}", column, render_cell(cell)),
                })
                .collect::<Vec<_>>()
                .join(", ")
        })
        .collect();

    format!("{}\n\n{}\n{}", header, RECORDS_MARKER, rows.join("\n"))
}

fn render_cell(cell: &Value) -> String {
    match cell {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
