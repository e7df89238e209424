//! Grounding context assembly.

use crate::format::{METADATA_MARKER, RECORDS_MARKER};

/// Separator between passages in an assembled context.
pub const PASSAGE_SEPARATOR: &str = "\n\n---\n\n";

const UNKNOWN_SOURCE: &str = "Unknown source";

/// Join passages into one prompt-ready context block.
///
/// Passages that carry the metadata header are re-rendered as labeled
/// `Column Information:` and `Data Records:` sections; other passages pass
/// through unchanged.
pub fn assemble_context<S: AsRef<str>>(passages: &[S]) -> String {
    passages
        .iter()
        .map(|p| render_passage(p.as_ref()))
        .collect::<Vec<_>>()
        .join(PASSAGE_SEPARATOR)
}

fn render_passage(passage: &str) -> String {
    if !passage.contains(METADATA_MARKER) {
        return passage.to_string();
    }

    let (metadata_part, data_part) = passage
        .split_once(RECORDS_MARKER)
        .unwrap_or((passage, ""));

    format!(
        "Column Information:\n{}\n\nData Records:\n{}",
        metadata_part.replace(METADATA_MARKER, "").trim(),
        data_part.trim()
    )
}

/// Best-effort source label for a passage without stored metadata.
///
/// Uses any text preceding the metadata header, else `"Unknown source"`.
pub fn extract_source(passage: &str) -> String {
    passage
        .split_once(METADATA_MARKER)
        .map(|(before, _)| before.trim())
        .filter(|before| !before.is_empty())
        .unwrap_or(UNKNOWN_SOURCE)
        .to_string()
}
