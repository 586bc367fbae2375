//! Collection loading
//!
//! Two on-disk layouts are understood:
//! - JSON Lines (`.jsonl` / `.ndjson`): one document per non-blank line
//! - anything else: a single JSON array of documents

use crate::error::{Result, StorageError};
use insights_core::Document;
use std::path::Path;
use tracing::debug;

fn is_json_lines(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jsonl") || ext.eq_ignore_ascii_case("ndjson"))
}

/// Read every document of a collection file
pub fn load_collection(path: impl AsRef<Path>) -> Result<Vec<Document>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;

    let documents = if is_json_lines(path) {
        parse_json_lines(&content)?
    } else {
        parse_json_array(&content)?
    };

    debug!("Loaded {} documents from {}", documents.len(), path.display());
    Ok(documents)
}

/// Parse a JSON array of objects
pub fn parse_json_array(content: &str) -> Result<Vec<Document>> {
    let value: serde_json::Value =
        serde_json::from_str(content).map_err(|e| StorageError::Malformed(e.to_string()))?;

    let serde_json::Value::Array(items) = value else {
        return Err(StorageError::Malformed(
            "expected a JSON array of documents".to_string(),
        ));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            Document::from_json(item).map_err(|e| StorageError::InvalidDocument {
                location: format!("index {}", i),
                reason: e.to_string(),
            })
        })
        .collect()
}

/// Parse JSON Lines, skipping blank lines
pub fn parse_json_lines(content: &str) -> Result<Vec<Document>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            let invalid = |reason: String| StorageError::InvalidDocument {
                location: format!("line {}", i + 1),
                reason,
            };
            let value: serde_json::Value =
                serde_json::from_str(line).map_err(|e| invalid(e.to_string()))?;
            Document::from_json(value).map_err(|e| invalid(e.to_string()))
        })
        .collect()
}
