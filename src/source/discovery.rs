//! Work-item discovery
//!
//! Enumerates the input files of a data directory into an ordered list of
//! [`WorkItem`]s. Ordering is by file name, so the same directory always
//! yields the same indices regardless of the order the filesystem reports.

use super::WorkItem;
use crate::Result;
use anyhow::Context;
use std::path::Path;
use tracing::debug;

/// Discover work items in `data_dir`
///
/// # Arguments
///
/// * `data_dir` - Directory to scan (not recursive)
/// * `extension` - File extension to accept, without the dot
/// * `max_entities` - Optional cap applied after sorting
///
/// # Returns
///
/// Work items with dense indices `0..N` in file-name order.
pub fn discover(data_dir: &Path, extension: &str, max_entities: Option<usize>) -> Result<Vec<WorkItem>> {
    let entries = std::fs::read_dir(data_dir)
        .with_context(|| format!("Failed to open data directory {}", data_dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to read directory {}", data_dir.display()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        files.push(path);
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    if let Some(max) = max_entities {
        files.truncate(max);
    }

    let items: Vec<WorkItem> = files
        .into_iter()
        .enumerate()
        .map(|(index, path)| {
            let entity = entity_name(&path);
            WorkItem { index, path, entity }
        })
        .collect();

    debug!(dir = %data_dir.display(), items = items.len(), "discovered work items");
    Ok(items)
}

/// Entity name for a file: the stem with underscores turned into spaces
pub fn entity_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().replace('_', " "))
        .unwrap_or_default()
}
