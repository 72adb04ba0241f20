//! Knowledge-base discovery and file enumeration.
//!
//! A knowledge base is a non-hidden directory directly under the configured
//! root. Hidden entries (names starting with `.`) are never listed or
//! traversed, which keeps the `.index` hash mirror and the vector index
//! directory out of every scan.

use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::error::{KbError, Result};

pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

fn entry_is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_str().map_or(false, is_hidden)
}

/// Names of all knowledge bases under `root`, sorted.
///
/// A missing root directory yields an empty list.
pub fn list_knowledge_bases(root: &Path) -> Result<Vec<String>> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(KbError::io("list knowledge bases in", root, e)),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| KbError::io("list knowledge bases in", root, e))?;
        let name = entry.file_name().to_string_lossy().to_string();
        if is_hidden(&name) {
            continue;
        }
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Reject names that are empty, hidden, or could escape the root.
pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(KbError::InvalidInput("knowledge base name is empty".into()));
    }
    if is_hidden(name) {
        return Err(KbError::InvalidInput(format!(
            "knowledge base name '{}' must not start with '.'",
            name
        )));
    }
    if name.contains(&['/', '\\'][..]) || name == ".." {
        return Err(KbError::InvalidInput(format!(
            "knowledge base name '{}' must not contain path separators",
            name
        )));
    }
    Ok(())
}

/// Every non-hidden file under `kb_dir`, depth-first in directory-listing order.
///
/// Unreadable entries are logged and skipped.
pub fn collect_files(kb_dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let walker = WalkDir::new(kb_dir)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !entry_is_hidden(e));

    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
            Ok(_) => {}
            Err(e) => tracing::warn!(kb = %kb_dir.display(), error = %e, "skipping unreadable entry"),
        }
    }
    files
}
