//! Recursive markdown chunker.
//!
//! Markdown files are split into overlapping chunks so each embedding
//! covers a bounded slice of text. Every other file is indexed whole,
//! as a single chunk.
//!
//! # Algorithm
//!
//! 1. Pick the first separator from [`MARKDOWN_SEPARATORS`] that occurs in
//!    the text (headings first, then rules and paragraphs, then lines,
//!    words, and finally single characters).
//! 2. Split on it and drop the separator itself.
//! 3. Pieces shorter than `chunk_size` are merged back together, joined by
//!    the separator, until the next piece would overflow the chunk. When a
//!    chunk is flushed, pieces are dropped from its front until at most
//!    `overlap` characters remain; those carry into the next chunk.
//! 4. Pieces that are still too long recurse with the remaining separators.
//!
//! Lengths are counted in Unicode scalar values.
//!
//! # Example
//!
//! ```rust
//! use kb_index_core::chunk::split_markdown;
//!
//! let chunks = split_markdown("# Hello\n\nWorld", 1000, 200);
//! assert_eq!(chunks, vec!["# Hello\n\nWorld".to_string()]);
//! ```

use std::collections::VecDeque;
use std::path::Path;

use crate::models::IndexedChunk;

/// Maximum chunk length for markdown files.
pub const CHUNK_SIZE: usize = 1000;

/// Characters carried over from the end of one chunk into the next.
pub const CHUNK_OVERLAP: usize = 200;

/// Separators tried in order, from most to least structural.
pub const MARKDOWN_SEPARATORS: &[&str] = &[
    "\n## ",
    "\n### ",
    "\n#### ",
    "\n##### ",
    "\n###### ",
    "```\n\n",
    "\n\n***\n\n",
    "\n\n---\n\n",
    "\n\n___\n\n",
    "\n\n",
    "\n",
    " ",
    "",
];

/// Produce the chunk set for one file.
///
/// `.md` files are split with [`split_markdown`] using [`CHUNK_SIZE`] and
/// [`CHUNK_OVERLAP`]; any other file yields exactly one chunk holding the
/// whole content. Every chunk's metadata `source` is `path`.
pub fn chunk_file(path: &Path, content: &str) -> Vec<IndexedChunk> {
    let source = path.to_string_lossy().to_string();
    if is_markdown(path) {
        split_markdown(content, CHUNK_SIZE, CHUNK_OVERLAP)
            .into_iter()
            .map(|text| IndexedChunk::new(text, source.clone()))
            .collect()
    } else {
        vec![IndexedChunk::new(content, source)]
    }
}

/// Returns true for files the chunker splits (`.md`).
pub fn is_markdown(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("md")
}

/// Split markdown text into overlapping chunks of at most `chunk_size`
/// characters (a single unsplittable piece may exceed it).
///
/// Whitespace-only chunks are never returned, so empty input yields an
/// empty vector.
pub fn split_markdown(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let mut chunks = split_recursive(text, MARKDOWN_SEPARATORS, chunk_size, overlap);
    chunks.retain(|c| !c.trim().is_empty());
    chunks
}

fn split_recursive(
    text: &str,
    separators: &[&'static str],
    chunk_size: usize,
    overlap: usize,
) -> Vec<String> {
    let (separator, remaining) = pick_separator(text, separators);

    let splits: Vec<String> = if separator.is_empty() {
        text.chars().map(String::from).collect()
    } else {
        text.split(separator)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    };

    let mut final_chunks = Vec::new();
    let mut good_splits: Vec<String> = Vec::new();

    for piece in splits {
        if char_len(&piece) < chunk_size {
            good_splits.push(piece);
            continue;
        }
        if !good_splits.is_empty() {
            final_chunks.extend(merge_splits(&good_splits, separator, chunk_size, overlap));
            good_splits.clear();
        }
        if remaining.is_empty() {
            final_chunks.push(piece);
        } else {
            final_chunks.extend(split_recursive(&piece, remaining, chunk_size, overlap));
        }
    }

    if !good_splits.is_empty() {
        final_chunks.extend(merge_splits(&good_splits, separator, chunk_size, overlap));
    }

    final_chunks
}

/// First separator present in `text`, plus the finer separators after it.
fn pick_separator<'a>(
    text: &str,
    separators: &'a [&'static str],
) -> (&'static str, &'a [&'static str]) {
    for (i, sep) in separators.iter().enumerate() {
        if sep.is_empty() {
            return (sep, &[]);
        }
        if text.contains(sep) {
            return (sep, separators.get(i + 1..).unwrap_or(&[]));
        }
    }
    (separators.last().copied().unwrap_or(""), &[])
}

fn merge_splits(
    splits: &[String],
    separator: &str,
    chunk_size: usize,
    overlap: usize,
) -> Vec<String> {
    let sep_len = char_len(separator);
    let mut docs = Vec::new();
    let mut current: VecDeque<&str> = VecDeque::new();
    let mut total = 0usize;

    for piece in splits {
        let len = char_len(piece);
        let joiner = if current.is_empty() { 0 } else { sep_len };

        if total + len + joiner > chunk_size && !current.is_empty() {
            if let Some(doc) = join_docs(&current, separator) {
                docs.push(doc);
            }
            // Drop from the front until only the overlap window remains and
            // the next piece fits.
            while total > overlap
                || (total > 0
                    && total + len + if current.is_empty() { 0 } else { sep_len } > chunk_size)
            {
                let Some(first) = current.pop_front() else {
                    break;
                };
                let dropped = char_len(first) + if current.is_empty() { 0 } else { sep_len };
                total = total.saturating_sub(dropped);
            }
        }

        current.push_back(piece);
        total += len + if current.len() > 1 { sep_len } else { 0 };
    }

    if let Some(doc) = join_docs(&current, separator) {
        docs.push(doc);
    }
    docs
}

fn join_docs(docs: &VecDeque<&str>, separator: &str) -> Option<String> {
    let joined = docs.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
