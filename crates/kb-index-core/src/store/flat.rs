//! Exact nearest-neighbour index over squared L2 distance.
//!
//! Stores every vector alongside its chunk and scans them all on query.
//! Chunks are append-only: nothing here edits or removes an entry once
//! it has been added.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::embedding::squared_l2;
use crate::models::{IndexedChunk, SearchMatch};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    chunk: IndexedChunk,
    vector: Vec<f32>,
}

/// Flat (brute-force) vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatIndex {
    dims: usize,
    entries: Vec<Entry>,
}

impl FlatIndex {
    /// Build a new index from exactly these chunks and their vectors.
    ///
    /// The dimensionality is fixed by the first vector.
    pub fn from_vectors(chunks: Vec<IndexedChunk>, vectors: Vec<Vec<f32>>) -> Result<Self> {
        let dims = vectors
            .first()
            .map(Vec::len)
            .context("cannot create a vector index from zero vectors")?;
        let mut index = Self {
            dims,
            entries: Vec::with_capacity(chunks.len()),
        };
        index.add_vectors(chunks, vectors)?;
        Ok(index)
    }

    /// Append chunks and their vectors.
    ///
    /// Fails without modifying the index when the counts differ or any
    /// vector has the wrong dimensionality.
    pub fn add_vectors(&mut self, chunks: Vec<IndexedChunk>, vectors: Vec<Vec<f32>>) -> Result<()> {
        if chunks.len() != vectors.len() {
            bail!(
                "chunk/vector count mismatch: {} chunks, {} vectors",
                chunks.len(),
                vectors.len()
            );
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dims) {
            bail!(
                "vector dimension mismatch: index has {} dims, got {}",
                self.dims,
                bad.len()
            );
        }
        self.entries.extend(
            chunks
                .into_iter()
                .zip(vectors)
                .map(|(chunk, vector)| Entry { chunk, vector }),
        );
        Ok(())
    }

    /// Return up to `k` nearest entries, ordered by ascending distance.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<SearchMatch> {
        let mut scored: Vec<(f32, &Entry)> = self
            .entries
            .iter()
            .map(|e| (squared_l2(query, &e.vector), e))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        scored.truncate(k);
        scored
            .into_iter()
            .map(|(score, e)| SearchMatch {
                text: e.chunk.text.clone(),
                metadata: e.chunk.metadata.clone(),
                score,
            })
            .collect()
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize the whole index for persistence.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).context("failed to serialize vector index")
    }

    /// Restore an index written by [`FlatIndex::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let index: Self =
            serde_json::from_slice(bytes).context("failed to deserialize vector index")?;
        if let Some(bad) = index.entries.iter().find(|e| e.vector.len() != index.dims) {
            bail!(
                "corrupt vector index: entry has {} dims, index has {}",
                bad.vector.len(),
                index.dims
            );
        }
        Ok(index)
    }
}
