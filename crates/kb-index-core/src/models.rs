//! Data types that flow between the chunker, the vector index, and search.

use serde::{Deserialize, Serialize};

/// Metadata attached to every indexed chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Absolute path of the file the chunk was cut from.
    pub source: String,
}

/// The unit that is embedded and stored in the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl IndexedChunk {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: ChunkMetadata {
                source: source.into(),
            },
        }
    }
}

/// A nearest-neighbour match returned from the vector index.
///
/// `score` is the raw distance reported by the index: lower is more similar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMatch {
    pub text: String,
    pub metadata: ChunkMetadata,
    pub score: f32,
}
