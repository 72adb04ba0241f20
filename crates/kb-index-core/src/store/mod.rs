//! Vector index abstraction for kb-index.
//!
//! The index stores one vector per [`IndexedChunk`](crate::models::IndexedChunk)
//! and answers nearest-neighbour queries with distances. Persistence is
//! byte-oriented so the app crate owns all file I/O.

pub mod flat;

pub use flat::FlatIndex;
