//! # kb-index core
//!
//! Shared, I/O-free logic for kb-index: chunk models, the markdown
//! chunker, the embedding capability trait, and the flat vector index.
//!
//! This crate contains no tokio, filesystem, or network dependencies.
//! Persistence and provider clients live in the `kb-index` app crate.

pub mod chunk;
pub mod embedding;
pub mod models;
pub mod store;
