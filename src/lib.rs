//! # kb-index
//!
//! Incremental semantic search over local knowledge-base directories, plus
//! a reviewed queue for pulling web pages into them.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  suggest/approve  ┌──────────────┐  reindex(kb)  ┌──────────────┐
//! │  CLI / tools │──────────────────▶│ UrlIngestor  │──────────────▶│ IndexManager │
//! │    (kb)      │                   │ pending.json │               │ faiss.index  │
//! └──────┬───────┘                   └──────────────┘               └──────▲───────┘
//!        │              update_index + similarity_search                   │
//!        └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML + environment configuration |
//! | [`embedding`] | Embedding provider selection (Hugging Face, Ollama, OpenAI) |
//! | [`error`] | Error taxonomy |
//! | [`hash_store`] | Per-file content hashes for change detection |
//! | [`knowledge_base`] | Knowledge-base discovery and file enumeration |
//! | [`index_manager`] | Vector index lifecycle: initialize, update, search |
//! | [`ingest`] | URL suggestion, review, fetch, and conversion |
//! | [`render`] | Plain-text rendering of results for the CLI |

pub mod config;
pub mod embedding;
pub mod error;
pub mod hash_store;
pub mod index_manager;
pub mod ingest;
pub mod knowledge_base;
pub mod render;

pub use error::{KbError, Result};
pub use kb_index_core::embedding::{Embedder, ModelIdentity};
pub use kb_index_core::models::{ChunkMetadata, IndexedChunk, SearchMatch};
