//! Index lifecycle management.
//!
//! [`IndexManager`] owns the vector index handle and keeps it in sync with
//! the knowledge-base tree:
//!
//! ```text
//! initialize()          create index dir → check model identity → load index
//! update_index(kb?)     for each file: hash → compare record → chunk → embed → add → save → write record
//! similarity_search()   embed query → k nearest → filter by distance threshold
//! ```
//!
//! Change detection is per file: a file is re-embedded only when its
//! SHA-256 differs from the record written after its last successful
//! indexing. The record is written after the index is saved, so a crash
//! in between re-indexes the file on the next run instead of losing it.
//!
//! Re-indexing a changed file appends its new chunks; chunks embedded from
//! the previous content stay in the index.

use async_trait::async_trait;
use kb_index_core::chunk::chunk_file;
use kb_index_core::embedding::Embedder;
use kb_index_core::models::{IndexedChunk, SearchMatch};
use kb_index_core::store::FlatIndex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, OnceCell};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{KbError, Result};
use crate::hash_store::{digest_bytes, HashStore};
use crate::ingest::Reindexer;
use crate::knowledge_base::{collect_files, list_knowledge_bases, validate_name};

/// File name of the persisted vector index inside the index directory.
pub const INDEX_FILE: &str = "faiss.index";

/// File holding the model identity the persisted index was built with.
pub const MODEL_NAME_FILE: &str = "model_name.txt";

/// Distance cut-off applied when the caller does not supply one.
pub const DEFAULT_THRESHOLD: f32 = 2.0;

/// What a single [`IndexManager::update_index`] call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    /// Files visited across all scanned knowledge bases.
    pub files_scanned: usize,
    /// Files whose new content was embedded and recorded.
    pub files_changed: usize,
    /// Files whose digest matched their record.
    pub files_skipped: usize,
    /// Files that could not be read and were left for the next run.
    pub files_failed: usize,
    pub chunks_added: usize,
    /// Number of times the index was written to disk.
    pub saves: usize,
    /// True when the full-rebuild fallback ran.
    pub rebuilt: bool,
}

pub struct IndexManager {
    kb_root: PathBuf,
    index_dir: PathBuf,
    embedder: Arc<dyn Embedder>,
    store: Option<FlatIndex>,
}

impl IndexManager {
    pub fn new(
        kb_root: impl Into<PathBuf>,
        index_dir: impl Into<PathBuf>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            kb_root: kb_root.into(),
            index_dir: index_dir.into(),
            embedder,
            store: None,
        }
    }

    pub fn from_config(config: &Config, embedder: Arc<dyn Embedder>) -> Self {
        Self::new(
            config.paths.knowledge_bases_root.clone(),
            config.paths.index_dir(),
            embedder,
        )
    }

    pub fn kb_root(&self) -> &Path {
        &self.kb_root
    }

    pub fn index_file(&self) -> PathBuf {
        self.index_dir.join(INDEX_FILE)
    }

    pub fn model_name_file(&self) -> PathBuf {
        self.index_dir.join(MODEL_NAME_FILE)
    }

    /// True once an index exists in memory.
    pub fn has_index(&self) -> bool {
        self.store.is_some()
    }

    pub fn chunk_count(&self) -> usize {
        self.store.as_ref().map_or(0, FlatIndex::len)
    }

    /// Prepare the index directory and load any compatible persisted index.
    ///
    /// When the persisted model identity differs from the live one, the
    /// persisted index is deleted: vectors from different models are not
    /// comparable. The live identity is always written back.
    pub async fn initialize(&mut self) -> Result<()> {
        tokio::fs::create_dir_all(&self.index_dir)
            .await
            .map_err(|e| KbError::io("create index directory", &self.index_dir, e))?;

        let live = self.embedder.identity().to_string();
        let model_file = self.model_name_file();
        let index_file = self.index_file();

        let mut invalidated = false;
        if let Some(previous) = read_optional(&model_file, "read model name file").await? {
            let previous = previous.trim();
            if previous != live {
                info!(previous, current = %live, "embedding model changed; discarding vector index");
                remove_if_exists(&index_file, "delete stale vector index").await?;
                self.store = None;
                invalidated = true;
            }
        }

        if !invalidated && exists(&index_file).await? {
            let bytes = tokio::fs::read(&index_file)
                .await
                .map_err(|e| KbError::io("load vector index", &index_file, e))?;
            let store = FlatIndex::from_bytes(&bytes).map_err(|e| {
                KbError::io(
                    "load vector index",
                    &index_file,
                    std::io::Error::new(std::io::ErrorKind::InvalidData, format!("{:#}", e)),
                )
            })?;
            info!(chunks = store.len(), path = %index_file.display(), "loaded vector index");
            self.store = Some(store);
        } else if !invalidated {
            debug!(path = %index_file.display(), "no vector index on disk yet");
        }

        tokio::fs::write(&model_file, &live)
            .await
            .map_err(|e| KbError::io("write model name file", &model_file, e))?;
        Ok(())
    }

    /// Bring the index up to date with one knowledge base, or all of them.
    ///
    /// Unreadable files are logged and skipped. Embedding failures and
    /// failures to save the index or write hash records abort the scan.
    pub async fn update_index(&mut self, knowledge_base: Option<&str>) -> Result<UpdateReport> {
        let names = match knowledge_base {
            Some(name) => {
                validate_name(name)?;
                if !self.kb_root.join(name).is_dir() {
                    return Err(KbError::NotFound(format!(
                        "knowledge base '{}' does not exist under {}",
                        name,
                        self.kb_root.display()
                    )));
                }
                vec![name.to_string()]
            }
            None => list_knowledge_bases(&self.kb_root)?,
        };

        let mut report = UpdateReport::default();
        let mut scanned = Vec::with_capacity(names.len());

        for name in names {
            let kb_dir = self.kb_root.join(&name);
            let hashes = HashStore::new(&kb_dir);
            for file in collect_files(&kb_dir) {
                report.files_scanned += 1;
                self.sync_file(&hashes, &file, &mut report).await?;
            }
            scanned.push(kb_dir);
        }

        if report.files_scanned > 0 && self.store.is_none() {
            // Every file matched its record but there is no index: the index
            // file was removed while the hash records survived.
            self.rebuild(&scanned, &mut report).await?;
        }

        info!(
            scanned = report.files_scanned,
            changed = report.files_changed,
            skipped = report.files_skipped,
            failed = report.files_failed,
            chunks = report.chunks_added,
            rebuilt = report.rebuilt,
            "index update finished"
        );
        Ok(report)
    }

    async fn sync_file(
        &mut self,
        hashes: &HashStore,
        file: &Path,
        report: &mut UpdateReport,
    ) -> Result<()> {
        let bytes = match tokio::fs::read(file).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(file = %file.display(), error = %e, "skipping unreadable file");
                report.files_failed += 1;
                return Ok(());
            }
        };
        let digest = digest_bytes(&bytes);

        hashes.ensure_parent(file).await?;
        if hashes.read(file).await?.as_deref() == Some(digest.as_str()) {
            debug!(file = %file.display(), "unchanged");
            report.files_skipped += 1;
            return Ok(());
        }

        let content = String::from_utf8_lossy(&bytes);
        let chunks = chunk_file(file, &content);
        if chunks.is_empty() {
            debug!(file = %file.display(), "no chunks produced");
            return Ok(());
        }

        let added = self.add_chunks(chunks).await?;
        self.save().await?;
        report.saves += 1;
        hashes.write(file, &digest).await?;

        report.files_changed += 1;
        report.chunks_added += added;
        info!(file = %file.display(), chunks = added, "indexed file");
        Ok(())
    }

    /// Embed `chunks` and add them, creating the index on first use.
    async fn add_chunks(&mut self, chunks: Vec<IndexedChunk>) -> Result<usize> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_documents(&texts).await?;
        let added = chunks.len();
        match self.store.as_mut() {
            Some(store) => store.add_vectors(chunks, vectors)?,
            None => self.store = Some(FlatIndex::from_vectors(chunks, vectors)?),
        }
        Ok(added)
    }

    /// Re-chunk every file in `kb_dirs` into one new index and save it once.
    ///
    /// Hash records are left as they are.
    async fn rebuild(&mut self, kb_dirs: &[PathBuf], report: &mut UpdateReport) -> Result<()> {
        warn!("vector index missing while all files are unchanged; rebuilding from scratch");

        let mut chunks = Vec::new();
        for dir in kb_dirs {
            for file in collect_files(dir) {
                match tokio::fs::read(&file).await {
                    Ok(bytes) => chunks.extend(chunk_file(&file, &String::from_utf8_lossy(&bytes))),
                    Err(e) => {
                        warn!(file = %file.display(), error = %e, "skipping unreadable file during rebuild")
                    }
                }
            }
        }
        if chunks.is_empty() {
            return Ok(());
        }

        let added = self.add_chunks(chunks).await?;
        self.save().await?;
        report.saves += 1;
        report.chunks_added += added;
        report.rebuilt = true;
        Ok(())
    }

    /// Write the in-memory index to disk via a temp file and rename.
    async fn save(&self) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        tokio::fs::create_dir_all(&self.index_dir)
            .await
            .map_err(|e| KbError::io("create index directory", &self.index_dir, e))?;

        let bytes = store.to_bytes()?;
        let path = self.index_file();
        let tmp = self.index_dir.join(format!("{}.tmp", INDEX_FILE));
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| KbError::io("save vector index", &tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| KbError::io("save vector index", &path, e))
    }

    /// Up to `k` nearest chunks with distance ≤ `threshold` (default
    /// [`DEFAULT_THRESHOLD`]), most similar first.
    pub async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        threshold: Option<f32>,
    ) -> Result<Vec<SearchMatch>> {
        let store = self.store.as_ref().ok_or_else(|| {
            KbError::NotFound("vector index is not initialized; nothing has been indexed yet".into())
        })?;
        let query_vec = self.embedder.embed_query(query).await?;
        let threshold = threshold.unwrap_or(DEFAULT_THRESHOLD);
        Ok(store
            .search(&query_vec, k)
            .into_iter()
            .filter(|m| m.score <= threshold)
            .collect())
    }
}

async fn read_optional(path: &Path, action: &str) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(KbError::io(action, path, e)),
    }
}

async fn remove_if_exists(path: &Path, action: &str) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(KbError::io(action, path, e)),
    }
}

async fn exists(path: &Path) -> Result<bool> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| KbError::io("check for", path, e))
}

/// Shared, serialized access to one [`IndexManager`].
///
/// The mutex is the single-writer queue: overlapping `update_index` calls
/// wait for each other instead of racing on the index handle.
#[derive(Clone)]
pub struct IndexHandle {
    inner: Arc<Mutex<IndexManager>>,
}

impl IndexHandle {
    pub fn new(manager: IndexManager) -> Self {
        Self {
            inner: Arc::new(Mutex::new(manager)),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, IndexManager> {
        self.inner.lock().await
    }
}

#[async_trait]
impl Reindexer for IndexHandle {
    async fn reindex(&self, knowledge_base: &str) -> Result<()> {
        self.lock().await.update_index(Some(knowledge_base)).await?;
        Ok(())
    }
}

type ManagerFactory = Box<dyn Fn() -> Result<IndexManager> + Send + Sync>;

/// An [`IndexHandle`] that is built and initialized on first use.
///
/// Callers that never reindex never construct an embedder or touch the
/// index directory.
pub struct LazyIndexHandle {
    open: ManagerFactory,
    handle: OnceCell<IndexHandle>,
}

impl LazyIndexHandle {
    pub fn new(open: impl Fn() -> Result<IndexManager> + Send + Sync + 'static) -> Self {
        Self {
            open: Box::new(open),
            handle: OnceCell::new(),
        }
    }

    /// True once the underlying index has been opened.
    pub fn is_open(&self) -> bool {
        self.handle.initialized()
    }

    pub async fn get(&self) -> Result<&IndexHandle> {
        self.handle
            .get_or_try_init(|| async {
                let mut manager = (self.open)()?;
                manager.initialize().await?;
                Ok::<_, KbError>(IndexHandle::new(manager))
            })
            .await
    }
}

#[async_trait]
impl Reindexer for LazyIndexHandle {
    async fn reindex(&self, knowledge_base: &str) -> Result<()> {
        self.get().await?.reindex(knowledge_base).await
    }
}
