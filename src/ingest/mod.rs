//! URL ingestion: suggest → approve/reject → fetch → convert → index.
//!
//! Suggested URLs wait in a [`PendingStore`] until someone approves or
//! rejects them. Approval fetches the page, converts it to Markdown, writes
//! it into the target knowledge base, and asks the injected [`Reindexer`]
//! to refresh that one knowledge base. [`UrlIngestor::add_direct`] runs
//! the same fetch → write → reindex path without a pending record.
//!
//! ```text
//! suggest ──▶ pending ──approve──▶ approved (kept, immutable)
//!                │
//!                └──reject──▶ (removed from the list)
//! ```
//!
//! Approval is all-or-nothing up to the file write: a failed fetch,
//! conversion, or write leaves the request `pending`.

pub mod convert;
pub mod fetch;
pub mod pending;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{KbError, Result};
use crate::knowledge_base::validate_name;

pub use convert::{convert_html, render_document, url_to_filename, Converted};
pub use fetch::{Fetcher, HttpFetcher};
pub use pending::{PendingStore, PendingUrlRequest, RequestStatus};

/// Capability to refresh the search index for one knowledge base.
///
/// Handed to [`UrlIngestor`] at construction so ingestion never holds a
/// reference back into the indexer's owner.
#[async_trait]
pub trait Reindexer: Send + Sync {
    async fn reindex(&self, knowledge_base: &str) -> Result<()>;
}

/// A page written into a knowledge base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestedDocument {
    pub url: String,
    pub knowledge_base: String,
    pub title: String,
    pub path: PathBuf,
}

pub struct UrlIngestor {
    kb_root: PathBuf,
    pending: PendingStore,
    fetcher: Arc<dyn Fetcher>,
    reindexer: Arc<dyn Reindexer>,
    max_filename_len: usize,
}

impl UrlIngestor {
    pub fn new(
        kb_root: impl Into<PathBuf>,
        pending_file: impl Into<PathBuf>,
        fetcher: Arc<dyn Fetcher>,
        reindexer: Arc<dyn Reindexer>,
    ) -> Self {
        Self {
            kb_root: kb_root.into(),
            pending: PendingStore::new(pending_file),
            fetcher,
            reindexer,
            max_filename_len: 100,
        }
    }

    pub fn from_config(
        config: &Config,
        fetcher: Arc<dyn Fetcher>,
        reindexer: Arc<dyn Reindexer>,
    ) -> Self {
        Self::new(
            config.paths.knowledge_bases_root.clone(),
            config.paths.pending_urls_file(),
            fetcher,
            reindexer,
        )
        .with_max_filename_len(config.ingest.max_filename_len)
    }

    pub fn with_max_filename_len(mut self, max_len: usize) -> Self {
        self.max_filename_len = max_len;
        self
    }

    /// Queue `url` for review.
    pub async fn suggest(
        &self,
        url: &str,
        knowledge_base: &str,
        reason: &str,
    ) -> Result<PendingUrlRequest> {
        let request = PendingUrlRequest {
            id: Uuid::new_v4().to_string(),
            url: url.to_string(),
            knowledge_base: knowledge_base.to_string(),
            reason: reason.to_string(),
            suggested_at: Utc::now(),
            status: RequestStatus::Pending,
        };
        let stored = request.clone();
        self.pending
            .update(move |list| {
                list.push(stored);
                Ok(())
            })
            .await?;
        info!(id = %request.id, url, knowledge_base, "URL suggested");
        Ok(request)
    }

    /// All requests still awaiting review, in file order.
    pub async fn list_pending(&self) -> Result<Vec<PendingUrlRequest>> {
        Ok(self
            .pending
            .load()
            .await?
            .into_iter()
            .filter(|r| r.status == RequestStatus::Pending)
            .collect())
    }

    /// Look up a request by id, whatever its status.
    pub async fn get(&self, id: &str) -> Result<Option<PendingUrlRequest>> {
        Ok(self.pending.load().await?.into_iter().find(|r| r.id == id))
    }

    /// Fetch and index a pending request, then mark it approved.
    ///
    /// # Errors
    ///
    /// - [`KbError::NotFound`] if no request has this id.
    /// - [`KbError::InvalidState`] if the request is not `pending`.
    /// - Fetch, conversion, or write failures, leaving the request `pending`.
    /// - Reindex failures, after the request was marked approved.
    pub async fn approve(&self, id: &str) -> Result<IngestedDocument> {
        let request = self
            .get(id)
            .await?
            .ok_or_else(|| KbError::NotFound(format!("no URL request with id '{}'", id)))?;
        ensure_pending(&request)?;

        let document = self.write_document(&request.url, &request.knowledge_base).await?;

        self.pending
            .update(|list| {
                let entry = list
                    .iter_mut()
                    .find(|r| r.id == id)
                    .ok_or_else(|| KbError::NotFound(format!("no URL request with id '{}'", id)))?;
                ensure_pending(entry)?;
                entry.status = RequestStatus::Approved;
                Ok(())
            })
            .await?;
        info!(id, path = %document.path.display(), "URL approved");

        self.reindexer.reindex(&request.knowledge_base).await?;
        Ok(document)
    }

    /// Remove a request from the list entirely.
    pub async fn reject(&self, id: &str) -> Result<PendingUrlRequest> {
        let removed = self
            .pending
            .update(|list| {
                let position = list
                    .iter()
                    .position(|r| r.id == id)
                    .ok_or_else(|| KbError::NotFound(format!("no URL request with id '{}'", id)))?;
                Ok(list.remove(position))
            })
            .await?;
        info!(id, url = %removed.url, "URL rejected");
        Ok(removed)
    }

    /// Fetch, write, and index `url` without a review step.
    pub async fn add_direct(&self, url: &str, knowledge_base: &str) -> Result<IngestedDocument> {
        let document = self.write_document(url, knowledge_base).await?;
        info!(url, path = %document.path.display(), "URL added directly");
        self.reindexer.reindex(knowledge_base).await?;
        Ok(document)
    }

    async fn write_document(&self, url: &str, knowledge_base: &str) -> Result<IngestedDocument> {
        validate_name(knowledge_base)?;

        let html = self.fetcher.fetch(url).await?;
        let converted = convert_html(&html)?;
        let title = if converted.title.is_empty() {
            url.to_string()
        } else {
            converted.title
        };

        let kb_dir = self.kb_root.join(knowledge_base);
        tokio::fs::create_dir_all(&kb_dir)
            .await
            .map_err(|e| KbError::io("create knowledge base directory", &kb_dir, e))?;

        let path = kb_dir.join(url_to_filename(url, self.max_filename_len));
        let body = render_document(url, &title, Utc::now(), &converted.markdown);
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| KbError::io("write fetched document", &path, e))?;

        Ok(IngestedDocument {
            url: url.to_string(),
            knowledge_base: knowledge_base.to_string(),
            title,
            path,
        })
    }
}

fn ensure_pending(request: &PendingUrlRequest) -> Result<()> {
    if request.status == RequestStatus::Pending {
        Ok(())
    } else {
        Err(KbError::InvalidState(format!(
            "URL request '{}' is {}; only pending requests can be approved",
            request.id, request.status
        )))
    }
}
