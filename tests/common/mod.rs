//! Shared test doubles for the integration tests.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use kb_index::ingest::{Fetcher, Reindexer};
use kb_index::{Embedder, KbError, ModelIdentity};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Embeds text as keyword presence: dimension `i` is 1.0 when the text
/// contains `keywords[i]` (case-insensitive), else 0.0.
pub struct KeywordEmbedder {
    identity: ModelIdentity,
    keywords: Vec<&'static str>,
    pub document_calls: AtomicUsize,
    pub embedded: Mutex<Vec<String>>,
}

impl KeywordEmbedder {
    pub fn new(model: &str) -> Arc<Self> {
        Arc::new(Self {
            identity: ModelIdentity::new("fake", model),
            keywords: vec!["rust", "python", "deploy", "hello"],
            document_calls: AtomicUsize::new(0),
            embedded: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.document_calls.load(Ordering::SeqCst)
    }

    pub fn embedded_texts(&self) -> Vec<String> {
        self.embedded.lock().unwrap().clone()
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        self.keywords
            .iter()
            .map(|k| if lower.contains(k) { 1.0 } else { 0.0 })
            .collect()
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn identity(&self) -> ModelIdentity {
        self.identity.clone()
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.document_calls.fetch_add(1, Ordering::SeqCst);
        self.embedded.lock().unwrap().extend(texts.iter().cloned());
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vectorize(text))
    }
}

/// Serves canned HTML per URL; unknown URLs fail like an HTTP 404.
#[derive(Default)]
pub struct StaticFetcher {
    pages: HashMap<String, String>,
    pub calls: AtomicUsize,
}

impl StaticFetcher {
    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> kb_index::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| KbError::Fetch(format!("failed to fetch {}: HTTP 404 Not Found", url)))
    }
}

/// Records every knowledge base it is asked to reindex.
#[derive(Default)]
pub struct RecordingReindexer {
    pub calls: Mutex<Vec<String>>,
}

impl RecordingReindexer {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Reindexer for RecordingReindexer {
    async fn reindex(&self, knowledge_base: &str) -> kb_index::Result<()> {
        self.calls.lock().unwrap().push(knowledge_base.to_string());
        Ok(())
    }
}

pub fn write_file(root: &Path, relative: &str, content: &str) -> PathBuf {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, content).unwrap();
    path
}

pub fn sha256_hex(content: &str) -> String {
    kb_index::hash_store::digest_bytes(content.as_bytes())
}
