//! Persisted list of suggested URLs.
//!
//! The whole list lives in one JSON file, rewritten wholesale on every
//! mutation; the file is the only source of truth. A missing file is an
//! empty list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::error::{KbError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A URL someone suggested adding to a knowledge base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingUrlRequest {
    pub id: String,
    pub url: String,
    pub knowledge_base: String,
    pub reason: String,
    pub suggested_at: DateTime<Utc>,
    pub status: RequestStatus,
}

/// Read-modify-write access to the pending URL file.
pub struct PendingStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl PendingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the full list in file order.
    pub async fn load(&self) -> Result<Vec<PendingUrlRequest>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(KbError::io("read pending URL file", &self.path, e)),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).map_err(|e| {
            KbError::json(format!("parse pending URL file {}", self.path.display()), e)
        })
    }

    /// Apply `f` to the current list and persist the result.
    ///
    /// Nothing is written when `f` fails. Updates are serialized within the
    /// process.
    pub async fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<PendingUrlRequest>) -> Result<T>,
    {
        let _guard = self.write_lock.lock().await;
        let mut list = self.load().await?;
        let out = f(&mut list)?;
        self.save(&list).await?;
        Ok(out)
    }

    async fn save(&self, list: &[PendingUrlRequest]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| KbError::io("create directory for pending URL file", parent, e))?;
        }
        let json = serde_json::to_string_pretty(list)
            .map_err(|e| KbError::json("serialize pending URL list", e))?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| KbError::io("write pending URL file", &self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn request(id: &str) -> PendingUrlRequest {
        PendingUrlRequest {
            id: id.to_string(),
            url: format!("https://example.com/{}", id),
            knowledge_base: "kb1".to_string(),
            reason: "useful".to_string(),
            suggested_at: Utc::now(),
            status: RequestStatus::Pending,
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = PendingStore::new(tmp.path().join("pending.json"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_persists_in_order() {
        let tmp = TempDir::new().unwrap();
        let store = PendingStore::new(tmp.path().join("nested/pending.json"));
        store
            .update(|list| {
                list.push(request("a"));
                list.push(request("b"));
                Ok(())
            })
            .await
            .unwrap();

        let ids: Vec<String> = store.load().await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json[0]["status"], "pending");
        assert_eq!(json[0]["knowledge_base"], "kb1");
        assert!(json[0]["suggested_at"].is_string());
    }

    #[tokio::test]
    async fn test_failed_update_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let store = PendingStore::new(tmp.path().join("pending.json"));
        let result: Result<()> = store
            .update(|list| {
                list.push(request("a"));
                Err(KbError::InvalidState("nope".into()))
            })
            .await;
        assert!(result.is_err());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_json_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("pending.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = PendingStore::new(path).load().await.unwrap_err();
        assert!(matches!(err, KbError::Json { .. }));
    }
}
