//! Per-file content-hash records used for change detection.
//!
//! Each content file `<kb>/<rel>` has a record at `<kb>/.index/<rel>`
//! holding the hex SHA-256 of the bytes that were last indexed
//! successfully. A record that disagrees with the file's current digest
//! means "changed"; a missing record means "never indexed".

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::error::{KbError, Result};

/// Name of the hidden directory that mirrors a knowledge base's tree.
pub const HASH_DIR: &str = ".index";

/// Hash records for one knowledge base directory.
#[derive(Debug, Clone)]
pub struct HashStore {
    kb_dir: PathBuf,
}

impl HashStore {
    pub fn new(kb_dir: impl Into<PathBuf>) -> Self {
        Self {
            kb_dir: kb_dir.into(),
        }
    }

    /// Mirrored record path for `file`, which must live under the knowledge base.
    pub fn record_path(&self, file: &Path) -> Result<PathBuf> {
        let relative = file.strip_prefix(&self.kb_dir).map_err(|_| {
            KbError::InvalidInput(format!(
                "{} is not inside knowledge base {}",
                file.display(),
                self.kb_dir.display()
            ))
        })?;
        Ok(self.kb_dir.join(HASH_DIR).join(relative))
    }

    /// Previously recorded digest for `file`, or `None` if never indexed.
    ///
    /// An unreadable record is treated as absent.
    pub async fn read(&self, file: &Path) -> Result<Option<String>> {
        let record = self.record_path(file)?;
        match tokio::fs::read_to_string(&record).await {
            Ok(digest) => Ok(Some(digest.trim().to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => {
                tracing::warn!(path = %record.display(), error = %e, "ignoring unreadable hash record");
                Ok(None)
            }
        }
    }

    /// Create the record's parent directory if it does not exist yet.
    pub async fn ensure_parent(&self, file: &Path) -> Result<()> {
        let record = self.record_path(file)?;
        if let Some(parent) = record.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| KbError::io("create hash directory", parent, e))?;
        }
        Ok(())
    }

    /// Record `digest` as the last indexed version of `file`.
    pub async fn write(&self, file: &Path, digest: &str) -> Result<()> {
        self.ensure_parent(file).await?;
        let record = self.record_path(file)?;
        tokio::fs::write(&record, digest)
            .await
            .map_err(|e| KbError::io("write hash record", &record, e))
    }
}

/// Hex SHA-256 of `bytes`.
pub fn digest_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_record_path_mirrors_tree() {
        let store = HashStore::new("/kbs/docs");
        let record = store
            .record_path(Path::new("/kbs/docs/guides/setup.md"))
            .unwrap();
        assert_eq!(record, PathBuf::from("/kbs/docs/.index/guides/setup.md"));
    }

    #[test]
    fn test_record_path_rejects_outside_file() {
        let store = HashStore::new("/kbs/docs");
        assert!(store.record_path(Path::new("/etc/passwd")).is_err());
    }

    #[test]
    fn test_digest_is_hex_sha256() {
        let digest = digest_bytes(b"abc");
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(digest.len(), 64);
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let tmp = TempDir::new().unwrap();
        let kb = tmp.path().join("kb1");
        std::fs::create_dir_all(kb.join("nested")).unwrap();
        let file = kb.join("nested/a.md");
        std::fs::write(&file, "hello").unwrap();

        let store = HashStore::new(&kb);
        assert_eq!(store.read(&file).await.unwrap(), None);

        let digest = digest_bytes(b"hello");
        store.write(&file, &digest).await.unwrap();
        assert_eq!(store.read(&file).await.unwrap(), Some(digest));
        assert!(kb.join(".index/nested/a.md").is_file());
    }
}
