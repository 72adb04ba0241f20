//! Error taxonomy for kb-index.
//!
//! Per-item failures (one unreadable file) are logged and skipped by the
//! callers; everything surfaced through [`KbError`] aborts the enclosing
//! operation.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Main error type for the kb-index library.
#[derive(Error, Debug)]
pub enum KbError {
    /// Bad or incomplete configuration (e.g. missing provider credential).
    #[error("Configuration error: {0}")]
    Config(String),

    /// A filesystem operation was denied.
    #[error("Permission denied: cannot {action} '{}'. Check that the current user has access to this path.", path.display())]
    Permission { action: String, path: PathBuf },

    /// Any other filesystem failure.
    #[error("IO error: cannot {action} '{}': {source}", path.display())]
    Io {
        action: String,
        path: PathBuf,
        source: io::Error,
    },

    /// A referenced entity does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The entity exists but is in the wrong state for the operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A caller-supplied value was rejected.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Network failure or non-success HTTP status while fetching a URL.
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// JSON (de)serialization of a persisted file failed.
    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        source: serde_json::Error,
    },

    /// Embedding provider or vector index failure.
    #[error(transparent)]
    Embedding(#[from] anyhow::Error),
}

impl KbError {
    /// Classify an I/O failure on `path`.
    ///
    /// `PermissionDenied` becomes [`KbError::Permission`] so it keeps its
    /// explicit message no matter how far it propagates.
    pub fn io(action: impl Into<String>, path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::PermissionDenied {
            KbError::Permission {
                action: action.into(),
                path: path.to_path_buf(),
            }
        } else {
            KbError::Io {
                action: action.into(),
                path: path.to_path_buf(),
                source,
            }
        }
    }

    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        KbError::Json {
            context: context.into(),
            source,
        }
    }

    pub fn is_permission(&self) -> bool {
        matches!(self, KbError::Permission { .. })
    }
}

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, KbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied_is_classified() {
        let err = KbError::io(
            "create directory",
            Path::new("/srv/kb/.faiss"),
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.is_permission());
        let msg = err.to_string();
        assert!(msg.contains("/srv/kb/.faiss"));
        assert!(msg.contains("create directory"));
    }

    #[test]
    fn test_other_io_errors_keep_source() {
        let err = KbError::io(
            "read",
            Path::new("/tmp/x"),
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        );
        assert!(!err.is_permission());
        assert!(err.to_string().contains("gone"));
    }
}
