//! Error types for the sync engine library

use std::path::PathBuf;

use siasync_core::StoreError;

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Comprehensive error type for sync operations
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Path-related errors
    #[error("Path error at '{path}': {message}")]
    Path { path: PathBuf, message: String },

    /// Fingerprint computation errors
    #[error("Fingerprint error for '{path}': {source}")]
    Fingerprint {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory scanning errors
    #[error("Directory scan error at '{path}': {message}")]
    DirectoryScan { path: PathBuf, message: String },

    /// Remote store errors
    #[error("Remote store error for '{path}': {source}")]
    Store {
        path: PathBuf,
        #[source]
        source: StoreError,
    },

    /// Remote listing failed for a reason other than an unused prefix
    #[error("Remote listing of '{prefix}' failed: {source}")]
    RemoteListing {
        prefix: String,
        #[source]
        source: StoreError,
    },

    /// Watch backend errors
    #[error("Watch error at '{path}': {message}")]
    Watch { path: PathBuf, message: String },

    /// Persistence file errors
    #[error("Persistence error at '{path}': {message}")]
    Persistence { path: PathBuf, message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The watcher task ended abnormally
    #[error("Watcher task failed: {0}")]
    Task(String),
}

impl SyncError {
    /// Create a new path error
    pub fn path_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Path {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new fingerprint error
    pub fn fingerprint_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Fingerprint {
            path: path.into(),
            source,
        }
    }

    /// Create a new directory scan error
    pub fn scan_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::DirectoryScan {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new remote store error
    pub fn store_error(path: impl Into<PathBuf>, source: StoreError) -> Self {
        Self::Store {
            path: path.into(),
            source,
        }
    }

    /// Create a new watch error
    pub fn watch_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Watch {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new persistence error
    pub fn persistence_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Persistence {
            path: path.into(),
            message: message.into(),
        }
    }

    /// The file disappeared between discovery and use
    pub fn is_vanished(&self) -> bool {
        match self {
            Self::Fingerprint { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            Self::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Per-item failures that are logged and skipped rather than aborting a
    /// pass or the watcher loop
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            Self::Fingerprint { .. } | Self::Store { .. } | Self::Path { .. } | Self::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_vanished_file_is_soft() {
        let err = SyncError::fingerprint_error("a.txt", io::Error::from(io::ErrorKind::NotFound));
        assert!(err.is_vanished());
        assert!(err.is_soft());
    }

    #[test]
    fn test_listing_failure_is_fatal() {
        let err = SyncError::RemoteListing {
            prefix: "siasync".to_string(),
            source: StoreError::Unavailable("down".to_string()),
        };
        assert!(!err.is_soft());
        assert!(!err.is_vanished());
    }

    #[test]
    fn test_display_includes_path() {
        let err = SyncError::store_error("docs/a.txt", StoreError::NotFound("x".to_string()));
        assert!(err.to_string().contains("docs/a.txt"));
    }
}
