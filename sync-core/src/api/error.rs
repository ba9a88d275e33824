use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Remote object already exists: {0}")]
    AlreadyExists(String),

    #[error("Remote object not found: {0}")]
    NotFound(String),

    #[error("Remote prefix not found: {0}")]
    PrefixNotFound(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Remote store unavailable: {0}")]
    Unavailable(String),

    #[error("Request rejected: {status} - {message}")]
    Rejected { status: u16, message: String },

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Invalid remote path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Query encoding error: {0}")]
    QueryEncoding(#[from] serde_urlencoded::ser::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Local file error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Network(_) => true,
            StoreError::Unavailable(_) => true,
            StoreError::Rejected { status, .. } if *status >= 500 => true,
            _ => false,
        }
    }

    /// "Already exists" on upload and "not found" on delete are absorbed by
    /// callers as success.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    pub fn is_prefix_not_found(&self) -> bool {
        matches!(self, StoreError::PrefixNotFound(_))
    }

    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        StoreError::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
