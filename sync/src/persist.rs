//! Durable map from local path to remote identifier

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::error::{Result, SyncError};

pub const PERSIST_HEADER: &str = "SiaSync Persistence";
pub const PERSIST_VERSION: &str = "v0.1.0";

#[derive(Debug, Serialize, Deserialize)]
struct PersistDocument {
    header: String,
    version: String,
    files: Vec<PersistedFile>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedFile {
    filename: PathBuf,
    remote_identifier: String,
}

/// Root-relative paths and the identifiers the store returned for them
#[derive(Debug, Clone)]
pub struct IdentifierMap {
    location: PathBuf,
    entries: BTreeMap<PathBuf, String>,
    dirty: bool,
}

impl IdentifierMap {
    /// Empty map that will be written to `location`
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
            entries: BTreeMap::new(),
            dirty: false,
        }
    }

    /// Load from `location`; a missing file is an empty map.
    pub async fn load(location: impl Into<PathBuf>) -> Result<Self> {
        let location = location.into();

        let contents = match fs::read_to_string(&location).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %location.display(), "No persistence file, starting empty");
                return Ok(Self::new(location));
            }
            Err(e) => {
                return Err(SyncError::persistence_error(
                    &location,
                    format!("Failed to read: {}", e),
                ))
            }
        };

        let document: PersistDocument = serde_json::from_str(&contents).map_err(|e| {
            SyncError::persistence_error(&location, format!("Malformed document: {}", e))
        })?;

        if document.header != PERSIST_HEADER {
            return Err(SyncError::persistence_error(
                &location,
                format!("Unexpected header '{}'", document.header),
            ));
        }
        if document.version != PERSIST_VERSION {
            return Err(SyncError::persistence_error(
                &location,
                format!("Unsupported version '{}'", document.version),
            ));
        }

        let entries = document
            .files
            .into_iter()
            .map(|file| (file.filename, file.remote_identifier))
            .collect();

        Ok(Self {
            location,
            entries,
            dirty: false,
        })
    }

    /// Rewrite the file atomically through a sibling temp file.
    pub async fn save(&mut self) -> Result<()> {
        let document = PersistDocument {
            header: PERSIST_HEADER.to_string(),
            version: PERSIST_VERSION.to_string(),
            files: self
                .entries
                .iter()
                .map(|(filename, remote_identifier)| PersistedFile {
                    filename: filename.clone(),
                    remote_identifier: remote_identifier.clone(),
                })
                .collect(),
        };
        let json = serde_json::to_string_pretty(&document)?;

        if let Some(parent) = self.location.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| {
                SyncError::persistence_error(parent, format!("Failed to create directory: {}", e))
            })?;
        }

        let mut staging = self.location.clone().into_os_string();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);

        fs::write(&staging, json).await.map_err(|e| {
            SyncError::persistence_error(&staging, format!("Failed to write: {}", e))
        })?;
        fs::rename(&staging, &self.location).await.map_err(|e| {
            SyncError::persistence_error(&self.location, format!("Failed to replace: {}", e))
        })?;

        self.dirty = false;
        Ok(())
    }

    /// Save only when entries changed since the last load or save
    pub async fn save_if_dirty(&mut self) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }
        self.save().await?;
        Ok(true)
    }

    pub fn insert(&mut self, relative: impl Into<PathBuf>, identifier: impl Into<String>) {
        let relative = relative.into();
        let identifier = identifier.into();
        if self.entries.get(&relative) != Some(&identifier) {
            self.entries.insert(relative, identifier);
            self.dirty = true;
        }
    }

    pub fn remove(&mut self, relative: &Path) -> Option<String> {
        let removed = self.entries.remove(relative);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    pub fn get(&self, relative: &Path) -> Option<&str> {
        self.entries.get(relative).map(String::as_str)
    }

    pub fn contains(&self, relative: &Path) -> bool {
        self.entries.contains_key(relative)
    }

    /// Paths with a recorded identifier
    pub fn paths(&self) -> HashSet<PathBuf> {
        self.entries.keys().cloned().collect()
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}
