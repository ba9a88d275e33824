//! In-memory remote store.
//!
//! Behaves like the renter for the conditions the sync engine cares about:
//! uploading onto an existing path fails with `AlreadyExists`, deleting an
//! unknown path fails with `NotFound`, and listing a prefix that never held
//! a file fails with `PrefixNotFound`. Failures can be injected and every
//! call is counted, which makes it the store double for engine tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::api::error::{Result, StoreError};
use crate::path::RemotePath;
use crate::store::{Redundancy, RemoteObject, RemoteStore, UploadReceipt};

/// Call counters, including calls that failed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub uploads: usize,
    pub failed_uploads: usize,
    pub deletes: usize,
    pub lists: usize,
    pub exists_probes: usize,
}

#[derive(Debug, Default)]
struct MemoryState {
    objects: BTreeMap<RemotePath, RemoteObject>,
    directories: BTreeSet<RemotePath>,
    stats: StoreStats,
    failing_uploads: usize,
    failing_deletes: usize,
    failing_lists: usize,
    next_identifier: u64,
}

/// Remote store kept entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    issue_identifiers: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return an opaque identifier from every upload, like a content-addressed store
    pub fn with_identifiers() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            issue_identifiers: true,
        }
    }

    /// Place an object directly, bypassing the upload counters
    pub fn insert_object(&self, object: RemoteObject) -> Result<()> {
        let mut state = self.lock()?;
        register_parents(&mut state.directories, &object.path)?;
        state.objects.insert(object.path.clone(), object);
        Ok(())
    }

    /// Fail the next `count` uploads with a transient error
    pub fn fail_next_uploads(&self, count: usize) -> Result<()> {
        self.lock()?.failing_uploads = count;
        Ok(())
    }

    /// Fail the next `count` deletes with a transient error
    pub fn fail_next_deletes(&self, count: usize) -> Result<()> {
        self.lock()?.failing_deletes = count;
        Ok(())
    }

    /// Fail the next `count` listings with a transient error
    pub fn fail_next_lists(&self, count: usize) -> Result<()> {
        self.lock()?.failing_lists = count;
        Ok(())
    }

    pub fn stats(&self) -> StoreStats {
        self.lock().map(|state| state.stats).unwrap_or_default()
    }

    pub fn reset_stats(&self) {
        if let Ok(mut state) = self.lock() {
            state.stats = StoreStats::default();
        }
    }

    pub fn object(&self, path: &RemotePath) -> Option<RemoteObject> {
        self.lock().ok()?.objects.get(path).cloned()
    }

    pub fn paths(&self) -> Vec<RemotePath> {
        self.lock()
            .map(|state| state.objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

fn register_parents(directories: &mut BTreeSet<RemotePath>, path: &RemotePath) -> Result<()> {
    let segments: Vec<&str> = path.as_str().split(crate::path::SEPARATOR).collect();
    for end in 1..segments.len() {
        directories.insert(RemotePath::new(segments[..end].join("/"))?);
    }
    Ok(())
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn upload(
        &self,
        local: &Path,
        destination: &RemotePath,
        _redundancy: Redundancy,
    ) -> Result<UploadReceipt> {
        let metadata = tokio::fs::metadata(local).await?;

        let mut state = self.lock()?;
        state.stats.uploads += 1;

        if state.failing_uploads > 0 {
            state.failing_uploads -= 1;
            state.stats.failed_uploads += 1;
            return Err(StoreError::Unavailable(format!(
                "injected upload failure for {}",
                destination
            )));
        }

        if state.objects.contains_key(destination) {
            state.stats.failed_uploads += 1;
            return Err(StoreError::AlreadyExists(destination.to_string()));
        }

        register_parents(&mut state.directories, destination)?;
        state.objects.insert(
            destination.clone(),
            RemoteObject {
                path: destination.clone(),
                size: metadata.len(),
                fingerprint: None,
            },
        );

        let identifier = if self.issue_identifiers {
            state.next_identifier += 1;
            Some(format!("mem-{:08}", state.next_identifier))
        } else {
            None
        };

        Ok(UploadReceipt { identifier })
    }

    async fn delete(&self, destination: &RemotePath) -> Result<()> {
        let mut state = self.lock()?;
        state.stats.deletes += 1;

        if state.failing_deletes > 0 {
            state.failing_deletes -= 1;
            return Err(StoreError::Unavailable(format!(
                "injected delete failure for {}",
                destination
            )));
        }

        state
            .objects
            .remove(destination)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(destination.to_string()))
    }

    async fn list(&self, prefix: &RemotePath) -> Result<Vec<RemoteObject>> {
        let mut state = self.lock()?;
        state.stats.lists += 1;

        if state.failing_lists > 0 {
            state.failing_lists -= 1;
            return Err(StoreError::Unavailable("injected list failure".to_string()));
        }

        if !prefix.is_root() && !state.directories.contains(prefix) {
            return Err(StoreError::PrefixNotFound(prefix.to_string()));
        }

        Ok(state
            .objects
            .values()
            .filter(|object| object.path.strip_prefix(prefix).is_some())
            .cloned()
            .collect())
    }

    async fn exists(&self, destination: &RemotePath) -> Result<bool> {
        let mut state = self.lock()?;
        state.stats.exists_probes += 1;
        Ok(state.objects.contains_key(destination))
    }
}
