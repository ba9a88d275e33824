//! The contract the sync engine needs from a remote store

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::api::error::Result;
use crate::path::RemotePath;

/// Erasure coding parameters passed through on every upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redundancy {
    pub data_pieces: u64,
    pub parity_pieces: u64,
}

impl Default for Redundancy {
    fn default() -> Self {
        Self {
            data_pieces: 10,
            parity_pieces: 30,
        }
    }
}

/// Metadata of one object in the remote store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObject {
    pub path: RemotePath,
    pub size: u64,
    /// Content fingerprint, only when the store can report one without a download
    pub fingerprint: Option<String>,
}

/// Result of a successful upload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    /// Opaque identifier for stores that do not address objects by path
    pub identifier: Option<String>,
}

/// Upload/delete/list/exists against a remote object store.
///
/// Implementations report "destination already exists" as
/// [`StoreError::AlreadyExists`](crate::StoreError::AlreadyExists), a missing
/// object on delete as `NotFound` and a never-used prefix as `PrefixNotFound`.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn upload(
        &self,
        local: &Path,
        destination: &RemotePath,
        redundancy: Redundancy,
    ) -> Result<UploadReceipt>;

    async fn delete(&self, destination: &RemotePath) -> Result<()>;

    /// Every object nested below `prefix`, at any depth.
    async fn list(&self, prefix: &RemotePath) -> Result<Vec<RemoteObject>>;

    async fn exists(&self, destination: &RemotePath) -> Result<bool>;
}
