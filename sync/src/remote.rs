//! Remote inventory: one listing of the managed prefix per pass

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use siasync_core::{RemoteObject, RemotePath, RemoteStore};

use crate::error::{Result, SyncError};

/// Remote objects under the prefix, keyed by path relative to the prefix
#[derive(Debug, Clone, Default)]
pub struct RemoteInventory {
    objects: BTreeMap<PathBuf, RemoteObject>,
}

impl RemoteInventory {
    /// Keep the objects nested below `prefix`, keyed by their relative path
    pub fn from_objects(prefix: &RemotePath, objects: impl IntoIterator<Item = RemoteObject>) -> Self {
        let objects = objects
            .into_iter()
            .filter_map(|object| {
                object
                    .path
                    .relative_to(prefix)
                    .map(|relative| (relative, object))
            })
            .collect();
        Self { objects }
    }

    pub fn get(&self, relative: &Path) -> Option<&RemoteObject> {
        self.objects.get(relative)
    }

    pub fn contains(&self, relative: &Path) -> bool {
        self.objects.contains_key(relative)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &RemoteObject)> {
        self.objects.iter()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// List `prefix`. A prefix that never held a file is an empty inventory;
/// any other listing failure is returned.
pub async fn fetch_remote_inventory(
    store: &dyn RemoteStore,
    prefix: &RemotePath,
) -> Result<RemoteInventory> {
    match store.list(prefix).await {
        Ok(objects) => Ok(RemoteInventory::from_objects(prefix, objects)),
        Err(e) if e.is_prefix_not_found() => Ok(RemoteInventory::default()),
        Err(source) => Err(SyncError::RemoteListing {
            prefix: prefix.to_string(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use siasync_core::MemoryStore;

    fn object(path: &str, size: u64) -> RemoteObject {
        RemoteObject {
            path: RemotePath::new(path).unwrap(),
            size,
            fingerprint: None,
        }
    }

    #[test]
    fn test_sibling_prefix_is_invisible() {
        let prefix = RemotePath::new("siasync").unwrap();
        let inventory = RemoteInventory::from_objects(
            &prefix,
            vec![
                object("siasync/a.txt", 1),
                object("siasync/docs/b.txt", 2),
                object("siasync-old/c.txt", 3),
                object("other/siasync/d.txt", 4),
            ],
        );

        assert_eq!(inventory.len(), 2);
        assert!(inventory.contains(Path::new("a.txt")));
        assert_eq!(inventory.get(&PathBuf::from("docs").join("b.txt")).map(|o| o.size), Some(2));
        assert!(!inventory.contains(Path::new("c.txt")));
    }

    #[tokio::test]
    async fn test_unused_prefix_is_empty() {
        let store = MemoryStore::new();
        let inventory = fetch_remote_inventory(&store, &RemotePath::new("siasync").unwrap())
            .await
            .unwrap();
        assert!(inventory.is_empty());
    }

    #[tokio::test]
    async fn test_listing_failure_is_returned() {
        let store = MemoryStore::new();
        store.insert_object(object("siasync/a.txt", 1)).unwrap();
        store.fail_next_lists(1).unwrap();

        let result = fetch_remote_inventory(&store, &RemotePath::new("siasync").unwrap()).await;
        assert!(matches!(result, Err(SyncError::RemoteListing { .. })));
    }
}
