//! Sync Engine Library
//!
//! Mirrors a local directory tree onto a remote object store:
//! - Local inventory with content or size fingerprints
//! - Extension filtering
//! - One-shot reconciliation (upload missing, remove orphaned, update changed)
//! - Continuous change watching with a bounded upload retry
//! - Persisted remote identifiers and structured engine events

pub mod diff;
pub mod error;
pub mod events;
pub mod filter;
pub mod fingerprint;
pub mod metrics;
pub mod persist;
pub mod remote;
pub mod scanner;
pub mod sync_engine;
pub mod watcher;

// Re-export main types and functions
pub use diff::{plan_reconcile, PlanInput, ReconcilePlan, ReconcileStages};
pub use error::{Result, SyncError};
pub use events::{ChannelSink, EventChannel, EventSink, FileOperation, SyncEvent, TracingSink};
pub use filter::{FileFilter, FilterOptions};
pub use fingerprint::{Fingerprint, FingerprintMode, Fingerprinter, HashAlgorithm};
pub use metrics::PassReport;
pub use persist::IdentifierMap;
pub use remote::{fetch_remote_inventory, RemoteInventory};
pub use scanner::{scan_local, LocalInventory};
pub use sync_engine::{SyncFolder, SyncOptions};
pub use watcher::{
    watch_channel, ChangeWatcher, NotifyBackend, WatchBackend, WatchEvent, WatchEventKind,
    WatchSender, WatchStream, WatcherHandle,
};

use siasync_core::RemoteStore;
use std::path::Path;
use std::sync::Arc;

/// Scan `root` and run a single reconciliation pass without watching
pub async fn mirror_once(
    root: impl AsRef<Path>,
    options: SyncOptions,
    store: Arc<dyn RemoteStore>,
    sink: Arc<dyn EventSink>,
) -> Result<PassReport> {
    let mut folder = SyncFolder::open(root, Arc::new(options), store, sink).await?;
    folder.scan(|_| Ok(())).await?;
    folder.reconcile().await
}

// Test modules
#[cfg(test)]
mod diff_tests;
#[cfg(test)]
mod filter_tests;
