//! The sync folder: owns the local file records of one sync root and applies
//! create/remove/update actions against the remote store

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;

use siasync_core::{Redundancy, RemotePath, RemoteStore};

use crate::diff::{plan_reconcile, PlanInput};
use crate::error::{Result, SyncError};
use crate::events::{EventSink, FileOperation, SyncEvent};
use crate::filter::{FileFilter, FilterOptions};
use crate::fingerprint::{Fingerprint, FingerprintMode, Fingerprinter};
use crate::metrics::PassReport;
use crate::persist::IdentifierMap;
use crate::remote::fetch_remote_inventory;
use crate::scanner::scan_local;

pub use crate::diff::ReconcileStages;

/// Remote folder used when none is configured
pub const DEFAULT_PREFIX: &str = "siasync";

/// Wait between a failed upload and its single retry
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(10);

/// Immutable configuration of one sync root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncOptions {
    /// Remote namespace this folder exclusively manages
    pub prefix: RemotePath,
    /// Never delete remotely because of a local removal
    pub archive: bool,
    /// Skip every remote mutation, still tracking fingerprints
    pub dry_run: bool,
    /// Run the startup pass only, without watching
    pub sync_only: bool,
    pub fingerprint_mode: FingerprintMode,
    pub stages: ReconcileStages,
    pub redundancy: Redundancy,
    #[serde(with = "humantime_serde")]
    pub retry_backoff: Duration,
    pub filter: FilterOptions,
    /// Where remote identifiers are persisted, if anywhere
    pub persistence_file: Option<PathBuf>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            prefix: RemotePath::new(DEFAULT_PREFIX).unwrap_or_else(|_| RemotePath::root()),
            archive: false,
            dry_run: false,
            sync_only: false,
            fingerprint_mode: FingerprintMode::default(),
            stages: ReconcileStages::default(),
            redundancy: Redundancy::default(),
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            filter: FilterOptions::default(),
            persistence_file: None,
        }
    }
}

impl SyncOptions {
    pub fn validate(&self) -> Result<()> {
        if self.redundancy.data_pieces == 0 {
            return Err(SyncError::Config("data pieces must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Local state of one sync root and the actions that keep its remote mirror
/// current. Every method takes `&mut self`: the folder is owned by a single
/// task and never shared.
pub struct SyncFolder {
    root: PathBuf,
    options: Arc<SyncOptions>,
    store: Arc<dyn RemoteStore>,
    filter: FileFilter,
    fingerprinter: Fingerprinter,
    files: HashMap<PathBuf, Fingerprint>,
    pending: HashSet<PathBuf>,
    identifiers: Option<IdentifierMap>,
    sink: Arc<dyn EventSink>,
    scan_skipped: usize,
}

impl std::fmt::Debug for SyncFolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncFolder")
            .field("root", &self.root)
            .field("prefix", &self.options.prefix)
            .field("files", &self.files.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl SyncFolder {
    /// Resolve `root` and load persisted identifiers. No files are read yet;
    /// call [`scan`](Self::scan) next.
    pub async fn open(
        root: impl AsRef<Path>,
        options: Arc<SyncOptions>,
        store: Arc<dyn RemoteStore>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self> {
        options.validate()?;

        let root = root.as_ref();
        let root = fs::canonicalize(root)
            .await
            .map_err(|e| SyncError::path_error(root, format!("Cannot resolve sync root: {}", e)))?;
        if !root.is_dir() {
            return Err(SyncError::path_error(&root, "Path is not a directory"));
        }

        let identifiers = match &options.persistence_file {
            Some(location) => Some(IdentifierMap::load(location).await?),
            None => None,
        };

        Ok(Self {
            root,
            filter: FileFilter::new(options.filter.clone()),
            fingerprinter: Fingerprinter::new(options.fingerprint_mode),
            options,
            store,
            files: HashMap::new(),
            pending: HashSet::new(),
            identifiers,
            sink,
            scan_skipped: 0,
        })
    }

    /// Build the local inventory, handing every subdirectory to `on_directory`
    /// (the watcher subscription) as it is discovered. In sync-only mode no
    /// directory is handed over.
    pub async fn scan<F>(&mut self, mut on_directory: F) -> Result<()>
    where
        F: FnMut(&Path) -> Result<()>,
    {
        let register = !self.options.sync_only;
        let inventory = scan_local(
            &self.root,
            &self.filter,
            &self.fingerprinter,
            self.sink.as_ref(),
            |dir: &Path| if register { on_directory(dir) } else { Ok(()) },
        )
        .await?;

        self.pending = inventory.files.keys().cloned().collect();
        self.files = inventory.files;
        self.scan_skipped = inventory.skipped;
        Ok(())
    }

    /// One reconciliation pass against a fresh listing of the prefix.
    ///
    /// A listing failure aborts the pass. Per-file failures are counted in
    /// the report and leave the path pending.
    pub async fn reconcile(&mut self) -> Result<PassReport> {
        let mut report = PassReport::new();
        report.skipped = self.scan_skipped;
        self.sink.emit(SyncEvent::PassStarted {
            session_id: report.session_id,
        });

        let remote = fetch_remote_inventory(self.store.as_ref(), &self.options.prefix).await?;
        self.sink.emit(SyncEvent::RemoteListed {
            prefix: self.options.prefix.to_string(),
            objects: remote.len(),
        });

        let seeded = self
            .identifiers
            .as_ref()
            .map(IdentifierMap::paths)
            .unwrap_or_default();

        let plan = plan_reconcile(&PlanInput {
            root: &self.root,
            local: &self.files,
            remote: &remote,
            seeded: &seeded,
            filter: &self.filter,
            mode: self.options.fingerprint_mode,
            stages: self.options.stages,
            archive: self.options.archive,
        });

        let root = self.root.clone();
        self.pending.retain(|path| {
            path.strip_prefix(&root)
                .map(|relative| !remote.contains(relative) && !seeded.contains(relative))
                .unwrap_or(true)
        });

        for path in plan.uploads {
            match self.create(&path).await {
                Ok(()) => {
                    self.pending.remove(&path);
                    report.uploaded += 1;
                }
                Err(e) => self.record_failure(&mut report, FileOperation::Create, &path, e),
            }
        }

        for path in plan.removals {
            match self.remove(&path).await {
                Ok(()) => report.removed += 1,
                Err(e) => self.record_failure(&mut report, FileOperation::Remove, &path, e),
            }
        }

        for (path, baseline) in plan.baselines {
            self.files.insert(path.clone(), baseline);
            match self.handle_write(&path).await {
                Ok(true) => report.updated += 1,
                Ok(false) => {}
                Err(e) => self.record_failure(&mut report, FileOperation::Update, &path, e),
            }
        }

        self.persist().await?;

        report.finish(self.pending.iter().cloned());
        self.sink.emit(SyncEvent::PassCompleted {
            session_id: report.session_id,
            uploaded: report.uploaded,
            removed: report.removed,
            updated: report.updated,
            failed: report.failed,
        });
        Ok(report)
    }

    fn record_failure(
        &self,
        report: &mut PassReport,
        operation: FileOperation,
        path: &Path,
        error: SyncError,
    ) {
        if error.is_vanished() {
            self.sink.emit(SyncEvent::Vanished {
                path: path.to_path_buf(),
            });
            report.skipped += 1;
            return;
        }
        self.sink.emit(SyncEvent::ItemFailed {
            operation,
            path: path.to_path_buf(),
            error: error.to_string(),
        });
        report.failed += 1;
    }

    /// Upload `path` and record its fingerprint. An upload onto an existing
    /// object counts as success. Other upload errors are returned unretried.
    pub async fn create(&mut self, path: &Path) -> Result<()> {
        let (relative, destination) = self.resolve(path)?;
        let fingerprint = self.fingerprinter.fingerprint(path).await?;

        if self.options.dry_run {
            self.files.insert(path.to_path_buf(), fingerprint);
            self.sink.emit(SyncEvent::Uploaded {
                path: path.to_path_buf(),
                destination: destination.to_string(),
                identifier: None,
                dry_run: true,
            });
            return Ok(());
        }

        match self
            .store
            .upload(path, &destination, self.options.redundancy)
            .await
        {
            Ok(receipt) => {
                if let (Some(map), Some(identifier)) =
                    (self.identifiers.as_mut(), receipt.identifier.as_ref())
                {
                    map.insert(relative, identifier.clone());
                }
                self.files.insert(path.to_path_buf(), fingerprint);
                self.sink.emit(SyncEvent::Uploaded {
                    path: path.to_path_buf(),
                    destination: destination.to_string(),
                    identifier: receipt.identifier,
                    dry_run: false,
                });
                Ok(())
            }
            Err(e) if e.is_already_exists() => {
                self.files.insert(path.to_path_buf(), fingerprint);
                self.sink.emit(SyncEvent::AlreadyUploaded {
                    path: path.to_path_buf(),
                    destination: destination.to_string(),
                });
                Ok(())
            }
            Err(e) => Err(SyncError::store_error(path, e)),
        }
    }

    /// Delete the remote object for `path`. The file record is dropped even
    /// when the delete is simulated or fails.
    pub async fn remove(&mut self, path: &Path) -> Result<()> {
        self.files.remove(path);
        self.pending.remove(path);
        let (relative, destination) = self.resolve(path)?;

        if self.options.dry_run {
            self.sink.emit(SyncEvent::Removed {
                path: path.to_path_buf(),
                destination: destination.to_string(),
                dry_run: true,
            });
            return Ok(());
        }

        match self.store.delete(&destination).await {
            Ok(()) => {
                self.sink.emit(SyncEvent::Removed {
                    path: path.to_path_buf(),
                    destination: destination.to_string(),
                    dry_run: false,
                });
            }
            Err(e) if e.is_not_found() => {
                self.sink.emit(SyncEvent::AlreadyRemoved {
                    path: path.to_path_buf(),
                    destination: destination.to_string(),
                });
            }
            Err(e) => return Err(SyncError::store_error(path, e)),
        }

        if let Some(map) = self.identifiers.as_mut() {
            map.remove(&relative);
        }
        Ok(())
    }

    /// Re-upload `path` if its fingerprint differs from the recorded one.
    /// Untracked paths are left alone. Returns whether an update happened.
    pub async fn handle_write(&mut self, path: &Path) -> Result<bool> {
        let fingerprint = self.fingerprinter.fingerprint(path).await?;

        let previous = match self.files.get(path) {
            Some(recorded) if *recorded != fingerprint => recorded.clone(),
            _ => return Ok(false),
        };

        self.files.insert(path.to_path_buf(), fingerprint);
        self.sink.emit(SyncEvent::Changed {
            path: path.to_path_buf(),
        });

        // Delete then create: the object is briefly absent remotely.
        let outcome = if self.options.archive {
            self.create(path).await
        } else {
            match self.remove(path).await {
                Ok(()) => self.create(path).await,
                Err(e) => Err(e),
            }
        };

        if let Err(e) = outcome {
            // The stale fingerprint makes the next event for this path retry the update.
            self.files.insert(path.to_path_buf(), previous);
            self.pending.insert(path.to_path_buf());
            return Err(e);
        }
        self.pending.remove(path);
        Ok(true)
    }

    /// Create with one retry: on failure wait the backoff, probe the
    /// destination, clear a partial object (unless archiving) and create once
    /// more. Returns `false` when the path was abandoned after the retry.
    pub async fn upload_retry(&mut self, path: &Path) -> Result<bool> {
        let (_, destination) = self.resolve(path)?;
        self.pending.insert(path.to_path_buf());

        let first = match self.create(path).await {
            Ok(()) => {
                self.pending.remove(path);
                return Ok(true);
            }
            Err(e) if e.is_vanished() => {
                self.pending.remove(path);
                return Err(e);
            }
            Err(e) => e,
        };

        self.sink.emit(SyncEvent::RetryScheduled {
            path: path.to_path_buf(),
            backoff: self.options.retry_backoff,
            error: first.to_string(),
        });
        tokio::time::sleep(self.options.retry_backoff).await;

        match self.store.exists(&destination).await {
            Ok(true) if !self.options.archive => {
                if let Err(e) = self.remove(path).await {
                    self.sink.emit(SyncEvent::ItemFailed {
                        operation: FileOperation::Remove,
                        path: path.to_path_buf(),
                        error: e.to_string(),
                    });
                }
            }
            Ok(_) => {}
            Err(e) => {
                self.sink.emit(SyncEvent::ItemFailed {
                    operation: FileOperation::Create,
                    path: path.to_path_buf(),
                    error: format!("existence probe failed: {}", e),
                });
            }
        }

        let outcome = self.create(path).await;
        self.pending.remove(path);
        match outcome {
            Ok(()) => Ok(true),
            Err(e) if e.is_vanished() => Err(e),
            Err(e) => {
                self.sink.emit(SyncEvent::Abandoned {
                    path: path.to_path_buf(),
                    error: e.to_string(),
                });
                Ok(false)
            }
        }
    }

    /// Create-event entry point. A path already recorded with the same
    /// fingerprint is a no-op; a recorded path with a new fingerprint is an
    /// update; anything else goes through [`upload_retry`](Self::upload_retry).
    pub async fn handle_create(&mut self, path: &Path) -> Result<()> {
        if let Some(recorded) = self.files.get(path).cloned() {
            let current = self.fingerprinter.fingerprint(path).await?;
            if current == recorded {
                return Ok(());
            }
            self.handle_write(path).await?;
            return Ok(());
        }

        self.upload_retry(path).await?;
        Ok(())
    }

    /// Remove-event entry point. In archive mode only local records are
    /// dropped. A path that is not a tracked file but contains tracked files
    /// is treated as a removed directory.
    pub async fn handle_remove(&mut self, path: &Path) -> Result<()> {
        let descendants = self.tracked_descendants(path);

        if self.options.archive {
            self.forget(path);
            for descendant in descendants {
                self.forget(&descendant);
            }
            return Ok(());
        }

        if self.files.contains_key(path) || descendants.is_empty() {
            return self.remove(path).await;
        }

        let mut first_error = None;
        for descendant in descendants {
            if let Err(e) = self.remove(&descendant).await {
                self.sink.emit(SyncEvent::ItemFailed {
                    operation: FileOperation::Remove,
                    path: descendant.clone(),
                    error: e.to_string(),
                });
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Drop local state for `path` without touching the remote
    pub fn forget(&mut self, path: &Path) {
        self.files.remove(path);
        self.pending.remove(path);
    }

    /// Write the identifier map if it changed
    pub async fn persist(&mut self) -> Result<()> {
        if let Some(map) = self.identifiers.as_mut() {
            map.save_if_dirty().await?;
        }
        Ok(())
    }

    fn tracked_descendants(&self, path: &Path) -> Vec<PathBuf> {
        let mut descendants: Vec<PathBuf> = self
            .files
            .keys()
            .filter(|tracked| tracked.as_path() != path && tracked.starts_with(path))
            .cloned()
            .collect();
        descendants.sort();
        descendants
    }

    fn resolve(&self, path: &Path) -> Result<(PathBuf, RemotePath)> {
        let relative = path
            .strip_prefix(&self.root)
            .map_err(|_| SyncError::path_error(path, "Path is outside the sync root"))?;
        let destination = self
            .options
            .prefix
            .join_relative(relative)
            .map_err(|e| SyncError::path_error(path, e.to_string()))?;
        Ok((relative.to_path_buf(), destination))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn filter(&self) -> &FileFilter {
        &self.filter
    }

    pub fn sink(&self) -> &Arc<dyn EventSink> {
        &self.sink
    }

    pub fn fingerprint_of(&self, path: &Path) -> Option<&Fingerprint> {
        self.files.get(path)
    }

    pub fn is_tracked(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    /// Whether any tracked file lives below `path`
    pub fn tracks_below(&self, path: &Path) -> bool {
        self.files
            .keys()
            .any(|tracked| tracked.as_path() != path && tracked.starts_with(path))
    }

    pub fn tracked_count(&self) -> usize {
        self.files.len()
    }

    pub fn is_pending(&self, path: &Path) -> bool {
        self.pending.contains(path)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn identifiers(&self) -> Option<&IdentifierMap> {
        self.identifiers.as_ref()
    }
}
