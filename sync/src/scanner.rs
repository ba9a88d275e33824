//! Local inventory: walks the sync root with walkdir and fingerprints every
//! eligible regular file

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

use crate::error::{Result, SyncError};
use crate::events::{EventSink, SyncEvent};
use crate::filter::FileFilter;
use crate::fingerprint::{Fingerprint, Fingerprinter};

/// Files found under the sync root, keyed by absolute path
#[derive(Debug, Clone, Default)]
pub struct LocalInventory {
    pub files: HashMap<PathBuf, Fingerprint>,
    /// Every directory below the root, in walk order
    pub directories: Vec<PathBuf>,
    /// Ineligible or vanished files
    pub skipped: usize,
}

impl LocalInventory {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Walk `root`, calling `on_directory` for each subdirectory before any of
/// its contents are fingerprinted.
///
/// Walk errors and unreadable files abort the scan. Files that vanish
/// between discovery and fingerprinting are skipped.
pub async fn scan_local<F>(
    root: &Path,
    filter: &FileFilter,
    fingerprinter: &Fingerprinter,
    sink: &dyn EventSink,
    mut on_directory: F,
) -> Result<LocalInventory>
where
    F: FnMut(&Path) -> Result<()>,
{
    if !root.is_dir() {
        return Err(SyncError::path_error(root, "Path is not a directory"));
    }

    sink.emit(SyncEvent::ScanStarted {
        root: root.to_path_buf(),
    });
    let started = Instant::now();
    let mut inventory = LocalInventory::default();

    for entry in WalkDir::new(root).follow_links(false).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if is_vanished(&e) => continue,
            Err(e) => {
                let at = e.path().unwrap_or(root).to_path_buf();
                return Err(SyncError::scan_error(at, format!("Walk error: {}", e)));
            }
        };

        let path = entry.path();
        let file_type = entry.file_type();

        if file_type.is_dir() {
            on_directory(path)?;
            inventory.directories.push(path.to_path_buf());
            continue;
        }

        if !file_type.is_file() {
            continue;
        }

        if !filter.is_eligible(path) {
            inventory.skipped += 1;
            continue;
        }

        match fingerprinter.fingerprint(path).await {
            Ok(fingerprint) => {
                inventory.files.insert(path.to_path_buf(), fingerprint);
            }
            Err(e) if e.is_vanished() => {
                sink.emit(SyncEvent::Vanished {
                    path: path.to_path_buf(),
                });
                inventory.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    sink.emit(SyncEvent::ScanCompleted {
        files: inventory.files.len(),
        directories: inventory.directories.len(),
        duration: started.elapsed(),
    });

    Ok(inventory)
}

fn is_vanished(error: &walkdir::Error) -> bool {
    error
        .io_error()
        .map(|e| e.kind() == std::io::ErrorKind::NotFound)
        .unwrap_or(false)
}
