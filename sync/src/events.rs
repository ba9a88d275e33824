//! Structured events emitted by the engine and the change watcher
//!
//! The engine never logs directly. It hands every notable step to an
//! [`EventSink`]; [`TracingSink`] turns them into `tracing` records and
//! [`ChannelSink`] forwards them to a receiver for tests or embedding.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Single-path operations the engine performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileOperation {
    Create,
    Remove,
    Update,
}

impl std::fmt::Display for FileOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOperation::Create => write!(f, "create"),
            FileOperation::Remove => write!(f, "remove"),
            FileOperation::Update => write!(f, "update"),
        }
    }
}

/// Engine events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SyncEvent {
    ScanStarted {
        root: PathBuf,
    },
    ScanCompleted {
        files: usize,
        directories: usize,
        duration: Duration,
    },
    RemoteListed {
        prefix: String,
        objects: usize,
    },
    PassStarted {
        session_id: Uuid,
    },
    PassCompleted {
        session_id: Uuid,
        uploaded: usize,
        removed: usize,
        updated: usize,
        failed: usize,
    },
    Uploaded {
        path: PathBuf,
        destination: String,
        identifier: Option<String>,
        dry_run: bool,
    },
    /// Upload target was already present remotely
    AlreadyUploaded {
        path: PathBuf,
        destination: String,
    },
    Removed {
        path: PathBuf,
        destination: String,
        dry_run: bool,
    },
    /// Delete target was already gone remotely
    AlreadyRemoved {
        path: PathBuf,
        destination: String,
    },
    Changed {
        path: PathBuf,
    },
    /// File disappeared before it could be fingerprinted
    Vanished {
        path: PathBuf,
    },
    RetryScheduled {
        path: PathBuf,
        backoff: Duration,
        error: String,
    },
    /// Second upload attempt failed; the path is left pending
    Abandoned {
        path: PathBuf,
        error: String,
    },
    ItemFailed {
        operation: FileOperation,
        path: PathBuf,
        error: String,
    },
    DirectoryWatched {
        path: PathBuf,
    },
    WatcherError {
        message: String,
    },
    WatcherClosed,
}

/// Receives engine events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SyncEvent);
}

/// Renders each event as one structured `tracing` record
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: SyncEvent) {
        match event {
            SyncEvent::ScanStarted { root } => {
                debug!(root = %root.display(), "Scanning local directory");
            }
            SyncEvent::ScanCompleted {
                files,
                directories,
                duration,
            } => {
                info!(files, directories, ?duration, "Local scan completed");
            }
            SyncEvent::RemoteListed { prefix, objects } => {
                debug!(%prefix, objects, "Listed remote prefix");
            }
            SyncEvent::PassStarted { session_id } => {
                info!(%session_id, "Reconciliation pass started");
            }
            SyncEvent::PassCompleted {
                session_id,
                uploaded,
                removed,
                updated,
                failed,
            } => {
                info!(
                    %session_id,
                    uploaded, removed, updated, failed,
                    "Reconciliation pass completed"
                );
            }
            SyncEvent::Uploaded {
                path,
                destination,
                identifier,
                dry_run,
            } => {
                info!(
                    path = %path.display(),
                    %destination,
                    identifier = identifier.as_deref().unwrap_or(""),
                    dry_run,
                    "Uploaded file"
                );
            }
            SyncEvent::AlreadyUploaded { path, destination } => {
                debug!(path = %path.display(), %destination, "File already uploaded");
            }
            SyncEvent::Removed {
                path,
                destination,
                dry_run,
            } => {
                info!(path = %path.display(), %destination, dry_run, "Removed file");
            }
            SyncEvent::AlreadyRemoved { path, destination } => {
                debug!(path = %path.display(), %destination, "File already absent remotely");
            }
            SyncEvent::Changed { path } => {
                info!(path = %path.display(), "File changed");
            }
            SyncEvent::Vanished { path } => {
                debug!(path = %path.display(), "File vanished before it could be read");
            }
            SyncEvent::RetryScheduled {
                path,
                backoff,
                error,
            } => {
                warn!(path = %path.display(), ?backoff, %error, "Upload failed, retrying");
            }
            SyncEvent::Abandoned { path, error } => {
                error!(path = %path.display(), %error, "Upload failed after retry");
            }
            SyncEvent::ItemFailed {
                operation,
                path,
                error,
            } => {
                error!(%operation, path = %path.display(), %error, "File operation failed");
            }
            SyncEvent::DirectoryWatched { path } => {
                debug!(path = %path.display(), "Watching directory");
            }
            SyncEvent::WatcherError { message } => {
                warn!(%message, "Watcher error");
            }
            SyncEvent::WatcherClosed => {
                info!("Watcher closed");
            }
        }
    }
}

/// Forwards events over an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<SyncEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, EventChannel) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, EventChannel { receiver })
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: SyncEvent) {
        // A dropped receiver only means nobody is listening any more.
        let _ = self.sender.send(event);
    }
}

/// Receiving half of a [`ChannelSink`]
#[derive(Debug)]
pub struct EventChannel {
    receiver: mpsc::UnboundedReceiver<SyncEvent>,
}

impl EventChannel {
    pub async fn recv(&mut self) -> Option<SyncEvent> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<SyncEvent> {
        self.receiver.try_recv().ok()
    }

    /// Everything received so far, without waiting
    pub fn drain(&mut self) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }
}
