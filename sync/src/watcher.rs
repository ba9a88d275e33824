//! Change watcher: turns filesystem events into single-path actions on a
//! [`SyncFolder`], one event at a time, until closed

use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SyncError};
use crate::events::{FileOperation, SyncEvent};
use crate::metrics::PassReport;
use crate::sync_engine::SyncFolder;

/// Events buffered between the backend and the loop before the backend blocks
pub const DEFAULT_EVENT_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Create,
    Write,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub path: PathBuf,
}

impl WatchEvent {
    pub fn new(kind: WatchEventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// Subscribes directories for change notification
pub trait WatchBackend: Send {
    /// Start delivering events for the direct children of `path`
    fn watch(&mut self, path: &Path) -> Result<()>;
}

/// Producer half of a watch channel
#[derive(Debug, Clone)]
pub struct WatchSender {
    events: mpsc::Sender<WatchEvent>,
    errors: mpsc::Sender<String>,
}

impl WatchSender {
    pub async fn send_event(&self, event: WatchEvent) -> bool {
        self.events.send(event).await.is_ok()
    }

    pub async fn send_error(&self, message: impl Into<String>) -> bool {
        self.errors.send(message.into()).await.is_ok()
    }

    /// For backend threads outside the runtime; blocks while the channel is full
    pub fn blocking_send_event(&self, event: WatchEvent) -> bool {
        self.events.blocking_send(event).is_ok()
    }

    pub fn blocking_send_error(&self, message: impl Into<String>) -> bool {
        self.errors.blocking_send(message.into()).is_ok()
    }
}

/// Consumer half of a watch channel: change events plus backend faults
#[derive(Debug)]
pub struct WatchStream {
    events: mpsc::Receiver<WatchEvent>,
    errors: mpsc::Receiver<String>,
}

/// Bounded channel pair connecting a backend to a [`ChangeWatcher`]
pub fn watch_channel(capacity: usize) -> (WatchSender, WatchStream) {
    let (events_tx, events_rx) = mpsc::channel(capacity);
    let (errors_tx, errors_rx) = mpsc::channel(capacity);
    (
        WatchSender {
            events: events_tx,
            errors: errors_tx,
        },
        WatchStream {
            events: events_rx,
            errors: errors_rx,
        },
    )
}

/// Non-recursive notify watches, one per registered directory
pub struct NotifyBackend {
    watcher: RecommendedWatcher,
    watched: HashSet<PathBuf>,
}

impl NotifyBackend {
    pub fn new(capacity: usize) -> Result<(Self, WatchStream)> {
        let (sender, stream) = watch_channel(capacity);

        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for translated in translate_event(&event) {
                    if !sender.blocking_send_event(translated) {
                        return;
                    }
                }
            }
            Err(e) => {
                sender.blocking_send_error(e.to_string());
            }
        })
        .map_err(|e| SyncError::watch_error(PathBuf::new(), e.to_string()))?;

        Ok((
            Self {
                watcher,
                watched: HashSet::new(),
            },
            stream,
        ))
    }
}

impl WatchBackend for NotifyBackend {
    fn watch(&mut self, path: &Path) -> Result<()> {
        if self.watched.contains(path) {
            return Ok(());
        }
        self.watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|e| SyncError::watch_error(path, e.to_string()))?;
        self.watched.insert(path.to_path_buf());
        Ok(())
    }
}

/// Map a notify event onto create/write/remove events. Metadata-only
/// changes and reads produce nothing.
pub fn translate_event(event: &Event) -> Vec<WatchEvent> {
    let each = |kind: WatchEventKind| -> Vec<WatchEvent> {
        event
            .paths
            .iter()
            .map(|path| WatchEvent::new(kind, path.clone()))
            .collect()
    };

    match &event.kind {
        EventKind::Create(_) => each(WatchEventKind::Create),
        EventKind::Remove(_) => each(WatchEventKind::Remove),
        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any) => {
            each(WatchEventKind::Write)
        }
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => each(WatchEventKind::Write),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => each(WatchEventKind::Remove),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => each(WatchEventKind::Create),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.as_slice() {
            [from, to, ..] => vec![
                WatchEvent::new(WatchEventKind::Remove, from.clone()),
                WatchEvent::new(WatchEventKind::Create, to.clone()),
            ],
            _ => Vec::new(),
        },
        // Backends that cannot tell the two ends of a rename apart
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|path| {
                let kind = if path.exists() {
                    WatchEventKind::Create
                } else {
                    WatchEventKind::Remove
                };
                WatchEvent::new(kind, path.clone())
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Long-running event loop owning a [`SyncFolder`]
pub struct ChangeWatcher<B: WatchBackend> {
    folder: SyncFolder,
    backend: B,
    stream: WatchStream,
}

impl<B: WatchBackend + 'static> ChangeWatcher<B> {
    pub fn new(folder: SyncFolder, backend: B, stream: WatchStream) -> Self {
        Self {
            folder,
            backend,
            stream,
        }
    }

    /// Watch the root, scan (subscribing each directory as it is found) and
    /// run the startup pass, then spawn the event loop.
    pub async fn start(
        mut folder: SyncFolder,
        mut backend: B,
        stream: WatchStream,
    ) -> Result<(PassReport, WatcherHandle)> {
        let root = folder.root().to_path_buf();
        backend.watch(&root)?;
        folder.sink().emit(SyncEvent::DirectoryWatched { path: root });

        let sink = folder.sink().clone();
        folder
            .scan(|dir| {
                backend.watch(dir)?;
                sink.emit(SyncEvent::DirectoryWatched {
                    path: dir.to_path_buf(),
                });
                Ok(())
            })
            .await?;

        let report = folder.reconcile().await?;
        let handle = Self::new(folder, backend, stream).spawn();
        Ok((report, handle))
    }

    pub fn spawn(self) -> WatcherHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.run(cancel.clone()));
        WatcherHandle { cancel, task }
    }

    /// Process events until `cancel` fires or the backend goes away, then
    /// hand the folder back.
    pub async fn run(mut self, cancel: CancellationToken) -> SyncFolder {
        let mut errors_open = true;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = self.stream.events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => break,
                },
                error = self.stream.errors.recv(), if errors_open => match error {
                    Some(message) => self.folder.sink().emit(SyncEvent::WatcherError { message }),
                    None => errors_open = false,
                },
            }
        }

        let Self { mut folder, backend, .. } = self;
        drop(backend);
        if let Err(e) = folder.persist().await {
            folder.sink().emit(SyncEvent::WatcherError {
                message: e.to_string(),
            });
        }
        folder.sink().emit(SyncEvent::WatcherClosed);
        folder
    }

    /// Apply one event. Failures are reported through the sink and never
    /// stop the loop.
    pub async fn handle_event(&mut self, event: WatchEvent) {
        let WatchEvent { kind, path } = event;

        let outcome = match kind {
            WatchEventKind::Remove => {
                if !self.folder.filter().is_eligible(&path)
                    && !self.folder.is_tracked(&path)
                    && !self.folder.tracks_below(&path)
                {
                    return;
                }
                self.folder
                    .handle_remove(&path)
                    .await
                    .map_err(|e| (FileOperation::Remove, e))
            }
            WatchEventKind::Create | WatchEventKind::Write => {
                if is_directory(&path).await {
                    if kind == WatchEventKind::Create {
                        self.register_directory(&path);
                    }
                    return;
                }
                if !self.folder.filter().is_eligible(&path) {
                    return;
                }
                if kind == WatchEventKind::Write {
                    self.folder
                        .handle_write(&path)
                        .await
                        .map(|_| ())
                        .map_err(|e| (FileOperation::Update, e))
                } else {
                    self.folder
                        .handle_create(&path)
                        .await
                        .map_err(|e| (FileOperation::Create, e))
                }
            }
        };

        if let Err((operation, error)) = outcome {
            let event = if error.is_vanished() {
                SyncEvent::Vanished { path }
            } else if error.is_soft() {
                SyncEvent::ItemFailed {
                    operation,
                    path,
                    error: error.to_string(),
                }
            } else {
                SyncEvent::WatcherError {
                    message: format!("{} {}: {}", operation, path.display(), error),
                }
            };
            self.folder.sink().emit(event);
        }

        if let Err(e) = self.folder.persist().await {
            self.folder.sink().emit(SyncEvent::WatcherError {
                message: e.to_string(),
            });
        }
    }

    fn register_directory(&mut self, path: &Path) {
        match self.backend.watch(path) {
            Ok(()) => self.folder.sink().emit(SyncEvent::DirectoryWatched {
                path: path.to_path_buf(),
            }),
            Err(e) => self.folder.sink().emit(SyncEvent::WatcherError {
                message: e.to_string(),
            }),
        }
    }

    pub fn folder(&self) -> &SyncFolder {
        &self.folder
    }
}

async fn is_directory(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|metadata| metadata.is_dir())
        .unwrap_or(false)
}

/// Running watcher task
pub struct WatcherHandle {
    cancel: CancellationToken,
    task: JoinHandle<SyncFolder>,
}

impl WatcherHandle {
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Signal close and wait for the loop to finish its current event
    pub async fn close(self) -> Result<SyncFolder> {
        self.cancel.cancel();
        self.task
            .await
            .map_err(|e| SyncError::Task(e.to_string()))
    }
}
