//! Filesystem watching
//!
//! Wraps a platform [`notify`] watcher and turns its raw event stream into a
//! coalesced stream of [`FsChange`]s. Directories are registered
//! one at a time, non-recursively; the orchestrator registers subdirectories
//! as it discovers them. After the first event arrives the dispatcher sleeps
//! briefly and drains whatever else queued up, dropping duplicate
//! (path, kind) pairs, so editor save storms collapse into one change.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, error};

use crate::error::{Result, SyncError};

const COALESCE_WINDOW: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsChangeKind {
    Created,
    Modified,
    Removed,
}

/// One coalesced filesystem change
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FsChange {
    pub path: PathBuf,
    pub kind: FsChangeKind,
}

/// Watches registered directories and emits coalesced changes
pub struct DirectoryWatcher {
    watcher: Mutex<Option<RecommendedWatcher>>,
    changes_rx: Mutex<Option<mpsc::UnboundedReceiver<FsChange>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl DirectoryWatcher {
    pub fn new() -> Result<Self> {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let watcher =
            notify::recommended_watcher(move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let _ = raw_tx.send(event);
                }
                Err(e) => error!("file watcher error: {e}"),
            })
            .map_err(|e| SyncError::watch_error(PathBuf::new(), e.to_string()))?;

        let (changes_tx, changes_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(dispatch(raw_rx, changes_tx));

        Ok(Self {
            watcher: Mutex::new(Some(watcher)),
            changes_rx: Mutex::new(Some(changes_rx)),
            task: Mutex::new(Some(task)),
        })
    }

    /// Subscribes one directory. Children are not covered; callers register
    /// each subdirectory they discover.
    pub fn register(&self, path: &Path) -> Result<()> {
        let mut guard = self.watcher.lock();
        let Some(watcher) = guard.as_mut() else {
            return Err(SyncError::watch_error(path, "watcher already shut down"));
        };
        watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|e| SyncError::watch_error(path, e.to_string()))?;
        debug!("watching {}", path.display());
        Ok(())
    }

    /// The coalesced change stream. Single consumer; later calls get `None`.
    pub fn take_changes(&self) -> Option<mpsc::UnboundedReceiver<FsChange>> {
        self.changes_rx.lock().take()
    }

    /// Stops watching and the dispatch task. Idempotent.
    pub fn end(&self) {
        self.watcher.lock().take();
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        self.end();
    }
}

/// Sleeps out the coalescing window after each wake, then drains and dedupes
/// everything that queued up before forwarding.
async fn dispatch(
    mut raw_rx: mpsc::UnboundedReceiver<Event>,
    changes_tx: mpsc::UnboundedSender<FsChange>,
) {
    while let Some(first) = raw_rx.recv().await {
        sleep(COALESCE_WINDOW).await;

        let mut batch = vec![first];
        while let Ok(event) = raw_rx.try_recv() {
            batch.push(event);
        }

        let mut seen = HashSet::new();
        for event in batch {
            for path in &event.paths {
                let Some(kind) = classify(&event.kind, path) else {
                    continue;
                };
                let change = FsChange { path: path.clone(), kind };
                if seen.insert(change.clone()) {
                    if changes_tx.send(change).is_err() {
                        return;
                    }
                }
            }
        }
    }
}

/// Maps a raw notify kind onto a change kind. Renames carry no
/// direction on every platform, so they resolve by probing whether the path
/// still exists.
fn classify(kind: &EventKind, path: &Path) -> Option<FsChangeKind> {
    match kind {
        EventKind::Create(_) => Some(FsChangeKind::Created),
        EventKind::Remove(_) => Some(FsChangeKind::Removed),
        EventKind::Modify(ModifyKind::Name(_)) => {
            if path.exists() {
                Some(FsChangeKind::Created)
            } else {
                Some(FsChangeKind::Removed)
            }
        }
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(_) => Some(FsChangeKind::Modified),
        _ => None,
    }
}
