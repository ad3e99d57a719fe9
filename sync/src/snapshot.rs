//! Per-file baseline snapshots
//!
//! Every tracked text file gets a private copy of its last-synchronized
//! content, used as the "old" side of the next diff. Snapshots live in an
//! engine-owned temp directory (removed on drop), named deterministically
//! from the sanitized relative path plus a hash suffix so distinct paths
//! never collide.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::io::AsyncReadExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::Result;
use crate::project::wire_path;

/// Longest sanitized-path prefix kept in a snapshot file name
const NAME_LIMIT: usize = 200;

/// How many leading bytes are scanned for NUL during text classification
const PROBE_LEN: usize = 1024;

/// Keeps one rolling baseline copy per tracked text file
pub struct SnapshotStore {
    project_root: PathBuf,
    temp_dir: tempfile::TempDir,
    // Lock held across snapshot creation so two tasks can never create two
    // snapshots for the same path.
    snapshots: Mutex<HashMap<PathBuf, PathBuf>>,
}

impl SnapshotStore {
    pub fn new(project_root: &Path) -> Result<Self> {
        let temp_dir = tempfile::Builder::new().prefix("sync-snapshots-").tempdir()?;
        debug!("snapshot area at {}", temp_dir.path().display());
        Ok(Self {
            project_root: project_root.to_path_buf(),
            temp_dir,
            snapshots: Mutex::new(HashMap::new()),
        })
    }

    /// The private temp area; paths under it never participate in sync.
    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Returns the baseline for `absolute`, lazily creating it from the
    /// file's current content. Returns `None` (and drops any stale snapshot)
    /// when the file no longer exists or no longer classifies as text.
    pub async fn get_or_create(&self, absolute: &Path) -> Result<Option<PathBuf>> {
        let mut snapshots = self.snapshots.lock().await;
        if !is_text(absolute).await {
            if let Some(stale) = snapshots.remove(absolute) {
                debug!("evicting stale snapshot for {}", absolute.display());
                let _ = tokio::fs::remove_file(&stale).await;
            }
            return Ok(None);
        }
        if let Some(existing) = snapshots.get(absolute) {
            return Ok(Some(existing.clone()));
        }
        let snapshot = self.temp_dir.path().join(self.snapshot_name(absolute));
        tokio::fs::copy(absolute, &snapshot).await?;
        snapshots.insert(absolute.to_path_buf(), snapshot.clone());
        Ok(Some(snapshot))
    }

    /// Overwrites the snapshot for `absolute` with the file's current
    /// content, creating it if needed. Used after a successful outbound diff
    /// and after applying an inbound edit.
    pub async fn refresh(&self, absolute: &Path) -> Result<Option<PathBuf>> {
        let mut snapshots = self.snapshots.lock().await;
        if !is_text(absolute).await {
            if let Some(stale) = snapshots.remove(absolute) {
                let _ = tokio::fs::remove_file(&stale).await;
            }
            return Ok(None);
        }
        let snapshot = self.temp_dir.path().join(self.snapshot_name(absolute));
        tokio::fs::copy(absolute, &snapshot).await?;
        snapshots.insert(absolute.to_path_buf(), snapshot.clone());
        Ok(Some(snapshot))
    }

    /// Drops the mapping and the backing temp file for `absolute`.
    pub async fn evict(&self, absolute: &Path) {
        let removed = self.snapshots.lock().await.remove(absolute);
        if let Some(snapshot) = removed {
            if let Err(e) = tokio::fs::remove_file(&snapshot).await {
                warn!("failed to remove snapshot {}: {e}", snapshot.display());
            }
        }
    }

    /// Deterministic snapshot file name: the relative path with every
    /// non-alphanumeric character replaced by `_`, capped, plus a hash of
    /// the uncapped path so truncation cannot collide.
    fn snapshot_name(&self, absolute: &Path) -> String {
        let relative = absolute.strip_prefix(&self.project_root).unwrap_or(absolute);
        let wire = wire_path(relative);
        let sanitized: String = wire
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .take(NAME_LIMIT)
            .collect();
        let hash = blake3::hash(wire.as_bytes()).to_hex();
        format!("{sanitized}-{}", &hash.as_str()[..16])
    }
}

/// Text classification: not a directory, and either the MIME probe reports
/// `text/*` or the first 1KB contains no NUL byte. Unreadable paths are
/// treated as non-text.
pub async fn is_text(path: &Path) -> bool {
    let Ok(metadata) = tokio::fs::metadata(path).await else {
        return false;
    };
    if metadata.is_dir() {
        return false;
    }
    if mime_guess::from_path(path)
        .iter()
        .any(|mime| mime.type_() == mime_guess::mime::TEXT)
    {
        return true;
    }
    match read_prefix(path).await {
        Ok(prefix) => !prefix.contains(&0),
        Err(_) => false,
    }
}

async fn read_prefix(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut buf = vec![0u8; PROBE_LEN];
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(buf)
}
