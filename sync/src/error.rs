//! Error types for the sync engine library

use std::path::PathBuf;

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Error type for the sync engine
///
/// Transient per-file IO errors are fail-soft (logged, the file's event is
/// abandoned); `OversizedLine` aborts the batch for that file;
/// `EditOutOfBounds` means a replica can no longer be trusted for that file
/// and is surfaced through the session event queue.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ignore-pattern parsing errors
    #[error("ignore pattern error: {0}")]
    IgnorePattern(String),

    /// A single line cannot be represented under the wire buffer limit
    #[error("line {line} of '{file}' is too large for the wire buffer")]
    OversizedLine { file: String, line: usize },

    /// An inbound edit referenced line ranges the local replica does not have
    #[error("edit range {start}..{end} is out of bounds for '{file}' ({len} lines)")]
    EditOutOfBounds { file: String, start: usize, end: usize, len: usize },

    /// The watcher could not subscribe a directory
    #[error("failed to watch '{path}': {message}")]
    Watch { path: PathBuf, message: String },
}

impl SyncError {
    /// Create a new watch registration error
    pub fn watch_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Watch { path: path.into(), message: message.into() }
    }
}
