//! Ignore-rule filtering for tracked paths
//!
//! A path participates in sync only if it survives three checks: it is not
//! inside the engine's private snapshot area, no segment of it is
//! dot-prefixed, and no ancestor-inclusive prefix of it matches a loaded
//! ignore pattern. Patterns come from the always-honored hide file plus,
//! optionally, the project's `.gitignore`.

use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use tracing::debug;

use crate::error::{Result, SyncError};

/// The primary hide file, always consulted and auto-created if missing
pub const HIDE_FILE: &str = ".synchide";

/// Decides whether a path participates in sync. Pure query, no side effects
/// after construction.
pub struct IgnoreFilter {
    patterns: Gitignore,
    temp_dir: PathBuf,
}

impl IgnoreFilter {
    /// Loads patterns for a project root. The hide file is created empty if
    /// absent; `.gitignore` is consulted only when `honor_gitignore` is set.
    /// `temp_dir` is the engine's private snapshot area, which is always
    /// excluded.
    pub fn new(project_root: &Path, temp_dir: &Path, honor_gitignore: bool) -> Result<Self> {
        let hide_file = project_root.join(HIDE_FILE);
        if !hide_file.exists() {
            std::fs::write(&hide_file, b"")?;
            debug!("created empty {} in {}", HIDE_FILE, project_root.display());
        }

        let mut builder = GitignoreBuilder::new(project_root);
        if let Some(e) = builder.add(&hide_file) {
            return Err(SyncError::IgnorePattern(e.to_string()));
        }
        if honor_gitignore {
            let gitignore = project_root.join(".gitignore");
            if gitignore.exists() {
                if let Some(e) = builder.add(&gitignore) {
                    return Err(SyncError::IgnorePattern(e.to_string()));
                }
            }
        }
        let patterns = builder
            .build()
            .map_err(|e| SyncError::IgnorePattern(e.to_string()))?;

        Ok(Self { patterns, temp_dir: temp_dir.to_path_buf() })
    }

    /// Returns true if the path must not participate in sync.
    pub fn is_ignored(&self, relative: &Path, absolute: &Path) -> bool {
        if absolute.starts_with(&self.temp_dir) {
            return true;
        }
        if has_hidden_component(relative) {
            return true;
        }
        // Checks the path and every ancestor prefix, outward from the file,
        // short-circuiting on the first match.
        self.patterns
            .matched_path_or_any_parents(relative, absolute.is_dir())
            .is_ignore()
    }
}

fn has_hidden_component(path: &Path) -> bool {
    path.components().any(|component| {
        component
            .as_os_str()
            .to_str()
            .map(|s| s.starts_with('.') && s != "." && s != "..")
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn filter(root: &TempDir, temp: &TempDir, honor_gitignore: bool) -> IgnoreFilter {
        IgnoreFilter::new(root.path(), temp.path(), honor_gitignore).unwrap()
    }

    fn is_ignored(f: &IgnoreFilter, root: &TempDir, rel: &str) -> bool {
        f.is_ignored(Path::new(rel), &root.path().join(rel))
    }

    #[test]
    fn auto_creates_hide_file() {
        let root = TempDir::new().unwrap();
        let temp = TempDir::new().unwrap();
        let _ = filter(&root, &temp, false);
        assert!(root.path().join(HIDE_FILE).exists());
    }

    #[test]
    fn hide_file_patterns_apply_without_gitignore() {
        let root = TempDir::new().unwrap();
        let temp = TempDir::new().unwrap();
        std::fs::write(root.path().join(HIDE_FILE), "secret.txt\n").unwrap();
        let f = filter(&root, &temp, false);

        assert!(is_ignored(&f, &root, "secret.txt"));
        assert!(!is_ignored(&f, &root, "public.txt"));
    }

    #[test]
    fn gitignore_only_when_enabled() {
        let root = TempDir::new().unwrap();
        let temp = TempDir::new().unwrap();
        std::fs::write(root.path().join(".gitignore"), "target\n").unwrap();

        let without = filter(&root, &temp, false);
        assert!(!is_ignored(&without, &root, "target"));

        let with = filter(&root, &temp, true);
        assert!(is_ignored(&with, &root, "target"));
    }

    #[test]
    fn ancestor_prefixes_are_checked() {
        let root = TempDir::new().unwrap();
        let temp = TempDir::new().unwrap();
        std::fs::write(root.path().join(HIDE_FILE), "build\n").unwrap();
        std::fs::create_dir_all(root.path().join("build/deep")).unwrap();
        let f = filter(&root, &temp, false);

        assert!(is_ignored(&f, &root, "build/deep/out.txt"));
    }

    #[test]
    fn dot_segments_are_hidden() {
        let root = TempDir::new().unwrap();
        let temp = TempDir::new().unwrap();
        let f = filter(&root, &temp, false);

        assert!(is_ignored(&f, &root, ".git/config"));
        assert!(is_ignored(&f, &root, "src/.cache"));
        assert!(!is_ignored(&f, &root, "src/main.rs"));
    }

    #[test]
    fn snapshot_area_is_always_excluded() {
        let root = TempDir::new().unwrap();
        let temp = TempDir::new().unwrap();
        let f = filter(&root, &temp, false);

        let snapshot = temp.path().join("some_file-abc123");
        // Matches no pattern but lives under the private temp dir.
        assert!(f.is_ignored(Path::new("some_file-abc123"), &snapshot));
    }
}
