//! Project orchestration
//!
//! [`ProjectHandler`] is the coordinator between the watcher, the ignore
//! filter, the snapshot store, the diff/packet codec, and the network. Local
//! filesystem changes flow in through [`ProjectHandler::on_create`] /
//! [`on_modify`](ProjectHandler::on_modify) /
//! [`on_delete`](ProjectHandler::on_delete); remote commands flow in through
//! [`create_file`](ProjectHandler::create_file) /
//! [`delete_file`](ProjectHandler::delete_file) and the
//! `begin_edit`/`push_edit`/`end_edit` batch entry points.
//!
//! Feedback suppression: before a network-triggered mutation touches disk,
//! the file's canonical relative path is marked in one of three pending sets
//! (create, modify, delete). When the watcher later reports the resulting OS
//! event, the mark is consumed and no outbound packet is produced.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use sync_net::Packet;
use tokio::io::ErrorKind;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::codec::{self, EditInterpreter};
use crate::diff;
use crate::error::Result;
use crate::filter::IgnoreFilter;
use crate::session::SessionEvent;
use crate::snapshot::{is_text, SnapshotStore};
use crate::watcher::{DirectoryWatcher, FsChange, FsChangeKind};

/// Canonical forward-slash form of a root-relative path, as sent on the wire.
pub fn wire_path(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Splits file content into lines, tolerating CRLF input. A trailing
/// newline does not produce a final empty line.
pub(crate) fn split_lines(content: &str) -> Vec<String> {
    if content.is_empty() {
        return Vec::new();
    }
    let mut lines: Vec<String> = content
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect();
    if content.ends_with('\n') {
        lines.pop();
    }
    lines
}

/// Inverse of [`split_lines`]; output always uses `\n` endings.
pub(crate) fn join_lines(lines: &[String]) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let mut content = lines.join("\n");
    content.push('\n');
    content
}

/// Coordinates one synchronized project tree
pub struct ProjectHandler {
    root: PathBuf,
    filter: IgnoreFilter,
    snapshots: SnapshotStore,
    interpreter: tokio::sync::Mutex<EditInterpreter>,
    pending_creates: Mutex<HashSet<String>>,
    pending_modifies: Mutex<HashSet<String>>,
    pending_deletes: Mutex<HashSet<String>>,
    outbound: mpsc::UnboundedSender<Packet>,
    events: mpsc::UnboundedSender<SessionEvent>,
    watcher: Arc<DirectoryWatcher>,
}

impl ProjectHandler {
    /// Builds the handler without scanning or dispatching; see [`Self::start`].
    pub fn new(
        root: &Path,
        honor_gitignore: bool,
        outbound: mpsc::UnboundedSender<Packet>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<Arc<Self>> {
        let root = root.canonicalize()?;
        let snapshots = SnapshotStore::new(&root)?;
        let filter = IgnoreFilter::new(&root, snapshots.temp_path(), honor_gitignore)?;
        let watcher = Arc::new(DirectoryWatcher::new()?);
        Ok(Arc::new(Self {
            root,
            filter,
            snapshots,
            interpreter: tokio::sync::Mutex::new(EditInterpreter::new()),
            pending_creates: Mutex::new(HashSet::new()),
            pending_modifies: Mutex::new(HashSet::new()),
            pending_deletes: Mutex::new(HashSet::new()),
            outbound,
            events,
            watcher,
        }))
    }

    /// Walks the tree once, registering every non-ignored directory and
    /// seeding snapshots for existing text files (no network traffic), then
    /// spawns the watcher dispatch loop.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        self.watcher.register(&self.root)?;
        let walker = walkdir::WalkDir::new(&self.root).min_depth(1).into_iter();
        for entry in walker.filter_entry(|e| {
            let relative = e.path().strip_prefix(&self.root).unwrap_or(e.path());
            !self.filter.is_ignored(relative, e.path())
        }) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("initial scan: {e}");
                    continue;
                }
            };
            if entry.file_type().is_dir() {
                if let Err(e) = self.watcher.register(entry.path()) {
                    warn!("initial scan: {e}");
                }
            } else if let Err(e) = self.snapshots.get_or_create(entry.path()).await {
                warn!("initial scan: snapshot for {}: {e}", entry.path().display());
            }
        }
        info!("tracking {}", self.root.display());

        let Some(mut changes) = self.watcher.take_changes() else {
            return Ok(());
        };
        let handler = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(FsChange { path, kind }) = changes.recv().await {
                match kind {
                    FsChangeKind::Created => handler.on_create(&path).await,
                    FsChangeKind::Modified => handler.on_modify(&path).await,
                    FsChangeKind::Removed => handler.on_delete(&path).await,
                }
            }
        });
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stops watching. Pending batches and suppression marks are discarded.
    pub fn close(&self) {
        self.watcher.end();
    }

    fn relative(&self, absolute: &Path) -> Option<PathBuf> {
        absolute.strip_prefix(&self.root).ok().map(Path::to_path_buf)
    }

    /// Maps a wire name back under the project root, refusing anything that
    /// would escape it.
    fn resolve(&self, wire_name: &str) -> Option<PathBuf> {
        if wire_name.is_empty() {
            return None;
        }
        let mut resolved = self.root.clone();
        for segment in wire_name.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                warn!("rejecting wire path {wire_name:?}");
                return None;
            }
            resolved.push(segment);
        }
        Some(resolved)
    }

    fn consume_mark(set: &Mutex<HashSet<String>>, wire: &str) -> bool {
        set.lock().remove(wire)
    }

    /// A remote command for a locally-ignored path is dropped outright: the
    /// watcher would filter its echo before consuming any suppression mark,
    /// so marking it would leak the mark forever.
    fn locally_ignored(&self, absolute: &Path) -> bool {
        match self.relative(absolute) {
            Some(relative) => self.filter.is_ignored(&relative, absolute),
            None => true,
        }
    }

    fn send(&self, packet: Packet) {
        // A closed outbound channel means the session is shutting down.
        let _ = self.outbound.send(packet);
    }

    fn escalate(&self, path: PathBuf, message: String) {
        warn!("replica for {} may be desynchronized: {message}", path.display());
        let _ = self.events.send(SessionEvent::Desynchronized { path, message });
    }

    /// Local creation: suppressed when self-caused, otherwise announced with
    /// `CreateFile` plus the full content as an edit batch for non-empty
    /// text files. New directories are registered and their contents
    /// replayed as creations.
    pub async fn on_create(&self, absolute: &Path) {
        let Some(relative) = self.relative(absolute) else {
            return;
        };
        if self.filter.is_ignored(&relative, absolute) {
            return;
        }
        let wire = wire_path(&relative);
        if Self::consume_mark(&self.pending_creates, &wire) {
            debug!("suppressed self-caused creation of {wire}");
            return;
        }

        if absolute.is_dir() {
            if let Err(e) = self.watcher.register(absolute) {
                warn!("{e}");
            }
            // A directory moved in arrives as one event; replay its contents.
            let entries = match std::fs::read_dir(absolute) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("listing {}: {e}", absolute.display());
                    return;
                }
            };
            for entry in entries.flatten() {
                Box::pin(self.on_create(&entry.path())).await;
            }
            return;
        }

        self.send(Packet::CreateFile { file_name: wire.clone() });
        if let Err(e) = self.announce_content(absolute, &wire).await {
            warn!("sending content of {wire}: {e}");
        }
    }

    /// Diffs the new file against an empty baseline and seeds its snapshot.
    async fn announce_content(&self, absolute: &Path, wire: &str) -> Result<()> {
        if !is_text(absolute).await {
            return Ok(());
        }
        let content = tokio::fs::read_to_string(absolute).await?;
        let lines = split_lines(&content);
        if !lines.is_empty() {
            let edits = diff::diff::<String>(&[], &lines);
            self.send_batch(wire, &lines, &edits)?;
        }
        self.snapshots.refresh(absolute).await?;
        Ok(())
    }

    /// Local modification: suppressed when self-caused; otherwise diff
    /// against the baseline, transmit, and roll the baseline forward.
    pub async fn on_modify(&self, absolute: &Path) {
        let Some(relative) = self.relative(absolute) else {
            return;
        };
        let wire = wire_path(&relative);
        if Self::consume_mark(&self.pending_modifies, &wire) {
            debug!("suppressed self-caused modification of {wire}");
            return;
        }
        if !absolute.exists() || absolute.is_dir() {
            return;
        }
        if self.filter.is_ignored(&relative, absolute) {
            return;
        }
        if let Err(e) = self.diff_and_send(absolute, &wire).await {
            warn!("diffing {wire}: {e}");
        }
    }

    async fn diff_and_send(&self, absolute: &Path, wire: &str) -> Result<()> {
        let Some(snapshot) = self.snapshots.get_or_create(absolute).await? else {
            return Ok(());
        };
        let old = split_lines(&tokio::fs::read_to_string(&snapshot).await?);
        let new = split_lines(&tokio::fs::read_to_string(absolute).await?);
        let edits = diff::diff(&old, &new);
        // Duplicate notifications for one logical write diff to nothing.
        if edits.is_empty() {
            return Ok(());
        }
        self.send_batch(wire, &new, &edits)?;
        self.snapshots.refresh(absolute).await?;
        Ok(())
    }

    fn send_batch(&self, wire: &str, new_lines: &[String], edits: &[diff::Edit]) -> Result<()> {
        // Encode before Begin so a failed batch sends nothing at all.
        let packets = codec::encode_edits(wire, new_lines, edits)?;
        self.send(Packet::BeginEdit { file_name: wire.to_string() });
        for packet in packets {
            self.send(Packet::Edit(packet));
        }
        self.send(Packet::EndEdit { file_name: wire.to_string() });
        Ok(())
    }

    /// Local deletion: suppressed when self-caused; the `DeleteFile` packet
    /// is withheld while the parent is also gone, so a directory removal
    /// cascade does not spray per-child packets.
    pub async fn on_delete(&self, absolute: &Path) {
        let Some(relative) = self.relative(absolute) else {
            return;
        };
        if self.filter.is_ignored(&relative, absolute) {
            return;
        }
        let wire = wire_path(&relative);
        if Self::consume_mark(&self.pending_deletes, &wire) {
            debug!("suppressed self-caused deletion of {wire}");
            return;
        }
        self.snapshots.evict(absolute).await;
        let parent_exists = absolute.parent().map(Path::exists).unwrap_or(false);
        if parent_exists {
            self.send(Packet::DeleteFile { file_name: wire });
        }
    }

    /// Remote-triggered creation. The suppression mark lands before the
    /// mutation so the watcher's echo is recognized.
    pub async fn create_file(&self, wire_name: &str) {
        let Some(absolute) = self.resolve(wire_name) else {
            return;
        };
        if self.locally_ignored(&absolute) {
            debug!("dropping remote creation of ignored {wire_name}");
            return;
        }
        self.pending_creates.lock().insert(wire_name.to_string());
        if let Err(e) = self.materialize(&absolute).await {
            self.pending_creates.lock().remove(wire_name);
            self.escalate(absolute, format!("creating file: {e}"));
        }
    }

    async fn materialize(&self, absolute: &Path) -> Result<()> {
        if let Some(parent) = absolute.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .open(absolute)
            .await?;
        self.snapshots.get_or_create(absolute).await?;
        Ok(())
    }

    /// Remote-triggered deletion, mark-then-mutate like [`Self::create_file`].
    pub async fn delete_file(&self, wire_name: &str) {
        let Some(absolute) = self.resolve(wire_name) else {
            return;
        };
        if self.locally_ignored(&absolute) {
            debug!("dropping remote deletion of ignored {wire_name}");
            return;
        }
        self.pending_deletes.lock().insert(wire_name.to_string());
        self.snapshots.evict(&absolute).await;
        match tokio::fs::remove_file(&absolute).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.pending_deletes.lock().remove(wire_name);
            }
            Err(e) => {
                self.pending_deletes.lock().remove(wire_name);
                self.escalate(absolute, format!("deleting file: {e}"));
            }
        }
    }

    /// Opens an inbound edit batch.
    pub async fn begin_edit(&self, file_name: &str) {
        self.interpreter.lock().await.begin(file_name);
    }

    /// Appends one inbound edit packet to its open batch.
    pub async fn push_edit(&self, edit: sync_net::EditPacket) {
        self.interpreter.lock().await.insert(edit);
    }

    /// Closes an inbound batch: applies the consolidated edits to the
    /// current file content, writes the result (suppression-marked), and
    /// rolls the baseline forward. Failure past this point means the local
    /// replica can no longer be trusted and is escalated.
    pub async fn end_edit(&self, file_name: &str) {
        let edits = self.interpreter.lock().await.end(file_name);
        if edits.is_empty() {
            return;
        }
        let Some(absolute) = self.resolve(file_name) else {
            return;
        };

        let content = match tokio::fs::read_to_string(&absolute).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => {
                self.escalate(absolute, format!("reading before apply: {e}"));
                return;
            }
        };
        let mut lines = split_lines(&content);
        if let Err(e) = codec::apply_edits(file_name, &edits, &mut lines) {
            self.escalate(absolute, e.to_string());
            return;
        }

        self.pending_modifies.lock().insert(file_name.to_string());
        if let Err(e) = self.write_applied(&absolute, &lines).await {
            self.pending_modifies.lock().remove(file_name);
            self.escalate(absolute, format!("writing applied edits: {e}"));
        }
    }

    async fn write_applied(&self, absolute: &Path, lines: &[String]) -> Result<()> {
        if let Some(parent) = absolute.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(absolute, join_lines(lines)).await?;
        self.snapshots.refresh(absolute).await?;
        Ok(())
    }
}

impl Drop for ProjectHandler {
    fn drop(&mut self) {
        self.watcher.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_net::{EditKind, EditPacket};
    use tempfile::TempDir;
    use tokio::sync::mpsc::{error::TryRecvError, UnboundedReceiver};

    struct Rig {
        root: TempDir,
        handler: Arc<ProjectHandler>,
        outbound: UnboundedReceiver<Packet>,
        events: UnboundedReceiver<SessionEvent>,
    }

    fn rig() -> Rig {
        let root = TempDir::new().unwrap();
        let (out_tx, outbound) = mpsc::unbounded_channel();
        let (event_tx, events) = mpsc::unbounded_channel();
        let handler = ProjectHandler::new(root.path(), false, out_tx, event_tx).unwrap();
        Rig { root, handler, outbound, events }
    }

    fn assert_quiet(rx: &mut UnboundedReceiver<Packet>) {
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn wire_paths_are_forward_slash_joined() {
        assert_eq!(wire_path(Path::new("a/b/c.txt")), "a/b/c.txt");
        assert_eq!(wire_path(Path::new("top.txt")), "top.txt");
    }

    #[test]
    fn line_splitting_round_trips_and_tolerates_crlf() {
        assert_eq!(split_lines(""), Vec::<String>::new());
        assert_eq!(split_lines("a\nb\n"), vec!["a", "b"]);
        assert_eq!(split_lines("a\r\nb"), vec!["a", "b"]);
        assert_eq!(join_lines(&split_lines("a\nb\n")), "a\nb\n");
        assert_eq!(join_lines(&[]), "");
    }

    #[tokio::test]
    async fn local_creation_announces_file_and_content() {
        let mut r = rig();
        let file = r.root.path().join("new.txt");
        tokio::fs::write(&file, "one\ntwo\n").await.unwrap();

        r.handler.on_create(&file).await;

        assert!(matches!(
            r.outbound.try_recv().unwrap(),
            Packet::CreateFile { file_name } if file_name == "new.txt"
        ));
        assert!(matches!(r.outbound.try_recv().unwrap(), Packet::BeginEdit { .. }));
        match r.outbound.try_recv().unwrap() {
            Packet::Edit(edit) => {
                assert_eq!(edit.kind, EditKind::Insert);
                assert_eq!((edit.start, edit.end), (0, 0));
                assert_eq!(edit.lines, vec!["one", "two"]);
            }
            other => panic!("expected Edit, got {other:?}"),
        }
        assert!(matches!(r.outbound.try_recv().unwrap(), Packet::EndEdit { .. }));
        assert_quiet(&mut r.outbound);
    }

    #[tokio::test]
    async fn remote_creation_is_suppressed_at_the_watcher_echo() {
        let mut r = rig();
        r.handler.create_file("made/by/peer.txt").await;
        assert!(r.root.path().join("made/by/peer.txt").exists());

        // The echo the watcher would deliver for this same path.
        r.handler.on_create(&r.root.path().join("made/by/peer.txt")).await;
        assert_quiet(&mut r.outbound);

        // A genuinely new creation afterwards still announces.
        let local = r.root.path().join("made/by/local.txt");
        tokio::fs::write(&local, "").await.unwrap();
        r.handler.on_create(&local).await;
        assert!(matches!(r.outbound.try_recv().unwrap(), Packet::CreateFile { .. }));
    }

    #[tokio::test]
    async fn modification_diffs_against_the_snapshot() {
        let mut r = rig();
        let file = r.root.path().join("doc.txt");
        tokio::fs::write(&file, "a\nb\nc\n").await.unwrap();
        r.handler.snapshots.get_or_create(&file).await.unwrap();

        tokio::fs::write(&file, "a\nx\nc\n").await.unwrap();
        r.handler.on_modify(&file).await;

        assert!(matches!(r.outbound.try_recv().unwrap(), Packet::BeginEdit { .. }));
        match r.outbound.try_recv().unwrap() {
            Packet::Edit(edit) => {
                assert_eq!(edit.kind, EditKind::Replace);
                assert_eq!((edit.start, edit.end), (1, 2));
                assert_eq!(edit.lines, vec!["x"]);
            }
            other => panic!("expected Edit, got {other:?}"),
        }
        assert!(matches!(r.outbound.try_recv().unwrap(), Packet::EndEdit { .. }));

        // The baseline rolled forward, so an unchanged re-notify is silent.
        r.handler.on_modify(&file).await;
        assert_quiet(&mut r.outbound);
    }

    #[tokio::test]
    async fn ignored_paths_produce_no_traffic() {
        let mut r = rig();
        std::fs::write(r.root.path().join(crate::filter::HIDE_FILE), "private.txt\n").unwrap();
        let (out_tx, outbound) = mpsc::unbounded_channel();
        let (event_tx, _events) = mpsc::unbounded_channel();
        let handler = ProjectHandler::new(r.root.path(), false, out_tx, event_tx).unwrap();
        r.outbound = outbound;

        let file = r.root.path().join("private.txt");
        tokio::fs::write(&file, "secret\n").await.unwrap();
        handler.on_create(&file).await;
        handler.on_modify(&file).await;
        handler.on_delete(&file).await;
        assert_quiet(&mut r.outbound);
    }

    #[tokio::test]
    async fn deletion_announces_only_while_the_parent_survives() {
        let mut r = rig();
        std::fs::create_dir(r.root.path().join("dir")).unwrap();
        let file = r.root.path().join("dir/gone.txt");
        tokio::fs::write(&file, "x\n").await.unwrap();
        tokio::fs::remove_file(&file).await.unwrap();

        r.handler.on_delete(&file).await;
        assert!(matches!(
            r.outbound.try_recv().unwrap(),
            Packet::DeleteFile { file_name } if file_name == "dir/gone.txt"
        ));

        // Whole-directory cascade: the parent is gone too, stay silent.
        tokio::fs::remove_dir(r.root.path().join("dir")).await.unwrap();
        r.handler.on_delete(&file).await;
        assert_quiet(&mut r.outbound);
    }

    #[tokio::test]
    async fn remote_deletion_is_suppressed_at_the_watcher_echo() {
        let mut r = rig();
        let file = r.root.path().join("doomed.txt");
        tokio::fs::write(&file, "x\n").await.unwrap();

        r.handler.delete_file("doomed.txt").await;
        assert!(!file.exists());
        r.handler.on_delete(&file).await;
        assert_quiet(&mut r.outbound);
    }

    #[tokio::test]
    async fn inbound_batch_writes_and_suppresses_the_echo() {
        let mut r = rig();
        let file = r.root.path().join("shared.txt");
        tokio::fs::write(&file, "a\nb\nc\n").await.unwrap();
        r.handler.snapshots.get_or_create(&file).await.unwrap();

        r.handler.begin_edit("shared.txt").await;
        r.handler
            .push_edit(EditPacket {
                file_name: "shared.txt".to_string(),
                kind: EditKind::Replace,
                lines: vec!["x".to_string()],
                start: 1,
                end: 2,
            })
            .await;
        r.handler.end_edit("shared.txt").await;

        assert_eq!(tokio::fs::read_to_string(&file).await.unwrap(), "a\nx\nc\n");

        // The watcher echo for the write is consumed silently, and the
        // refreshed baseline keeps a later re-notify silent too.
        r.handler.on_modify(&file).await;
        r.handler.on_modify(&file).await;
        assert_quiet(&mut r.outbound);
    }

    #[tokio::test]
    async fn out_of_range_inbound_edit_escalates_desync() {
        let mut r = rig();
        let file = r.root.path().join("short.txt");
        tokio::fs::write(&file, "only\n").await.unwrap();

        r.handler.begin_edit("short.txt").await;
        r.handler
            .push_edit(EditPacket {
                file_name: "short.txt".to_string(),
                kind: EditKind::Delete,
                lines: Vec::new(),
                start: 3,
                end: 9,
            })
            .await;
        r.handler.end_edit("short.txt").await;

        match r.events.try_recv().unwrap() {
            SessionEvent::Desynchronized { path, .. } => assert_eq!(path, file),
            other => panic!("expected desync event, got {other:?}"),
        }
        // The file itself is untouched.
        assert_eq!(tokio::fs::read_to_string(&file).await.unwrap(), "only\n");
    }

    #[tokio::test]
    async fn remote_commands_for_ignored_paths_leave_no_marks() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join(crate::filter::HIDE_FILE), "private.txt\n").unwrap();
        let (out_tx, _outbound) = mpsc::unbounded_channel();
        let (event_tx, _events) = mpsc::unbounded_channel();
        let handler = ProjectHandler::new(root.path(), false, out_tx, event_tx).unwrap();

        // A peer with different ignore rules announces a path we ignore:
        // nothing is created and no suppression mark is left behind.
        handler.create_file("private.txt").await;
        assert!(!root.path().join("private.txt").exists());
        assert!(handler.pending_creates.lock().is_empty());

        std::fs::write(root.path().join("private.txt"), "kept\n").unwrap();
        handler.delete_file("private.txt").await;
        assert!(root.path().join("private.txt").exists());
        assert!(handler.pending_deletes.lock().is_empty());
    }

    #[tokio::test]
    async fn wire_names_cannot_escape_the_root() {
        let mut r = rig();
        r.handler.create_file("../outside.txt").await;
        r.handler.create_file("/etc/absolute.txt").await;
        assert!(!r.root.path().parent().unwrap().join("outside.txt").exists());
        assert_quiet(&mut r.outbound);
        assert!(matches!(r.events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn start_scans_without_emitting_traffic() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir(root.path().join("src")).unwrap();
        std::fs::write(root.path().join("src/lib.rs"), "mod a;\n").unwrap();

        let (out_tx, mut outbound) = mpsc::unbounded_channel();
        let (event_tx, _events) = mpsc::unbounded_channel();
        let handler = ProjectHandler::new(root.path(), false, out_tx, event_tx).unwrap();
        handler.start().await.unwrap();
        assert_quiet(&mut outbound);

        // Snapshots were seeded, so a startup-time file edited later diffs
        // against its scanned content, not against empty.
        let file = root.path().join("src/lib.rs");
        tokio::fs::write(&file, "mod a;\nmod b;\n").await.unwrap();
        handler.on_modify(&file).await;
        let mut kinds = Vec::new();
        while let Ok(packet) = outbound.try_recv() {
            if let Packet::Edit(edit) = packet {
                kinds.push(edit.kind);
                assert_eq!(edit.lines, vec!["mod b;"]);
            }
        }
        assert_eq!(kinds, vec![EditKind::Insert]);
        handler.close();
    }
}
