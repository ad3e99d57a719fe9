//! Session boundary
//!
//! [`start_project`] is the entry point consumed by the binaries: it builds
//! the orchestration stack for one project root and returns a
//! [`ProjectSession`] handle plus the session event stream. The caller owns
//! the network side; it feeds every inbound packet to
//! [`ProjectSession::interpret`] and drains the handle's outbound channel
//! into its connection. Events are delivered over a plain FIFO channel, so
//! any consumer drains them on its own schedule.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sync_net::{Packet, PeerIdentity};
use tokio::sync::mpsc;

use crate::error::Result;
use crate::project::ProjectHandler;

/// Asynchronous notifications surfaced to the session's consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A peer announced (or re-announced) its identity
    PeerConnected(PeerIdentity),
    /// A peer's connection closed
    PeerDisconnected { id: u32 },
    /// The local replica of a file can no longer be trusted
    Desynchronized { path: PathBuf, message: String },
}

/// Handle to one synchronized project
pub struct ProjectSession {
    handler: Arc<ProjectHandler>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

/// Starts tracking `root`: scans it, seeds snapshots, and begins watching.
/// Outbound packets are queued on `outbound`; the returned receiver carries
/// roster changes and desynchronization warnings.
pub async fn start_project(
    root: &Path,
    honor_gitignore: bool,
    outbound: mpsc::UnboundedSender<Packet>,
) -> Result<(ProjectSession, mpsc::UnboundedReceiver<SessionEvent>)> {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let handler = ProjectHandler::new(root, honor_gitignore, outbound, event_tx.clone())?;
    handler.start().await?;
    Ok((ProjectSession { handler, events: event_tx }, event_rx))
}

impl ProjectSession {
    /// Routes one inbound packet to its handler.
    pub async fn interpret(&self, packet: Packet) {
        match packet {
            Packet::ClientIdentity(peer) => {
                let _ = self.events.send(SessionEvent::PeerConnected(peer));
            }
            Packet::PeerDisconnected { id } => {
                let _ = self.events.send(SessionEvent::PeerDisconnected { id });
            }
            Packet::CreateFile { file_name } => self.handler.create_file(&file_name).await,
            Packet::DeleteFile { file_name } => self.handler.delete_file(&file_name).await,
            Packet::BeginEdit { file_name } => self.handler.begin_edit(&file_name).await,
            Packet::Edit(edit) => self.handler.push_edit(edit).await,
            Packet::EndEdit { file_name } => self.handler.end_edit(&file_name).await,
        }
    }

    pub fn root(&self) -> &Path {
        self.handler.root()
    }

    /// Stops watching and tears the session down. Idempotent.
    pub fn close(&self) {
        self.handler.close();
    }
}
