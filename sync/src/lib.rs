//! Near-real-time directory co-editing engine
//!
//! Keeps a directory tree synchronized across peers connected through a
//! relay server. Local edits to text files are detected by a filesystem
//! watcher, reduced to minimal line diffs against per-file baseline
//! snapshots, packetized under a wire-size bound, and replayed on every
//! other peer's replica. Feedback suppression marks keep network-originated
//! disk writes from echoing back onto the wire.
//!
//! The crate is consumed through [`session::start_project`], which returns a
//! [`session::ProjectSession`] handle plus an event stream; the caller wires
//! the handle's packet channels to a [`sync_net`] client.

pub mod codec;
pub mod diff;
pub mod error;
pub mod filter;
pub mod project;
pub mod session;
pub mod snapshot;
pub mod watcher;

pub use error::{Result, SyncError};
pub use session::{start_project, ProjectSession, SessionEvent};

#[cfg(test)]
mod sync_property_tests;
