//! The closed set of messages exchanged through the relay
//!
//! Every message is one of the seven variants below. The relay server never
//! inspects file or edit packets; all interpretation happens in the engine
//! on each client.

/// The kind of a single line edit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    /// New lines inserted at a position in the original numbering
    Insert,
    /// A range of original lines replaced by new lines
    Replace,
    /// A range of original lines removed
    Delete,
}

impl EditKind {
    pub(crate) fn to_wire(self) -> u8 {
        match self {
            EditKind::Insert => 0,
            EditKind::Replace => 1,
            EditKind::Delete => 2,
        }
    }

    pub(crate) fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(EditKind::Insert),
            1 => Some(EditKind::Replace),
            2 => Some(EditKind::Delete),
            _ => None,
        }
    }
}

/// A connected peer as seen in the roster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerIdentity {
    /// Connection id assigned by the relay server
    pub id: u32,
    /// Display name announced by the peer
    pub name: String,
}

/// One wire packet carrying part of an edit batch
///
/// `start`/`end` are line indices in the original (pre-edit) numbering.
/// Insert packets always have `start == end`; Delete packets carry no lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditPacket {
    pub file_name: String,
    pub kind: EditKind,
    pub lines: Vec<String>,
    pub start: u32,
    pub end: u32,
}

/// Every message the relay carries
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// A peer announcing (or the server granting) a connection identity
    ClientIdentity(PeerIdentity),
    /// Broadcast by the server when a peer drops
    PeerDisconnected { id: u32 },
    /// A file appeared at the sender's replica
    CreateFile { file_name: String },
    /// A file disappeared from the sender's replica
    DeleteFile { file_name: String },
    /// Opens an edit batch for one file
    BeginEdit { file_name: String },
    /// One bounded-size slice of an edit batch
    Edit(EditPacket),
    /// Closes an edit batch; the receiver applies the accumulated edits
    EndEdit { file_name: String },
}

impl Packet {
    /// The file this packet addresses, if it is a file-level packet
    pub fn file_name(&self) -> Option<&str> {
        match self {
            Packet::CreateFile { file_name }
            | Packet::DeleteFile { file_name }
            | Packet::BeginEdit { file_name }
            | Packet::EndEdit { file_name } => Some(file_name),
            Packet::Edit(edit) => Some(&edit.file_name),
            Packet::ClientIdentity(_) | Packet::PeerDisconnected { .. } => None,
        }
    }
}
