//! Edit packetization and interpretation
//!
//! Encoding walks an edit's new-line range and slices it into wire packets:
//! a packet closes once its accumulated byte size reaches half the wire
//! buffer limit, except that a line pushing the total past the full limit is
//! withheld and re-offered to the next packet. Replace packets recompute
//! their `start`/`end` against the original numbering from the offset
//! already consumed, capped at the edit's old-range end: once a growing
//! replace has consumed every original row, the remaining packets carry
//! `start == end` at that boundary and behave as insertions there. Insert
//! packets always carry `start == end`; Delete is a single range-only
//! packet. A single line at or above the full limit cannot be represented
//! and fails the batch.
//!
//! Interpretation accumulates packets per file between Begin/End markers,
//! merging adjacent same-kind packets with contiguous ranges. On End the
//! list is reversed, and application proceeds last-edit-first so the length
//! changes of applied edits never invalidate the original-numbering indices
//! of edits still pending. Within one op, lines are inserted
//! last-line-first for the same reason.

use std::collections::HashMap;

use sync_net::{EditKind, EditPacket, BUFFER_SIZE};
use tracing::warn;

use crate::diff::Edit;
use crate::error::{Result, SyncError};

/// Converts a whole edit script into ordered wire packets.
pub fn encode_edits(
    file_name: &str,
    new_lines: &[String],
    edits: &[Edit],
) -> Result<Vec<EditPacket>> {
    let mut packets = Vec::new();
    for edit in edits {
        packets.extend(encode_edit_with_limit(file_name, new_lines, edit, BUFFER_SIZE)?);
    }
    Ok(packets)
}

/// Converts one edit into packets under the default wire buffer limit.
pub fn encode_edit(file_name: &str, new_lines: &[String], edit: &Edit) -> Result<Vec<EditPacket>> {
    encode_edit_with_limit(file_name, new_lines, edit, BUFFER_SIZE)
}

fn packet(file_name: &str, kind: EditKind, lines: Vec<String>, start: usize, end: usize) -> EditPacket {
    EditPacket {
        file_name: file_name.to_string(),
        kind,
        lines,
        start: start as u32,
        end: end as u32,
    }
}

pub(crate) fn encode_edit_with_limit(
    file_name: &str,
    new_lines: &[String],
    edit: &Edit,
    buffer_limit: usize,
) -> Result<Vec<EditPacket>> {
    let kind = edit.kind();
    if kind == EditKind::Delete {
        return Ok(vec![packet(file_name, kind, Vec::new(), edit.begin_old, edit.end_old)]);
    }

    // Close packets at half the limit so a full frame (lines plus envelope)
    // always fits under the limit itself.
    let packet_budget = buffer_limit / 2;
    let mut packets = Vec::new();
    let mut packet_begin = edit.begin_new;
    let mut lines: Vec<String> = Vec::new();
    let mut byte_size = 0usize;

    let mut i = edit.begin_new;
    while i < edit.end_new {
        let line = &new_lines[i];
        let line_bytes = line.len();
        if line_bytes >= buffer_limit {
            return Err(SyncError::OversizedLine { file: file_name.to_string(), line: i });
        }

        byte_size += line_bytes;
        if byte_size >= packet_budget {
            // This line overflows the full buffer: close the packet one line
            // early and re-offer the line to the next packet.
            let overflows = byte_size >= buffer_limit;
            if !overflows {
                lines.push(line.clone());
            }
            let (start, end) = match kind {
                EditKind::Replace => {
                    // Capped: old rows past `end_old` do not exist, so the
                    // surplus of a growing replace inserts at the boundary.
                    let start =
                        (edit.begin_old + (packet_begin - edit.begin_new)).min(edit.end_old);
                    let end = (start + (i - packet_begin) + usize::from(!overflows))
                        .min(edit.end_old);
                    (start, end)
                }
                // Inserts address one original position for every chunk.
                _ => (edit.begin_old, edit.begin_old),
            };
            packets.push(packet(file_name, kind, std::mem::take(&mut lines), start, end));

            byte_size = 0;
            packet_begin = i + usize::from(!overflows);
            if !overflows {
                i += 1;
            }
        } else {
            lines.push(line.clone());
            i += 1;
        }
    }

    // Flush whatever accumulated under the budget.
    if !lines.is_empty() {
        let (start, end) = match kind {
            EditKind::Replace => (
                (edit.begin_old + (packet_begin - edit.begin_new)).min(edit.end_old),
                edit.end_old,
            ),
            _ => (edit.begin_old, edit.begin_old),
        };
        packets.push(packet(file_name, kind, lines, start, end));
    }

    Ok(packets)
}

/// Accumulates and consolidates inbound edit packets between Begin/End
#[derive(Debug, Default)]
pub struct EditInterpreter {
    pending: HashMap<String, Vec<EditPacket>>,
}

impl EditInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a batch for a file. A file has at most one open batch; a second
    /// Begin for the same file indicates concurrent edit origins and
    /// replaces the previous batch.
    pub fn begin(&mut self, file_name: &str) {
        if self.pending.insert(file_name.to_string(), Vec::new()).is_some() {
            warn!("discarding an already-open edit batch for {file_name}");
        }
    }

    /// Appends a packet to its file's open batch, merging into the previous
    /// packet when the kinds match and the ranges are contiguous.
    pub fn insert(&mut self, edit: EditPacket) {
        let Some(edits) = self.pending.get_mut(&edit.file_name) else {
            warn!("edit packet for {} without an open batch", edit.file_name);
            return;
        };
        if let Some(prev) = edits.last_mut() {
            if prev.kind == edit.kind && prev.end == edit.start {
                prev.lines.extend(edit.lines);
                prev.end = edit.end;
                return;
            }
        }
        edits.push(edit);
    }

    /// Closes a file's batch and returns its consolidated packets, reversed
    /// into application order (highest-numbered edit first).
    pub fn end(&mut self, file_name: &str) -> Vec<EditPacket> {
        let mut edits = self.pending.remove(file_name).unwrap_or_default();
        edits.reverse();
        edits
    }

    /// True if a batch for this file is currently open.
    pub fn is_open(&self, file_name: &str) -> bool {
        self.pending.contains_key(file_name)
    }
}

/// Applies a finalized (reversed) batch to the live line list.
pub fn apply_edits(
    file_name: &str,
    edits: &[EditPacket],
    lines: &mut Vec<String>,
) -> Result<()> {
    for edit in edits {
        let start = edit.start as usize;
        let end = edit.end as usize;
        let bounds_ok = match edit.kind {
            EditKind::Insert => start <= lines.len(),
            EditKind::Replace | EditKind::Delete => start <= end && end <= lines.len(),
        };
        if !bounds_ok {
            return Err(SyncError::EditOutOfBounds {
                file: file_name.to_string(),
                start,
                end,
                len: lines.len(),
            });
        }
        match edit.kind {
            EditKind::Replace => {
                lines.drain(start..end);
                for line in edit.lines.iter().rev() {
                    lines.insert(start, line.clone());
                }
            }
            EditKind::Insert => {
                for line in edit.lines.iter().rev() {
                    lines.insert(start, line.clone());
                }
            }
            EditKind::Delete => {
                lines.drain(start..end);
            }
        }
    }
    Ok(())
}
