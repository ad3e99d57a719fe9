//! Binary wire layout and framing
//!
//! Frames are a big-endian u32 body length followed by the body. The body is
//! a one-byte packet tag and the variant's fields in a fixed order: strings
//! are varint-length-prefixed UTF-8, line ranges are varints. An Edit body
//! omits `end` for Insert (it equals `start`) and omits `lines` for Delete,
//! matching the layout both ends agree on by sharing the same build.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{NetError, Result};
use crate::packet::{EditKind, EditPacket, Packet, PeerIdentity};
use crate::BUFFER_SIZE;

const TAG_CLIENT_IDENTITY: u8 = 1;
const TAG_PEER_DISCONNECTED: u8 = 2;
const TAG_CREATE_FILE: u8 = 3;
const TAG_DELETE_FILE: u8 = 4;
const TAG_BEGIN_EDIT: u8 = 5;
const TAG_EDIT: u8 = 6;
const TAG_END_EDIT: u8 = 7;

fn put_varint(buf: &mut BytesMut, mut value: u32) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.put_u8(byte);
            return;
        }
        buf.put_u8(byte | 0x80);
    }
}

fn get_varint(buf: &mut Bytes) -> Result<u32> {
    let mut value: u32 = 0;
    let mut shift = 0;
    loop {
        if !buf.has_remaining() {
            return Err(NetError::Malformed("truncated varint".into()));
        }
        let byte = buf.get_u8();
        if shift == 28 && byte > 0x0f {
            return Err(NetError::Malformed("varint overflows u32".into()));
        }
        value |= u32::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
    }
}

fn put_string(buf: &mut BytesMut, value: &str) {
    put_varint(buf, value.len() as u32);
    buf.put_slice(value.as_bytes());
}

fn get_string(buf: &mut Bytes) -> Result<String> {
    let len = get_varint(buf)? as usize;
    if buf.remaining() < len {
        return Err(NetError::Malformed("truncated string".into()));
    }
    let raw = buf.split_to(len);
    String::from_utf8(raw.to_vec()).map_err(|_| NetError::Malformed("invalid UTF-8".into()))
}

fn put_lines(buf: &mut BytesMut, lines: &[String]) {
    put_varint(buf, lines.len() as u32);
    for line in lines {
        put_string(buf, line);
    }
}

fn get_lines(buf: &mut Bytes) -> Result<Vec<String>> {
    let count = get_varint(buf)? as usize;
    let mut lines = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        lines.push(get_string(buf)?);
    }
    Ok(lines)
}

fn encode_body(packet: &Packet, buf: &mut BytesMut) {
    match packet {
        Packet::ClientIdentity(identity) => {
            buf.put_u8(TAG_CLIENT_IDENTITY);
            put_varint(buf, identity.id);
            put_string(buf, &identity.name);
        }
        Packet::PeerDisconnected { id } => {
            buf.put_u8(TAG_PEER_DISCONNECTED);
            put_varint(buf, *id);
        }
        Packet::CreateFile { file_name } => {
            buf.put_u8(TAG_CREATE_FILE);
            put_string(buf, file_name);
        }
        Packet::DeleteFile { file_name } => {
            buf.put_u8(TAG_DELETE_FILE);
            put_string(buf, file_name);
        }
        Packet::BeginEdit { file_name } => {
            buf.put_u8(TAG_BEGIN_EDIT);
            put_string(buf, file_name);
        }
        Packet::Edit(edit) => {
            buf.put_u8(TAG_EDIT);
            put_string(buf, &edit.file_name);
            buf.put_u8(edit.kind.to_wire());
            if edit.kind != EditKind::Delete {
                put_lines(buf, &edit.lines);
            }
            put_varint(buf, edit.start);
            if edit.kind != EditKind::Insert {
                put_varint(buf, edit.end);
            }
        }
        Packet::EndEdit { file_name } => {
            buf.put_u8(TAG_END_EDIT);
            put_string(buf, file_name);
        }
    }
}

fn decode_body(buf: &mut Bytes) -> Result<Packet> {
    if !buf.has_remaining() {
        return Err(NetError::Malformed("empty frame".into()));
    }
    let tag = buf.get_u8();
    let packet = match tag {
        TAG_CLIENT_IDENTITY => {
            let id = get_varint(buf)?;
            let name = get_string(buf)?;
            Packet::ClientIdentity(PeerIdentity { id, name })
        }
        TAG_PEER_DISCONNECTED => Packet::PeerDisconnected { id: get_varint(buf)? },
        TAG_CREATE_FILE => Packet::CreateFile { file_name: get_string(buf)? },
        TAG_DELETE_FILE => Packet::DeleteFile { file_name: get_string(buf)? },
        TAG_BEGIN_EDIT => Packet::BeginEdit { file_name: get_string(buf)? },
        TAG_EDIT => {
            let file_name = get_string(buf)?;
            if !buf.has_remaining() {
                return Err(NetError::Malformed("truncated edit frame".into()));
            }
            let kind_byte = buf.get_u8();
            let kind = EditKind::from_wire(kind_byte)
                .ok_or_else(|| NetError::Malformed(format!("unknown edit kind {kind_byte}")))?;
            let lines = if kind != EditKind::Delete { get_lines(buf)? } else { Vec::new() };
            let start = get_varint(buf)?;
            let end = if kind != EditKind::Insert { get_varint(buf)? } else { start };
            Packet::Edit(EditPacket { file_name, kind, lines, start, end })
        }
        TAG_END_EDIT => Packet::EndEdit { file_name: get_string(buf)? },
        other => return Err(NetError::Malformed(format!("unknown packet tag {other}"))),
    };
    Ok(packet)
}

/// Frames [`Packet`]s over an ordered byte stream
#[derive(Debug, Default)]
pub struct PacketCodec;

impl Encoder<Packet> for PacketCodec {
    type Error = NetError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<()> {
        let mut body = BytesMut::with_capacity(64);
        encode_body(&item, &mut body);
        if body.len() > BUFFER_SIZE {
            return Err(NetError::FrameTooLarge { len: body.len(), limit: BUFFER_SIZE });
        }
        dst.reserve(4 + body.len());
        dst.put_u32(body.len() as u32);
        dst.extend_from_slice(&body);
        Ok(())
    }
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = NetError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>> {
        if src.len() < 4 {
            return Ok(None);
        }
        let len = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if len > BUFFER_SIZE {
            return Err(NetError::FrameTooLarge { len, limit: BUFFER_SIZE });
        }
        if src.len() < 4 + len {
            src.reserve(4 + len - src.len());
            return Ok(None);
        }
        src.advance(4);
        let mut body = src.split_to(len).freeze();
        let packet = decode_body(&mut body)?;
        if body.has_remaining() {
            return Err(NetError::Malformed("trailing bytes in frame".into()));
        }
        Ok(Some(packet))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(packet: Packet) -> BytesMut {
        let mut dst = BytesMut::new();
        PacketCodec.encode(packet, &mut dst).unwrap();
        dst
    }

    fn decode_one(buf: &mut BytesMut) -> Packet {
        PacketCodec.decode(buf).unwrap().expect("complete frame")
    }

    #[test]
    fn identity_and_roster_packets() {
        let mut buf = encode(Packet::ClientIdentity(PeerIdentity {
            id: 300,
            name: "ada".into(),
        }));
        buf.extend_from_slice(&encode(Packet::PeerDisconnected { id: 300 }));

        assert_eq!(
            decode_one(&mut buf),
            Packet::ClientIdentity(PeerIdentity { id: 300, name: "ada".into() })
        );
        assert_eq!(decode_one(&mut buf), Packet::PeerDisconnected { id: 300 });
        assert!(buf.is_empty());
    }

    #[test]
    fn insert_omits_end_on_the_wire() {
        let insert = Packet::Edit(EditPacket {
            file_name: "src/main.rs".into(),
            kind: EditKind::Insert,
            lines: vec!["fn main() {}".into()],
            start: 4,
            end: 4,
        });
        let delete = Packet::Edit(EditPacket {
            file_name: "src/main.rs".into(),
            kind: EditKind::Delete,
            lines: Vec::new(),
            start: 1,
            end: 3,
        });
        // The delete body skips the line list, the insert body skips `end`;
        // both must still round-trip to equal packets.
        let mut buf = encode(insert.clone());
        buf.extend_from_slice(&encode(delete.clone()));
        assert_eq!(decode_one(&mut buf), insert);
        assert_eq!(decode_one(&mut buf), delete);
    }

    #[test]
    fn partial_frame_waits_for_more_bytes() {
        let full = encode(Packet::BeginEdit { file_name: "notes.txt".into() });
        let mut partial = BytesMut::from(&full[..3]);
        assert!(PacketCodec.decode(&mut partial).unwrap().is_none());
        partial.extend_from_slice(&full[3..]);
        assert_eq!(
            decode_one(&mut partial),
            Packet::BeginEdit { file_name: "notes.txt".into() }
        );
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let line = "x".repeat(BUFFER_SIZE);
        let packet = Packet::Edit(EditPacket {
            file_name: "big.txt".into(),
            kind: EditKind::Insert,
            lines: vec![line],
            start: 0,
            end: 0,
        });
        let mut dst = BytesMut::new();
        let err = PacketCodec.encode(packet, &mut dst).unwrap_err();
        assert!(matches!(err, NetError::FrameTooLarge { .. }));
        assert!(dst.is_empty());
    }

    #[test]
    fn edit_frame_truncated_before_the_kind_byte_is_malformed() {
        // A well-framed body that ends right after the file name must fail
        // as a decode error, not bring down the read task.
        let mut body = BytesMut::new();
        body.put_u8(TAG_EDIT);
        put_string(&mut body, "f.txt");
        let mut buf = BytesMut::new();
        buf.put_u32(body.len() as u32);
        buf.extend_from_slice(&body);

        let err = PacketCodec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, NetError::Malformed(_)));
    }

    #[test]
    fn unknown_tag_is_malformed() {
        let mut buf = BytesMut::new();
        buf.put_u32(1);
        buf.put_u8(42);
        let err = PacketCodec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, NetError::Malformed(_)));
    }
}
