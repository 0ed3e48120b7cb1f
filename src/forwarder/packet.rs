use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::Event;
use super::Operation;
use crate::ChannelId;
use crate::PacketError;
use crate::TaskId;

/// seq u32 + actor u8 + channel u16 + op u8 + size u8
pub const PACKET_HEADER_LEN: usize = 9;

/// Prefix used when none is configured
pub const DEFAULT_LINE_PREFIX: &str = "@CHANBUS:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Position of the event in the forwarded stream, wraps around
    pub seq: u32,
    pub event: Event,
}

impl Packet {
    pub fn encode(&self) -> Vec<u8> {
        let payload = &self.event.payload;
        // channel sizes are bounded by one byte
        let size = payload.len().min(u8::MAX as usize);

        let mut buf = Vec::with_capacity(PACKET_HEADER_LEN + size);
        buf.extend_from_slice(&self.seq.to_le_bytes());
        buf.push(self.event.actor.0);
        buf.extend_from_slice(&self.event.channel.0.to_le_bytes());
        buf.push(self.event.op.code());
        buf.push(size as u8);
        buf.extend_from_slice(&payload[..size]);
        buf
    }

    pub fn decode(bytes: &[u8]) -> std::result::Result<Self, PacketError> {
        if bytes.len() < PACKET_HEADER_LEN {
            return Err(PacketError::Truncated(bytes.len()));
        }

        let seq = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let actor = TaskId(bytes[4]);
        let channel = ChannelId(u16::from_le_bytes([bytes[5], bytes[6]]));
        let op = Operation::from_code(bytes[7]).ok_or(PacketError::UnknownOperation(bytes[7]))?;
        let declared = bytes[8] as usize;

        let payload = &bytes[PACKET_HEADER_LEN..];
        if payload.len() != declared {
            return Err(PacketError::SizeMismatch {
                declared,
                actual: payload.len(),
            });
        }

        Ok(Self {
            seq,
            event: Event {
                actor,
                channel,
                op,
                payload: payload.to_vec(),
            },
        })
    }
}

/// Frames a packet as one text line, newline included.
pub fn encode_line(
    prefix: &str,
    packet: &Packet,
) -> String {
    let mut line = String::with_capacity(prefix.len() + 4 * (PACKET_HEADER_LEN + 255) / 3 + 2);
    line.push_str(prefix);
    STANDARD.encode_string(packet.encode(), &mut line);
    line.push('\n');
    line
}

/// Parses a line produced by the forwarder; trailing whitespace is ignored.
pub fn decode_line(
    prefix: &str,
    line: &str,
) -> std::result::Result<Packet, PacketError> {
    let encoded = line.trim_end().strip_prefix(prefix).ok_or(PacketError::MissingPrefix)?;
    let bytes = STANDARD.decode(encoded)?;
    Packet::decode(&bytes)
}
