// crates/core/src/codec.rs
//! Vendor binary frame codec.
//!
//! Every frame is a 16-byte big-endian header (total length, header length,
//! protocol version, operation, sequence) followed by a payload. Action
//! frames (op 5) at protocol version 2 carry a zlib-deflated payload that
//! itself starts with another header to strip before the JSON body.

use std::io::Read;

use flate2::read::ZlibDecoder;
use serde::Serialize;

use crate::error::DecodeError;

pub const OP_CLIENT_HEARTBEAT: u32 = 2;
pub const OP_ACTIVITY: u32 = 3;
pub const OP_ACTION: u32 = 5;
pub const OP_CLIENT_AUTH: u32 = 7;
pub const OP_HEARTBEAT_ACK: u32 = 8;

/// Fixed header size, also the encoded header-length field value.
pub const HEADER_LEN: usize = 16;

const PROTOCOL_VERSION: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub total_len: u32,
    pub header_len: u16,
    pub version: u16,
    pub operation: u32,
    pub sequence: u32,
}

/// Decoded payload, branched on the operation code. Operations this client
/// does not know are passed through as `Unknown`, never an error.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameBody {
    /// Online-count metric from an activity frame.
    Activity(u32),
    /// Generic action envelope; only `DANMU_MSG` is consumed downstream.
    Action(serde_json::Value),
    HeartbeatAck,
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub header: FrameHeader,
    pub body: FrameBody,
}

/// `DANMU_MSG` fields pulled out of an action envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanmuMessage {
    pub uid: u64,
    pub author: String,
    pub content: String,
}

#[derive(Serialize)]
struct AuthBody {
    uid: u32,
    roomid: u64,
}

pub(crate) fn encode_packet(operation: u32, body: &[u8]) -> Vec<u8> {
    let total = (HEADER_LEN + body.len()) as u32;
    let mut packet = Vec::with_capacity(total as usize);
    packet.extend_from_slice(&total.to_be_bytes());
    packet.extend_from_slice(&(HEADER_LEN as u16).to_be_bytes());
    packet.extend_from_slice(&PROTOCOL_VERSION.to_be_bytes());
    packet.extend_from_slice(&operation.to_be_bytes());
    packet.extend_from_slice(&1u32.to_be_bytes());
    packet.extend_from_slice(body);
    packet
}

/// Authentication frame for the resolved numeric room id.
pub fn encode_auth(room_id: u64) -> Vec<u8> {
    let body = serde_json::to_vec(&AuthBody {
        uid: 0,
        roomid: room_id,
    })
    .unwrap_or_default();
    encode_packet(OP_CLIENT_AUTH, &body)
}

/// Client heartbeat frame (empty JSON body).
pub fn encode_heartbeat() -> Vec<u8> {
    encode_packet(OP_CLIENT_HEARTBEAT, b"{}")
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// Decode one wire frame.
///
/// Malformed input reachable from the network surfaces as a typed
/// `DecodeError`; callers log it and keep the connection alive.
pub fn decode(packet: &[u8]) -> Result<Frame, DecodeError> {
    if packet.len() < HEADER_LEN {
        return Err(DecodeError::Truncated {
            len: packet.len(),
            need: HEADER_LEN,
        });
    }

    let header = FrameHeader {
        total_len: read_u32(packet, 0),
        header_len: read_u16(packet, 4),
        version: read_u16(packet, 6),
        operation: read_u32(packet, 8),
        sequence: read_u32(packet, 12),
    };

    let header_len = header.header_len as usize;
    if header_len > packet.len() {
        return Err(DecodeError::HeaderOverrun {
            header_len,
            len: packet.len(),
        });
    }
    let payload = &packet[header_len..];

    let body = match header.operation {
        OP_ACTIVITY => {
            if payload.len() < 4 {
                return Err(DecodeError::Truncated {
                    len: payload.len(),
                    need: 4,
                });
            }
            FrameBody::Activity(read_u32(payload, 0))
        }
        OP_ACTION => FrameBody::Action(decode_action(payload, header.version)?),
        OP_HEARTBEAT_ACK => FrameBody::HeartbeatAck,
        _ => FrameBody::Unknown,
    };

    Ok(Frame { header, body })
}

/// Version 2 payloads are zlib-deflated and contain one nested header to
/// strip; version 1 payloads are the JSON body directly.
fn decode_action(payload: &[u8], version: u16) -> Result<serde_json::Value, DecodeError> {
    if version != 2 {
        return Ok(serde_json::from_slice(payload)?);
    }

    let mut inflated = Vec::new();
    ZlibDecoder::new(payload)
        .read_to_end(&mut inflated)
        .map_err(DecodeError::Inflate)?;

    if inflated.len() < HEADER_LEN {
        return Err(DecodeError::Truncated {
            len: inflated.len(),
            need: HEADER_LEN,
        });
    }
    let nested_len = read_u16(&inflated, 4) as usize;
    if nested_len > inflated.len() {
        return Err(DecodeError::HeaderOverrun {
            header_len: nested_len,
            len: inflated.len(),
        });
    }

    Ok(serde_json::from_slice(&inflated[nested_len..])?)
}

/// Extract the chat fields from an action envelope, if it is a `DANMU_MSG`.
///
/// Envelope shape: `{cmd, info: [_, content, [uid, author, ...], ...]}`.
pub fn danmu_message(action: &serde_json::Value) -> Option<DanmuMessage> {
    if action.get("cmd")?.as_str()? != "DANMU_MSG" {
        return None;
    }
    let info = action.get("info")?;
    let content = info.get(1)?.as_str()?.to_string();
    let user = info.get(2)?;
    let uid = user.get(0)?.as_u64()?;
    let author = user.get(1)?.as_str()?.to_string();
    Some(DanmuMessage {
        uid,
        author,
        content,
    })
}
