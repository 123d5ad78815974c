//! Wire framing.
//!
//! Every frame placed on the transport is a single leading tag byte
//! followed by a body:
//!
//! ```text
//! ┌─────┬──────────────────────────────────────────────────────────────┐
//! │ tag  │ body                                                        │
//! ├─────┼──────────────────────────────────────────────────────────────┤
//! │ 0x01 │ UTF-8 JSON encoding of a ControlFrame                       │
//! │ 0x02 │ 8-byte little-endian header (flat_index: u32, len: u32)     │
//! │      │ followed by exactly `len` payload bytes                    │
//! └─────┴──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The tag makes parsing total: there is no "try JSON, fall back to
//! binary" path, and no ambiguity about which frame kind arrived.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const CONTROL_TAG: u8 = 0x01;
pub const DATA_TAG: u8 = 0x02;

const DATA_HEADER_LEN: usize = 8;

/// A textual, JSON-encoded control message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ControlFrame {
    /// Announces an incoming file and the chunk-plan counts the
    /// receiver should derive and check against.
    FileStart {
        name: String,
        size: u64,
        main_chunk_size: u64,
        sub_chunk_size: u32,
        main_count: u32,
        sub_count: u32,
    },
    /// Announces the digest of a sub-chunk that will follow as a data
    /// frame (not necessarily immediately — frames from different
    /// flat indexes may interleave).
    ChunkMetadata {
        flat_index: u32,
        main_index: u32,
        sub_index: u32,
        digest_hex: String,
    },
    /// Acknowledges a sub-chunk was received and verified (`ok: true`)
    /// or failed verification (`ok: false`).
    ChunkAck { flat_index: u32, ok: bool },
    /// Requests retransmission of a batch of sub-chunks, e.g. after a
    /// gap-detection scan.
    ChunkNack { flat_indexes: Vec<u32> },
    /// Sent by the sender once every sub-chunk has been acked ok.
    TransferComplete,
    /// Requests retransmission of a single sub-chunk.
    RetryRequest { flat_index: u32 },
}

/// A binary data frame: a sub-chunk's raw payload plus the flat index
/// it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct DataFrame {
    pub flat_index: u32,
    pub payload: Vec<u8>,
}

/// Either frame kind, as produced by [`decode`].
#[derive(Debug, Clone, PartialEq)]
pub enum WireFrame {
    Control(ControlFrame),
    Data(DataFrame),
}

/// Encode a control frame as a tagged byte buffer ready for the
/// transport.
pub fn encode_control(frame: &ControlFrame) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(frame)?;
    let mut out = Vec::with_capacity(json.len() + 1);
    out.push(CONTROL_TAG);
    out.extend_from_slice(&json);
    Ok(out)
}

/// Encode a data frame as a tagged byte buffer ready for the
/// transport.
pub fn encode_data(frame: &DataFrame, max_payload: u32) -> Result<Vec<u8>> {
    let len = frame.payload.len() as u32;
    if len > max_payload {
        return Err(Error::PayloadTooLarge {
            len,
            max: max_payload,
        });
    }
    let mut out = Vec::with_capacity(1 + DATA_HEADER_LEN + frame.payload.len());
    out.push(DATA_TAG);
    out.extend_from_slice(&frame.flat_index.to_le_bytes());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&frame.payload);
    Ok(out)
}

/// Decode a single tagged frame from a byte buffer. `buf` must contain
/// exactly one frame (the transport is expected to deliver
/// message-sized buffers, not a continuous byte stream).
pub fn decode(buf: &[u8]) -> Result<WireFrame> {
    let (&tag, rest) = buf.split_first().ok_or(Error::Truncated {
        expected: 1,
        actual: 0,
    })?;

    match tag {
        CONTROL_TAG => {
            let frame: ControlFrame = serde_json::from_slice(rest)?;
            Ok(WireFrame::Control(frame))
        }
        DATA_TAG => {
            if rest.len() < DATA_HEADER_LEN {
                return Err(Error::Truncated {
                    expected: DATA_HEADER_LEN,
                    actual: rest.len(),
                });
            }
            let flat_index = u32::from_le_bytes(rest[0..4].try_into().unwrap());
            let declared_len = u32::from_le_bytes(rest[4..8].try_into().unwrap());
            let payload = &rest[DATA_HEADER_LEN..];
            if payload.len() != declared_len as usize {
                return Err(Error::LengthMismatch {
                    declared: declared_len,
                    actual: payload.len() as u32,
                });
            }
            Ok(WireFrame::Data(DataFrame {
                flat_index,
                payload: payload.to_vec(),
            }))
        }
        other => Err(Error::UnknownTag(other)),
    }
}
