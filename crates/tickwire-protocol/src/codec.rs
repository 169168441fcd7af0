//! The [`Wire`] trait and the fixed-layout frame structures.
//!
//! Every multi-byte field is little-endian. There is no byte-order
//! setting anywhere: each read and write names its endianness
//! (`get_u16_le`, `put_u32_le`, ...) so the layout is visible at the
//! call site.
//!
//! ```text
//! Header (25 bytes)
//! ┌─────────┬──────────────┬───────┬──────────┬─────────────┐
//! │ version │ session id   │ seq   │ length   │ timestamp   │
//! │ u8      │ 16 bytes     │ u16   │ u16      │ u32         │
//! └─────────┴──────────────┴───────┴──────────┴─────────────┘
//! PayloadHeader (2 bytes)
//! ┌───────────┬──────────┐
//! │ data type │ sub type │
//! └───────────┴──────────┘
//! ```

use bytes::{Buf, BufMut};

use crate::error::{Structure, ensure_len};
use crate::{DataType, ProtocolError, RoomId, SessionId};

/// A structure with a binary wire representation.
///
/// `decode` validates the length first and never returns a partially
/// filled value. `encode_to` cannot fail: every in-memory value has a
/// valid encoding.
pub trait Wire: Sized {
    /// Minimum number of bytes `decode` needs. For variable-length
    /// structures this is the size of the fixed prefix.
    const SIZE: usize;

    /// Appends the encoded bytes to `buf`.
    fn encode_to<B: BufMut>(&self, buf: &mut B);

    /// Parses a value from the front of `data`. Trailing bytes are ignored.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidSize`] when `data` is too short.
    fn decode(data: &[u8]) -> Result<Self, ProtocolError>;

    /// Number of bytes `encode_to` will write.
    fn encoded_len(&self) -> usize {
        Self::SIZE
    }

    /// Encodes into a freshly allocated buffer.
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode_to(&mut buf);
        buf
    }
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// The fixed 25-byte header at the front of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    /// The session the frame belongs to. Endpoints drop frames whose id
    /// doesn't match their own session.
    pub session_id: SessionId,
    pub seq: u16,
    /// Bytes following the header (payload header + body).
    pub length: u16,
    /// Unix millis truncated to 32 bits.
    pub timestamp: u32,
}

impl Wire for Header {
    const SIZE: usize = 25;

    fn encode_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.version);
        buf.put_slice(self.session_id.as_bytes());
        buf.put_u16_le(self.seq);
        buf.put_u16_le(self.length);
        buf.put_u32_le(self.timestamp);
    }

    fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        ensure_len(data, Structure::Header, Self::SIZE)?;
        let mut cur = data;
        let version = cur.get_u8();
        let mut id = [0u8; 16];
        cur.copy_to_slice(&mut id);
        Ok(Self {
            version,
            session_id: SessionId::from_bytes(id),
            seq: cur.get_u16_le(),
            length: cur.get_u16_le(),
            timestamp: cur.get_u32_le(),
        })
    }
}

// ---------------------------------------------------------------------------
// PayloadHeader
// ---------------------------------------------------------------------------

/// The two bytes right after the header.
///
/// `data_type` stays a raw `u8` so an unknown type still parses; callers
/// classify it with [`PayloadHeader::kind`] and decide what to do with
/// frames they don't understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadHeader {
    pub data_type: u8,
    pub sub_type: u8,
}

impl PayloadHeader {
    /// Builds a payload header from a known data type.
    pub fn new(data_type: DataType, sub_type: impl Into<u8>) -> Self {
        Self {
            data_type: data_type.into(),
            sub_type: sub_type.into(),
        }
    }

    /// Classifies the raw data type byte.
    ///
    /// # Errors
    /// Returns [`ProtocolError::UnknownDataType`] for undefined values.
    pub fn kind(&self) -> Result<DataType, ProtocolError> {
        DataType::try_from(self.data_type)
    }
}

impl Wire for PayloadHeader {
    const SIZE: usize = 2;

    fn encode_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.data_type);
        buf.put_u8(self.sub_type);
    }

    fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        ensure_len(data, Structure::PayloadHeader, Self::SIZE)?;
        Ok(Self {
            data_type: data[0],
            sub_type: data[1],
        })
    }
}

// ---------------------------------------------------------------------------
// Control and input bodies
// ---------------------------------------------------------------------------

/// Body of a control/Join frame: the room to enter.
///
/// [`RoomId::UNASSIGNED`] asks the server to pick the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinPayload {
    pub room_id: RoomId,
}

impl Wire for JoinPayload {
    const SIZE: usize = 16;

    fn encode_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(self.room_id.as_bytes());
    }

    fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        ensure_len(data, Structure::JoinPayload, Self::SIZE)?;
        let mut id = [0u8; 16];
        id.copy_from_slice(&data[..Self::SIZE]);
        Ok(Self {
            room_id: RoomId::from_bytes(id),
        })
    }
}

/// Body of an Input frame: currently pressed keys as a bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputPayload {
    pub key_mask: u32,
}

impl Wire for InputPayload {
    const SIZE: usize = 4;

    fn encode_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32_le(self.key_mask);
    }

    fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        ensure_len(data, Structure::InputPayload, Self::SIZE)?;
        let mut cur = data;
        Ok(Self {
            key_mask: cur.get_u32_le(),
        })
    }
}
