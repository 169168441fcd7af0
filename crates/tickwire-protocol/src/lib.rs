//! # tickwire-protocol
//!
//! The binary wire format spoken between tickwire clients and servers.
//!
//! Every frame starts with a fixed 25-byte [`Header`] followed by a 2-byte
//! [`PayloadHeader`] and a body whose layout depends on the data type.
//! All multi-byte values are little-endian.
//!
//! This crate is pure: no I/O, no shared state, no async. Parsing returns
//! a [`ProtocolError`] naming the structure that was too short; encoding
//! never fails except when a body is too large for the `u16` length field.
//!
//! ## Example
//!
//! ```
//! use tickwire_protocol::{encode_join, Frame, JoinPayload, RoomId, SessionId, Wire};
//!
//! let session = SessionId::new_random();
//! let bytes = encode_join(session, RoomId::UNASSIGNED);
//!
//! let frame = Frame::parse(&bytes).unwrap();
//! assert_eq!(frame.header.session_id, session);
//! assert!(JoinPayload::decode(frame.body).unwrap().room_id.is_unassigned());
//! ```

mod actor;
mod codec;
mod error;
mod frame;
mod types;

pub use actor::{
    Actor2DSpawn, Actor2DUpdate, Actor3DSpawn, Actor3DUpdate, BoneData, BoneMask, Position,
    Position2D,
};
pub use codec::{Header, InputPayload, JoinPayload, PayloadHeader, Wire};
pub use error::{ProtocolError, Structure};
pub use frame::{
    Frame, encode_assign, encode_frame, encode_input, encode_join, encode_leave, encode_ping,
    encode_pong,
};
pub use types::{
    ActorSubType, ControlSubType, DataType, PROTOCOL_VERSION, RoomId, SessionId, wire_timestamp,
};
