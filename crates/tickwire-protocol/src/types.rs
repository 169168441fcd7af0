//! Identity types and the small enums that classify every frame.
//!
//! Session and room identifiers are 16-byte UUIDs on the wire. They are
//! newtypes so a `RoomId` can never be passed where a `SessionId` is
//! expected, even though both are the same bytes underneath.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ProtocolError;

/// The protocol version written into every header this crate builds.
pub const PROTOCOL_VERSION: u8 = 1;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for one logical client session.
///
/// Serializes as the hyphenated UUID string, which is also the form used
/// in pub/sub topic names (`session:<id>`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generates a fresh random (v4) session id.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Builds a session id from its 16 wire bytes.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// The 16 bytes written into a frame header.
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// A unique identifier for a room.
///
/// The all-zero id is reserved: in a Join payload it means "let the
/// server pick a room for me".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoomId(Uuid);

impl RoomId {
    /// The reserved all-zero id ("auto-assign").
    pub const UNASSIGNED: RoomId = RoomId(Uuid::nil());

    /// Generates a fresh random (v4) room id.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Builds a room id from its 16 wire bytes.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// The 16 bytes written into a Join payload.
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Returns `true` for the reserved all-zero id.
    pub fn is_unassigned(&self) -> bool {
        self.0.is_nil()
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

// ---------------------------------------------------------------------------
// Frame classification
// ---------------------------------------------------------------------------

/// The first byte of the payload header: what kind of frame this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataType {
    Input = 1,
    Actor = 2,
    Voice = 3,
    Control = 4,
}

impl DataType {
    /// Control frames are interpreted by the session endpoint itself;
    /// everything else is application data routed to a room.
    pub fn is_control(self) -> bool {
        matches!(self, Self::Control)
    }
}

impl TryFrom<u8> for DataType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Input),
            2 => Ok(Self::Actor),
            3 => Ok(Self::Voice),
            4 => Ok(Self::Control),
            other => Err(ProtocolError::UnknownDataType(other)),
        }
    }
}

impl From<DataType> for u8 {
    fn from(value: DataType) -> Self {
        value as u8
    }
}

/// Sub types carried by [`DataType::Control`] frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ControlSubType {
    Join = 1,
    Leave = 2,
    Kick = 3,
    Ping = 4,
    Pong = 5,
    Error = 6,
    /// Server → client only: tells the client its session id.
    Assign = 7,
}

impl TryFrom<u8> for ControlSubType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, ProtocolError> {
        match value {
            1 => Ok(Self::Join),
            2 => Ok(Self::Leave),
            3 => Ok(Self::Kick),
            4 => Ok(Self::Ping),
            5 => Ok(Self::Pong),
            6 => Ok(Self::Error),
            7 => Ok(Self::Assign),
            other => Err(ProtocolError::UnknownControlSubType(other)),
        }
    }
}

impl From<ControlSubType> for u8 {
    fn from(value: ControlSubType) -> Self {
        value as u8
    }
}

/// Sub types carried by [`DataType::Actor`] frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ActorSubType {
    Spawn = 1,
    Update = 2,
    Despawn = 3,
}

impl TryFrom<u8> for ActorSubType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Spawn),
            2 => Ok(Self::Update),
            3 => Ok(Self::Despawn),
            other => Err(ProtocolError::UnknownActorSubType(other)),
        }
    }
}

impl From<ActorSubType> for u8 {
    fn from(value: ActorSubType) -> Self {
        value as u8
    }
}

/// Current unix time in milliseconds, truncated to the header's 32 bits.
pub fn wire_timestamp() -> u32 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    (millis & 0xFFFF_FFFF) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_bytes_survive_conversion() {
        let id = SessionId::new_random();
        assert_eq!(SessionId::from_bytes(*id.as_bytes()), id);
    }

    #[test]
    fn test_session_id_display_is_hyphenated_uuid() {
        let id = SessionId::from_bytes([0xab; 16]);
        assert_eq!(id.to_string(), "abababab-abab-abab-abab-abababababab");
    }

    #[test]
    fn test_session_id_serializes_as_plain_string() {
        let id = SessionId::from_bytes([0; 16]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"00000000-0000-0000-0000-000000000000\"");
    }

    #[test]
    fn test_room_id_unassigned_is_all_zero() {
        assert!(RoomId::UNASSIGNED.is_unassigned());
        assert_eq!(RoomId::UNASSIGNED.as_bytes(), &[0u8; 16]);
        assert!(!RoomId::new_random().is_unassigned());
    }

    #[test]
    fn test_data_type_try_from_known_values() {
        assert_eq!(DataType::try_from(1), Ok(DataType::Input));
        assert_eq!(DataType::try_from(4), Ok(DataType::Control));
        assert!(DataType::Control.is_control());
        assert!(!DataType::Voice.is_control());
    }

    #[test]
    fn test_data_type_try_from_unknown_returns_error() {
        assert_eq!(
            DataType::try_from(9),
            Err(ProtocolError::UnknownDataType(9))
        );
    }

    #[test]
    fn test_control_sub_type_round_trips_through_u8() {
        for raw in 1..=7u8 {
            let sub = ControlSubType::try_from(raw).unwrap();
            assert_eq!(u8::from(sub), raw);
        }
        assert_eq!(
            ControlSubType::try_from(0),
            Err(ProtocolError::UnknownControlSubType(0))
        );
    }

    #[test]
    fn test_actor_sub_type_unknown_returns_error() {
        assert_eq!(
            ActorSubType::try_from(4),
            Err(ProtocolError::UnknownActorSubType(4))
        );
    }
}
