//! Whole-frame parsing and the frame builders used by servers and tests.
//!
//! A frame is `Header | PayloadHeader | body`. The header's `length` counts
//! everything after the header, so a frame with an empty body has
//! `length == 2`.

use bytes::BufMut;

use crate::{
    ControlSubType, DataType, Header, InputPayload, JoinPayload, PROTOCOL_VERSION, PayloadHeader,
    ProtocolError, RoomId, SessionId, Wire, wire_timestamp,
};

/// A parsed frame borrowing its body from the input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    pub header: Header,
    pub payload_header: PayloadHeader,
    /// Bytes after the payload header. The header's `length` is advisory;
    /// the body is whatever the transport delivered.
    pub body: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Parses the two headers and slices off the body.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidSize`] naming whichever header was
    /// truncated.
    pub fn parse(data: &'a [u8]) -> Result<Self, ProtocolError> {
        let header = Header::decode(data)?;
        let rest = &data[Header::SIZE..];
        let payload_header = PayloadHeader::decode(rest)?;
        Ok(Self {
            header,
            payload_header,
            body: &rest[PayloadHeader::SIZE..],
        })
    }
}

/// Encodes a complete frame with the current timestamp.
///
/// # Errors
/// Returns [`ProtocolError::PayloadTooLarge`] when the payload header plus
/// body doesn't fit in the header's `u16` length.
pub fn encode_frame(
    session_id: SessionId,
    seq: u16,
    payload_header: PayloadHeader,
    body: &[u8],
) -> Result<Vec<u8>, ProtocolError> {
    let length = u16::try_from(PayloadHeader::SIZE + body.len())
        .map_err(|_| ProtocolError::PayloadTooLarge(body.len()))?;
    Ok(build(session_id, seq, length, payload_header, body))
}

fn build(
    session_id: SessionId,
    seq: u16,
    length: u16,
    payload_header: PayloadHeader,
    body: &[u8],
) -> Vec<u8> {
    let header = Header {
        version: PROTOCOL_VERSION,
        session_id,
        seq,
        length,
        timestamp: wire_timestamp(),
    };
    let mut buf = Vec::with_capacity(Header::SIZE + length as usize);
    header.encode_to(&mut buf);
    payload_header.encode_to(&mut buf);
    buf.put_slice(body);
    buf
}

/// A body-less control frame with sequence number zero.
fn control(session_id: SessionId, sub_type: ControlSubType) -> Vec<u8> {
    build(
        session_id,
        0,
        PayloadHeader::SIZE as u16,
        PayloadHeader::new(DataType::Control, sub_type),
        &[],
    )
}

/// Server → client: announces the session id in the header.
pub fn encode_assign(session_id: SessionId) -> Vec<u8> {
    control(session_id, ControlSubType::Assign)
}

/// Liveness probe sent by the heartbeat service.
pub fn encode_ping(session_id: SessionId) -> Vec<u8> {
    control(session_id, ControlSubType::Ping)
}

pub fn encode_pong(session_id: SessionId) -> Vec<u8> {
    control(session_id, ControlSubType::Pong)
}

/// Client → server: leave the current room.
pub fn encode_leave(session_id: SessionId) -> Vec<u8> {
    control(session_id, ControlSubType::Leave)
}

/// Client → server: enter `room_id`, or let the server choose when it is
/// [`RoomId::UNASSIGNED`].
pub fn encode_join(session_id: SessionId, room_id: RoomId) -> Vec<u8> {
    let body = JoinPayload { room_id }.encode();
    build(
        session_id,
        0,
        (PayloadHeader::SIZE + JoinPayload::SIZE) as u16,
        PayloadHeader::new(DataType::Control, ControlSubType::Join),
        &body,
    )
}

pub fn encode_input(session_id: SessionId, seq: u16, key_mask: u32) -> Vec<u8> {
    let body = InputPayload { key_mask }.encode();
    build(
        session_id,
        seq,
        (PayloadHeader::SIZE + InputPayload::SIZE) as u16,
        PayloadHeader::new(DataType::Input, 0u8),
        &body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Structure;

    #[test]
    fn test_encode_assign_is_header_plus_payload_header() {
        let id = SessionId::new_random();
        let bytes = encode_assign(id);
        assert_eq!(bytes.len(), Header::SIZE + PayloadHeader::SIZE);

        let frame = Frame::parse(&bytes).unwrap();
        assert_eq!(frame.header.version, PROTOCOL_VERSION);
        assert_eq!(frame.header.session_id, id);
        assert_eq!(frame.header.seq, 0);
        assert_eq!(frame.header.length, 2);
        assert_eq!(frame.payload_header.kind(), Ok(DataType::Control));
        assert_eq!(frame.payload_header.sub_type, ControlSubType::Assign as u8);
        assert!(frame.body.is_empty());
    }

    #[test]
    fn test_control_builders_use_matching_sub_types() {
        let id = SessionId::new_random();
        let cases = [
            (encode_ping(id), ControlSubType::Ping),
            (encode_pong(id), ControlSubType::Pong),
            (encode_leave(id), ControlSubType::Leave),
        ];
        for (bytes, sub) in cases {
            let frame = Frame::parse(&bytes).unwrap();
            assert_eq!(ControlSubType::try_from(frame.payload_header.sub_type), Ok(sub));
        }
    }

    #[test]
    fn test_encode_join_carries_room_id() {
        let id = SessionId::new_random();
        let room = RoomId::new_random();
        let bytes = encode_join(id, room);
        let frame = Frame::parse(&bytes).unwrap();
        assert_eq!(frame.header.length as usize, 2 + 16);
        assert_eq!(JoinPayload::decode(frame.body).unwrap().room_id, room);
    }

    #[test]
    fn test_encode_input_carries_seq_and_mask() {
        let id = SessionId::new_random();
        let bytes = encode_input(id, 42, 0b101);
        let frame = Frame::parse(&bytes).unwrap();
        assert_eq!(frame.header.seq, 42);
        assert_eq!(frame.payload_header.kind(), Ok(DataType::Input));
        assert_eq!(InputPayload::decode(frame.body).unwrap().key_mask, 0b101);
    }

    #[test]
    fn test_encode_frame_sets_length_from_body() {
        let id = SessionId::new_random();
        let body = [9u8; 10];
        let bytes =
            encode_frame(id, 7, PayloadHeader::new(DataType::Voice, 0u8), &body).unwrap();
        let frame = Frame::parse(&bytes).unwrap();
        assert_eq!(frame.header.length, 12);
        assert_eq!(frame.body, &body);
    }

    #[test]
    fn test_encode_frame_oversized_body_is_rejected() {
        let body = vec![0u8; u16::MAX as usize];
        let err = encode_frame(
            SessionId::new_random(),
            0,
            PayloadHeader::new(DataType::Voice, 0u8),
            &body,
        )
        .unwrap_err();
        assert_eq!(err, ProtocolError::PayloadTooLarge(u16::MAX as usize));
    }

    #[test]
    fn test_frame_parse_truncated_payload_header_fails() {
        let bytes = encode_ping(SessionId::new_random());
        let err = Frame::parse(&bytes[..Header::SIZE + 1]).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidSize {
                structure: Structure::PayloadHeader,
                ..
            }
        ));
    }

    #[test]
    fn test_frame_parse_empty_input_reports_header() {
        assert!(matches!(
            Frame::parse(&[]),
            Err(ProtocolError::InvalidSize {
                structure: Structure::Header,
                ..
            })
        ));
    }
}
