//! Error types for the protocol layer.
//!
//! Each crate in tickwire defines its own error enum. A `ProtocolError`
//! always means "these bytes are not a valid frame", never a network or
//! lifecycle problem.

use std::fmt;

/// The wire structure that failed to parse.
///
/// Carried by [`ProtocolError::InvalidSize`] so callers (and logs) can
/// tell a short header apart from a short bone entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Structure {
    Header,
    PayloadHeader,
    JoinPayload,
    InputPayload,
    Position2D,
    Position,
    BoneData,
    Actor2DSpawn,
    Actor2DUpdate,
    Actor3DSpawn,
    Actor3DUpdate,
}

impl fmt::Display for Structure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Header => "header",
            Self::PayloadHeader => "payload header",
            Self::JoinPayload => "join payload",
            Self::InputPayload => "input payload",
            Self::Position2D => "position2d",
            Self::Position => "position",
            Self::BoneData => "bone data",
            Self::Actor2DSpawn => "actor2d spawn",
            Self::Actor2DUpdate => "actor2d update",
            Self::Actor3DSpawn => "actor3d spawn",
            Self::Actor3DUpdate => "actor3d update",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while decoding or building frames.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The input is shorter than the structure requires.
    ///
    /// No partially filled structure is ever returned alongside this.
    #[error("invalid {structure} size: need {expected} bytes, got {actual}")]
    InvalidSize {
        structure: Structure,
        expected: usize,
        actual: usize,
    },

    /// The payload header names a data type this protocol doesn't define.
    #[error("unknown data type {0}")]
    UnknownDataType(u8),

    /// A control frame carries an undefined sub type.
    #[error("unknown control sub type {0}")]
    UnknownControlSubType(u8),

    /// An actor frame carries an undefined sub type.
    #[error("unknown actor sub type {0}")]
    UnknownActorSubType(u8),

    /// The frame body doesn't fit in the header's `u16` length field.
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),
}

/// Returns `InvalidSize` unless `data` holds at least `expected` bytes.
pub(crate) fn ensure_len(
    data: &[u8],
    structure: Structure,
    expected: usize,
) -> Result<(), ProtocolError> {
    if data.len() < expected {
        return Err(ProtocolError::InvalidSize {
            structure,
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_len_short_input_reports_structure() {
        let err = ensure_len(&[0u8; 3], Structure::BoneData, 17).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::InvalidSize {
                structure: Structure::BoneData,
                expected: 17,
                actual: 3,
            }
        );
        assert_eq!(
            err.to_string(),
            "invalid bone data size: need 17 bytes, got 3"
        );
    }

    #[test]
    fn test_ensure_len_exact_input_is_accepted() {
        assert!(ensure_len(&[0u8; 25], Structure::Header, 25).is_ok());
    }
}
