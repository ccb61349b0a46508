//! Wire encoding of guidance messages.
//!
//! A datagram is one UTF-8 JSON object:
//!
//! ```json
//! {"TurnInstruction":"右转","IconID":2,"DistanceText":"500米","CurrentRoad":"长安路","NextRoad":"大雁塔南路"}
//! ```
//!
//! Missing keys decode to the message defaults and unknown turn labels to
//! `Unknown`, so older or newer peers interoperate. Anything that is not a
//! JSON object, or exceeds [`MAX_DATAGRAM_SIZE`], is rejected.

use thiserror::Error;

use crate::guidance::GuidanceMessage;

/// Largest accepted payload in bytes.
pub const MAX_DATAGRAM_SIZE: usize = 8 * 1024;

/// Encoding and decoding errors.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Payload exceeds [`MAX_DATAGRAM_SIZE`].
    #[error("payload of {len} bytes exceeds limit of {max}")]
    Oversized { len: usize, max: usize },

    /// Payload is not UTF-8.
    #[error("payload is not UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// Payload is not valid JSON or has mistyped fields.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Payload is JSON but not an object.
    #[error("expected a JSON object")]
    NotObject,
}

/// Encode a message as a datagram payload.
pub fn encode(message: &GuidanceMessage) -> Result<Vec<u8>, CodecError> {
    let bytes = serde_json::to_vec(message)?;
    if bytes.len() > MAX_DATAGRAM_SIZE {
        return Err(CodecError::Oversized {
            len: bytes.len(),
            max: MAX_DATAGRAM_SIZE,
        });
    }
    Ok(bytes)
}

/// Decode a datagram payload.
pub fn decode(payload: &[u8]) -> Result<GuidanceMessage, CodecError> {
    if payload.len() > MAX_DATAGRAM_SIZE {
        return Err(CodecError::Oversized {
            len: payload.len(),
            max: MAX_DATAGRAM_SIZE,
        });
    }
    let text = std::str::from_utf8(payload)?;
    let value: serde_json::Value = serde_json::from_str(text)?;
    if !value.is_object() {
        return Err(CodecError::NotObject);
    }
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guidance::{TurnCategory, UNKNOWN_DISTANCE, UNKNOWN_ROAD};
    use proptest::prelude::*;

    fn sample() -> GuidanceMessage {
        GuidanceMessage {
            turn: TurnCategory::Right,
            icon_code: 2,
            distance_text: "500米".to_string(),
            current_road: "长安路".to_string(),
            next_road: "大雁塔南路".to_string(),
        }
    }

    #[test]
    fn test_wire_keys() {
        let json = String::from_utf8(encode(&sample()).unwrap()).unwrap();
        assert_eq!(
            json,
            r#"{"TurnInstruction":"右转","IconID":2,"DistanceText":"500米","CurrentRoad":"长安路","NextRoad":"大雁塔南路"}"#
        );
    }

    #[test]
    fn test_round_trip() {
        let msg = sample();
        assert_eq!(decode(&encode(&msg).unwrap()).unwrap(), msg);
        let default = GuidanceMessage::default();
        assert_eq!(decode(&encode(&default).unwrap()).unwrap(), default);
    }

    #[test]
    fn test_missing_keys_use_defaults() {
        let msg = decode(r#"{"IconID":1}"#.as_bytes()).unwrap();
        assert_eq!(msg.icon_code, 1);
        assert_eq!(msg.turn, TurnCategory::Unknown);
        assert_eq!(msg.distance_text, UNKNOWN_DISTANCE);
        assert_eq!(msg.current_road, UNKNOWN_ROAD);
        assert_eq!(msg.next_road, "");
    }

    #[test]
    fn test_unknown_label_is_unknown_turn() {
        let msg = decode(r#"{"TurnInstruction":"飞越"}"#.as_bytes()).unwrap();
        assert_eq!(msg.turn, TurnCategory::Unknown);
    }

    #[test]
    fn test_rejects_malformed_payloads() {
        assert!(matches!(decode(b"not json"), Err(CodecError::Json(_))));
        assert!(matches!(decode(b"[1,2]"), Err(CodecError::NotObject)));
        assert!(matches!(decode(&[0xff, 0xfe]), Err(CodecError::Utf8(_))));
        assert!(matches!(
            decode(r#"{"IconID":"two"}"#.as_bytes()),
            Err(CodecError::Json(_))
        ));
        let huge = vec![b' '; MAX_DATAGRAM_SIZE + 1];
        assert!(matches!(decode(&huge), Err(CodecError::Oversized { .. })));
    }

    proptest! {
        #[test]
        fn prop_round_trip(
            icon in 0usize..11,
            distance in "\\PC{0,12}",
            current in "\\PC{0,12}",
            next in "\\PC{0,12}",
        ) {
            let turn = TurnCategory::KNOWN[icon];
            let msg = GuidanceMessage {
                turn,
                icon_code: turn.icon_code(),
                distance_text: distance,
                current_road: current,
                next_road: next,
            };
            let decoded = decode(&encode(&msg).unwrap()).unwrap();
            prop_assert_eq!(decoded, msg);
        }
    }
}
