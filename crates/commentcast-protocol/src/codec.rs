//! JSON codec for comment event envelopes.
//!
//! Events are encoded exactly once per broadcast; the resulting [`Bytes`] are
//! shared by every recipient's mailbox.

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;

use crate::envelope::{Envelope, EventKind};

/// Maximum encoded envelope size (1 MiB).
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Encoded envelope exceeds maximum size.
    #[error("Frame size {0} exceeds maximum {MAX_FRAME_SIZE}")]
    FrameTooLarge(usize),

    /// JSON encoding error.
    #[error("Encoding error: {0}")]
    Encode(#[source] serde_json::Error),

    /// JSON decoding error.
    #[error("Decoding error: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Borrowing twin of [`Envelope`] so payloads are never cloned to encode.
#[derive(Serialize)]
struct EnvelopeRef<'a, P: ?Sized> {
    #[serde(rename = "type")]
    kind: EventKind,
    room_id: &'a str,
    payload: &'a P,
}

/// Encode an event envelope to JSON bytes.
///
/// # Errors
///
/// Returns an error if the payload fails to serialize or the result is too large.
pub fn encode<P>(kind: EventKind, room_id: &str, payload: &P) -> Result<Bytes, ProtocolError>
where
    P: Serialize + ?Sized,
{
    let envelope = EnvelopeRef {
        kind,
        room_id,
        payload,
    };
    let data = serde_json::to_vec(&envelope).map_err(ProtocolError::Encode)?;

    if data.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(data.len()));
    }

    Ok(Bytes::from(data))
}

/// Encode an owned envelope.
///
/// # Errors
///
/// Returns an error if the payload fails to serialize or the result is too large.
pub fn encode_envelope<P: Serialize>(envelope: &Envelope<P>) -> Result<Bytes, ProtocolError> {
    encode(envelope.kind, &envelope.room_id, &envelope.payload)
}

/// Decode an envelope from bytes.
///
/// # Errors
///
/// Returns an error if the data is too large or is not a valid envelope.
pub fn decode(data: &[u8]) -> Result<Envelope, ProtocolError> {
    if data.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(data.len()));
    }
    serde_json::from_slice(data).map_err(ProtocolError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::ser::{Error as _, Serializer};
    use serde_json::json;

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("projection unavailable"))
        }
    }

    #[test]
    fn test_encode_matches_envelope_shape() {
        let encoded = encode(EventKind::Liked, "post-42", &json!({"id": "c1", "likes": 1})).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "comment.liked",
                "room_id": "post-42",
                "payload": {"id": "c1", "likes": 1}
            })
        );
    }

    #[test]
    fn test_decode_encoded_envelope() {
        let envelope = Envelope::new(EventKind::Deleted, "post-7", json!({"id": "c9"}));
        let encoded = encode_envelope(&envelope).unwrap();
        assert_eq!(decode(&encoded).unwrap(), envelope);
    }

    #[test]
    fn test_encode_failure() {
        match encode(EventKind::Created, "post-1", &Unserializable) {
            Err(ProtocolError::Encode(_)) => {}
            other => panic!("Expected Encode error, got {:?}", other),
        }
    }

    #[test]
    fn test_frame_too_large() {
        let big = "x".repeat(MAX_FRAME_SIZE);
        match encode(EventKind::Created, "post-1", &json!({"content": big})) {
            Err(ProtocolError::FrameTooLarge(_)) => {}
            other => panic!("Expected FrameTooLarge error, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(decode(b"not json"), Err(ProtocolError::Decode(_))));
        assert!(matches!(
            decode(br#"{"type":"comment.boom","room_id":"a","payload":null}"#),
            Err(ProtocolError::Decode(_))
        ));
    }
}
