//! Comment events handed to the hub by producers.

use bytes::Bytes;
use commentcast_protocol::{codec, EventKind, ProtocolError};
use serde::Serialize;

use crate::room::RoomKey;

/// An immutable comment event.
///
/// One event may fan out to many connections; it is serialized once per
/// broadcast and never mutated after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Event<P = serde_json::Value> {
    kind: EventKind,
    room: RoomKey,
    payload: P,
}

impl<P> Event<P> {
    /// Create a new event.
    #[must_use]
    pub fn new(kind: EventKind, room: impl Into<RoomKey>, payload: P) -> Self {
        Self {
            kind,
            room: room.into(),
            payload,
        }
    }

    /// Event kind.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Room the event belongs to.
    #[must_use]
    pub fn room(&self) -> &str {
        &self.room
    }

    /// Resource projection.
    #[must_use]
    pub fn payload(&self) -> &P {
        &self.payload
    }
}

impl<P: Serialize> Event<P> {
    /// Serialize to the wire envelope.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    pub fn encode(&self) -> Result<Bytes, ProtocolError> {
        codec::encode(self.kind, &self.room, &self.payload)
    }
}
