//! Event kinds and the outbound envelope.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of comment event carried by an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A comment was posted.
    #[serde(rename = "comment.created")]
    Created,
    /// A comment was edited or its moderation status changed.
    #[serde(rename = "comment.updated")]
    Updated,
    /// A comment was removed.
    #[serde(rename = "comment.deleted")]
    Deleted,
    /// A comment received a like.
    #[serde(rename = "comment.liked")]
    Liked,
    /// A comment was flagged for moderation.
    #[serde(rename = "comment.flagged")]
    Flagged,
}

impl EventKind {
    /// All kinds, in declaration order.
    pub const ALL: [EventKind; 5] = [
        EventKind::Created,
        EventKind::Updated,
        EventKind::Deleted,
        EventKind::Liked,
        EventKind::Flagged,
    ];

    /// The wire name of this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Created => "comment.created",
            EventKind::Updated => "comment.updated",
            EventKind::Deleted => "comment.deleted",
            EventKind::Liked => "comment.liked",
            EventKind::Flagged => "comment.flagged",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or("Unknown event kind")
    }
}

/// The JSON envelope sent to subscribers, one per event.
///
/// `P` is the resource projection. Producers encode with a borrowed payload
/// through [`crate::codec::encode`]; clients decode into
/// `Envelope<serde_json::Value>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<P = serde_json::Value> {
    /// Event kind.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Room (post identifier) the event belongs to.
    pub room_id: String,
    /// Post-write resource projection.
    pub payload: P,
}

impl<P> Envelope<P> {
    /// Create a new envelope.
    #[must_use]
    pub fn new(kind: EventKind, room_id: impl Into<String>, payload: P) -> Self {
        Self {
            kind,
            room_id: room_id.into(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_wire_names() {
        assert_eq!(
            serde_json::to_string(&EventKind::Liked).unwrap(),
            "\"comment.liked\""
        );
        assert_eq!(EventKind::Flagged.to_string(), "comment.flagged");
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("comment.deleted".parse(), Ok(EventKind::Deleted));
        assert!("comment.exploded".parse::<EventKind>().is_err());
        assert!("created".parse::<EventKind>().is_err());
    }

    #[test]
    fn test_envelope_field_names() {
        let envelope = Envelope::new(EventKind::Created, "post-42", serde_json::json!({"id": "c1"}));
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "comment.created",
                "room_id": "post-42",
                "payload": {"id": "c1"}
            })
        );
    }
}
