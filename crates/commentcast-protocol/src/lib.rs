//! # commentcast-protocol
//!
//! Wire format for live comment events.
//!
//! Every event delivered to a subscriber is a single JSON text frame:
//!
//! ```json
//! { "type": "comment.created", "room_id": "post-42", "payload": { "id": "c1" } }
//! ```
//!
//! The protocol is receive-only from the client's point of view, so this
//! crate only defines the outbound envelope and the codec that produces it.
//!
//! ## Example
//!
//! ```rust
//! use commentcast_protocol::{codec, EventKind};
//!
//! let payload = serde_json::json!({ "id": "c1" });
//! let encoded = codec::encode(EventKind::Created, "post-42", &payload).unwrap();
//! let decoded = codec::decode(&encoded).unwrap();
//! assert_eq!(decoded.kind, EventKind::Created);
//! ```

pub mod codec;
pub mod envelope;

pub use codec::{decode, encode, ProtocolError};
pub use envelope::{Envelope, EventKind};
