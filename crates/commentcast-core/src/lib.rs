//! # commentcast-core
//!
//! The live comment broadcast hub.
//!
//! - **Room** - a post identifier; rooms exist only while they have members
//! - **Connection** - one subscriber session with a bounded outbound mailbox
//! - **RoomRegistry** - room key to member set bookkeeping
//! - **Hub** - single control loop that owns all registry mutation and fan-out
//! - **Event** - an immutable comment event handed to the hub by producers
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐  emit   ┌─────────────┐  try_send  ┌──────────┐
//! │ Producer │────────▶│  Hub loop   │───────────▶│ Mailbox  │──▶ writer pump
//! └──────────┘         └─────────────┘            └──────────┘
//!                        │        ▲
//!                        ▼        │ register / unregister
//!                  ┌──────────┐   │
//!                  │ Registry │   └──── reader pump
//!                  └──────────┘
//! ```

pub mod comment;
pub mod connection;
pub mod event;
pub mod hub;
pub mod metrics;
pub mod registry;
pub mod room;

pub use comment::{
    CommentMetadata, CommentStatus, CommentView, DeletedComment, LikedComment, ModerationPolicy,
};
pub use connection::{
    Connection, ConnectionHandle, ConnectionId, ConnectionRef, ConnectionState, Mailbox,
    SubscriberId,
};
pub use event::Event;
pub use hub::{BroadcastReport, Hub, HubConfig, HubError, HubHandle};
pub use registry::{RegistryStats, RoomRegistry};
pub use room::{validate_room_key, RoomKey};

pub use commentcast_protocol::EventKind;
