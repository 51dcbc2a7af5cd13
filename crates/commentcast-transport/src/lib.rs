//! # commentcast-transport
//!
//! Moves hub output onto the wire.
//!
//! Each connection runs two independent tasks:
//!
//! - the **writer** drains the connection's mailbox into the transport
//! - the **reader** watches inbound frames only to detect liveness and close
//!
//! They share nothing but the mailbox and a one-shot close signal. Transports
//! plug in through the [`FrameSink`] / [`FrameStream`] traits; adapters are
//! provided for axum and tokio-tungstenite WebSockets, plus an in-memory
//! transport for tests.
//!
//! ```rust,ignore
//! use commentcast_transport::{pump, PumpConfig};
//!
//! let (sink, stream) = socket.split();
//! let (handle, mailbox) = hub.open(room, subscriber);
//! pump::serve(hub, handle, mailbox, sink, stream, PumpConfig::default()).await;
//! ```

pub mod memory;
pub mod pump;
pub mod traits;
pub mod websocket;

pub use pump::{serve, PumpConfig};
pub use traits::{FrameSink, FrameStream, Inbound, TransportError};
