//! Transport abstraction traits.
//!
//! A bidirectional transport is split into a sink (owned by the writer pump)
//! and a stream (owned by the reader pump) so the two can run concurrently
//! without a shared lock.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection was closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Operation timed out.
    #[error("Connection timed out")]
    Timeout,

    /// Failed to send data.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Failed to receive data.
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// An inbound frame, reduced to what the reader pump cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound {
    /// An application message of the given size. Not acted upon.
    Data(usize),
    /// Keepalive ping from the peer.
    Ping,
    /// Answer to one of our pings.
    Pong,
}

/// Outbound half of a connection.
#[async_trait]
pub trait FrameSink: Send {
    /// Send one pre-encoded JSON envelope as a text frame.
    async fn send_text(&mut self, frame: Bytes) -> Result<(), TransportError>;

    /// Send a keepalive ping.
    async fn ping(&mut self) -> Result<(), TransportError>;

    /// Close the transport. Closing twice is not an error.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Inbound half of a connection.
#[async_trait]
pub trait FrameStream: Send {
    /// Receive the next frame.
    ///
    /// Returns `None` if the peer closed the connection cleanly.
    async fn recv(&mut self) -> Result<Option<Inbound>, TransportError>;
}
