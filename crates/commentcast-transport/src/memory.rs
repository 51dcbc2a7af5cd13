//! In-memory transport.
//!
//! Connects a sink/stream pair to a [`MemoryPeer`] that plays the client:
//! it reads what the writer pump sends, feeds inbound frames to the reader
//! pump, and can hang up or inject errors. The outbound queue is bounded, so
//! a peer that stops reading stalls the writer like a slow socket would.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::traits::{FrameSink, FrameStream, Inbound, TransportError};

/// What the writer side put on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(Bytes),
    Ping,
    Close,
}

/// Create a connected in-memory transport.
///
/// `outbound_capacity` is how many frames the peer may leave unread before
/// writes block.
#[must_use]
pub fn channel(outbound_capacity: usize) -> (MemorySink, MemoryStream, MemoryPeer) {
    let (out_tx, out_rx) = mpsc::channel(outbound_capacity);
    let (in_tx, in_rx) = mpsc::unbounded_channel();

    (
        MemorySink {
            outbound: out_tx,
            closed: false,
        },
        MemoryStream { inbound: in_rx },
        MemoryPeer {
            outbound: out_rx,
            inbound: Some(in_tx),
        },
    )
}

/// Writer half of an in-memory transport.
#[derive(Debug)]
pub struct MemorySink {
    outbound: mpsc::Sender<Outbound>,
    closed: bool,
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send_text(&mut self, frame: Bytes) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::ConnectionClosed);
        }
        self.outbound
            .send(Outbound::Text(frame))
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }

    async fn ping(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::ConnectionClosed);
        }
        self.outbound
            .send(Outbound::Ping)
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if std::mem::replace(&mut self.closed, true) {
            return Ok(());
        }
        // A stalled peer may have no room left; the close is then implied
        // by the channel shutting down.
        let _ = self.outbound.try_send(Outbound::Close);
        Ok(())
    }
}

/// Reader half of an in-memory transport.
#[derive(Debug)]
pub struct MemoryStream {
    inbound: mpsc::UnboundedReceiver<Result<Inbound, TransportError>>,
}

#[async_trait]
impl FrameStream for MemoryStream {
    async fn recv(&mut self) -> Result<Option<Inbound>, TransportError> {
        match self.inbound.recv().await {
            Some(Ok(inbound)) => Ok(Some(inbound)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

/// The remote end of an in-memory transport.
#[derive(Debug)]
pub struct MemoryPeer {
    outbound: mpsc::Receiver<Outbound>,
    inbound: Option<mpsc::UnboundedSender<Result<Inbound, TransportError>>>,
}

impl MemoryPeer {
    /// Wait for the next outbound frame. `None` once the sink is gone.
    pub async fn next(&mut self) -> Option<Outbound> {
        self.outbound.recv().await
    }

    /// Take the next outbound frame if one is ready.
    pub fn try_next(&mut self) -> Option<Outbound> {
        self.outbound.try_recv().ok()
    }

    /// Send an inbound frame. Returns `false` if the stream is gone.
    pub fn send(&self, inbound: Inbound) -> bool {
        self.inbound
            .as_ref()
            .is_some_and(|tx| tx.send(Ok(inbound)).is_ok())
    }

    /// Make the stream's next read fail.
    pub fn fail(&self, error: TransportError) -> bool {
        self.inbound
            .as_ref()
            .is_some_and(|tx| tx.send(Err(error)).is_ok())
    }

    /// Close the inbound direction cleanly.
    pub fn hang_up(&mut self) {
        self.inbound = None;
    }

    /// Stop accepting outbound frames; further writes fail.
    pub fn stop_reading(&mut self) {
        self.outbound.close();
    }
}
