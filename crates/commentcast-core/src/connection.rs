//! Connections and their outbound mailboxes.
//!
//! [`Connection::open`] splits one subscriber session into three views:
//!
//! - [`ConnectionHandle`] owns the mailbox sender and is moved into the hub's
//!   registry by `register`. Dropping the registry entry closes the mailbox.
//! - [`Mailbox`] is the receiving end, drained by the writer pump.
//! - [`ConnectionRef`] is a non-owning reference (identity, room, state)
//!   used by the pumps to unregister and to drive the state machine.

use bytes::Bytes;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::room::RoomKey;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection object.
///
/// Two connections opened by the same subscriber never share an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocate the next connection id.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn_{:x}", self.0)
    }
}

/// Pre-authenticated subscriber identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriberId(String);

impl SubscriberId {
    /// Create a subscriber id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubscriberId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SubscriberId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Lifecycle of a connection. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ConnectionState {
    /// Handshake done, pumps not yet running.
    Connecting = 0,
    /// Both pumps running.
    Active = 1,
    /// One pump has exited and unregister has been issued.
    Closing = 2,
    /// Transport closed and both pumps exited.
    Closed = 3,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Connecting,
            1 => ConnectionState::Active,
            2 => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }
}

#[derive(Debug)]
struct Shared {
    id: ConnectionId,
    subscriber: SubscriberId,
    room: RoomKey,
    state: AtomicU8,
    unregistered: AtomicBool,
}

/// Constructor for connection views.
pub struct Connection;

impl Connection {
    /// Open a connection bound to `room` with a mailbox of `capacity` messages.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn open(
        room: impl Into<RoomKey>,
        subscriber: impl Into<SubscriberId>,
        capacity: usize,
    ) -> (ConnectionHandle, Mailbox) {
        let shared = Arc::new(Shared {
            id: ConnectionId::next(),
            subscriber: subscriber.into(),
            room: room.into(),
            state: AtomicU8::new(ConnectionState::Connecting as u8),
            unregistered: AtomicBool::new(false),
        });
        let (sender, receiver) = mpsc::channel(capacity);

        (
            ConnectionHandle {
                shared: Arc::clone(&shared),
                sender,
            },
            Mailbox { shared, receiver },
        )
    }
}

/// The routing entry the hub keeps for a connection.
///
/// Holds the only long-lived sender of the connection's mailbox.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    shared: Arc<Shared>,
    sender: mpsc::Sender<Bytes>,
}

impl ConnectionHandle {
    /// Connection id.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.shared.id
    }

    /// Room the connection is bound to.
    #[must_use]
    pub fn room(&self) -> &str {
        &self.shared.room
    }

    /// Subscriber identity.
    #[must_use]
    pub fn subscriber(&self) -> &SubscriberId {
        &self.shared.subscriber
    }

    /// A non-owning reference to this connection.
    #[must_use]
    pub fn connection_ref(&self) -> ConnectionRef {
        ConnectionRef {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Whether the hub has already unregistered this connection.
    #[must_use]
    pub fn is_unregistered(&self) -> bool {
        self.shared.unregistered.load(Ordering::Acquire)
    }

    /// Enqueue a message without waiting.
    ///
    /// # Errors
    ///
    /// Returns `Full` if the mailbox is at capacity and `Closed` if the
    /// writer has gone away or the connection was unregistered.
    pub fn try_deliver(&self, frame: Bytes) -> Result<(), TrySendError<Bytes>> {
        if self.is_unregistered() {
            return Err(TrySendError::Closed(frame));
        }
        self.sender.try_send(frame)
    }

    /// Mark as unregistered. Returns `true` the first time only.
    pub(crate) fn retire(&self) -> bool {
        !self.shared.unregistered.swap(true, Ordering::AcqRel)
    }
}

/// Non-owning reference to a connection: identity, room and lifecycle state.
#[derive(Debug, Clone)]
pub struct ConnectionRef {
    shared: Arc<Shared>,
}

impl ConnectionRef {
    /// Connection id.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.shared.id
    }

    /// Room the connection is bound to.
    #[must_use]
    pub fn room(&self) -> &str {
        &self.shared.room
    }

    /// Subscriber identity.
    #[must_use]
    pub fn subscriber(&self) -> &SubscriberId {
        &self.shared.subscriber
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    /// Move the state machine forward to `next`.
    ///
    /// Returns `true` if the state changed; backwards or repeated transitions
    /// are ignored.
    pub fn advance(&self, next: ConnectionState) -> bool {
        let prev = self.shared.state.fetch_max(next as u8, Ordering::AcqRel);
        prev < next as u8
    }

    /// Whether the hub has already unregistered this connection.
    #[must_use]
    pub fn is_unregistered(&self) -> bool {
        self.shared.unregistered.load(Ordering::Acquire)
    }

    pub(crate) fn retire(&self) -> bool {
        !self.shared.unregistered.swap(true, Ordering::AcqRel)
    }
}

/// The receiving end of a connection's outbound queue.
#[derive(Debug)]
pub struct Mailbox {
    shared: Arc<Shared>,
    receiver: mpsc::Receiver<Bytes>,
}

impl Mailbox {
    /// Connection id.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.shared.id
    }

    /// A non-owning reference to the owning connection.
    #[must_use]
    pub fn connection_ref(&self) -> ConnectionRef {
        ConnectionRef {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Wait for the next message. `None` once the mailbox is closed and drained.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.receiver.recv().await
    }

    /// Take the next message if one is queued.
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.receiver.try_recv().ok()
    }

    /// Number of queued messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Whether no messages are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Whether every sender is gone, i.e. nothing more will ever arrive
    /// beyond what is already queued.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.receiver.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_ids_are_unique() {
        let (a, _ma) = Connection::open("post-1", "u1", 4);
        let (b, _mb) = Connection::open("post-1", "u1", 4);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.subscriber(), b.subscriber());
        assert!(a.id().to_string().starts_with("conn_"));
    }

    #[test]
    fn test_state_only_moves_forward() {
        let (handle, _mailbox) = Connection::open("post-1", "u1", 4);
        let conn = handle.connection_ref();

        assert_eq!(conn.state(), ConnectionState::Connecting);
        assert!(conn.advance(ConnectionState::Active));
        assert!(conn.advance(ConnectionState::Closing));
        assert!(!conn.advance(ConnectionState::Active));
        assert!(!conn.advance(ConnectionState::Closing));
        assert_eq!(conn.state(), ConnectionState::Closing);
        assert!(conn.advance(ConnectionState::Closed));
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_mailbox_is_bounded_and_ordered() {
        let (handle, mut mailbox) = Connection::open("post-1", "u1", 2);

        handle.try_deliver(Bytes::from_static(b"1")).unwrap();
        handle.try_deliver(Bytes::from_static(b"2")).unwrap();
        assert!(matches!(
            handle.try_deliver(Bytes::from_static(b"3")),
            Err(TrySendError::Full(_))
        ));

        assert_eq!(mailbox.len(), 2);
        assert_eq!(&mailbox.try_recv().unwrap()[..], b"1");
        assert_eq!(&mailbox.try_recv().unwrap()[..], b"2");
        assert!(mailbox.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_mailbox_closes_when_handle_dropped() {
        let (handle, mut mailbox) = Connection::open("post-1", "u1", 4);
        handle.try_deliver(Bytes::from_static(b"last")).unwrap();
        drop(handle);

        assert!(mailbox.is_closed());
        assert_eq!(&mailbox.recv().await.unwrap()[..], b"last");
        assert!(mailbox.recv().await.is_none());
    }

    #[test]
    fn test_retired_handle_refuses_delivery() {
        let (handle, _mailbox) = Connection::open("post-1", "u1", 4);
        assert!(handle.retire());
        assert!(!handle.retire());
        assert!(handle.connection_ref().is_unregistered());
        assert!(matches!(
            handle.try_deliver(Bytes::from_static(b"x")),
            Err(TrySendError::Closed(_))
        ));
    }
}
