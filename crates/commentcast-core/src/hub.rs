//! The broadcast hub.
//!
//! A single control loop owns every registry mutation and every fan-out.
//! Producers and connection pumps talk to it through a cloneable
//! [`HubHandle`]; commands travel over one FIFO queue and are processed
//! strictly in arrival order, so events emitted in sequence by one producer
//! reach each subscriber in that sequence.
//!
//! Fan-out never waits on a subscriber: each member's mailbox is offered the
//! frame with `try_send`, and a member whose mailbox is full is evicted.

use bytes::Bytes;
use commentcast_protocol::{codec, EventKind, ProtocolError};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::connection::{
    Connection, ConnectionHandle, ConnectionId, ConnectionRef, Mailbox, SubscriberId,
};
use crate::event::Event;
use crate::metrics;
use crate::registry::{RegistryStats, RoomRegistry};
use crate::room::RoomKey;

/// Hub errors.
#[derive(Debug, Error)]
pub enum HubError {
    /// The event could not be serialized; nothing was delivered.
    #[error("Failed to encode event: {0}")]
    Encode(#[from] ProtocolError),

    /// The hub's control loop has stopped.
    #[error("Hub is shut down")]
    Shutdown,
}

/// Hub configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Capacity of each connection's mailbox, in messages.
    pub mailbox_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 256,
        }
    }
}

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    /// Members whose mailbox accepted the event.
    pub delivered: usize,
    /// Members evicted because their mailbox was full.
    pub evicted: usize,
}

enum Command {
    Register {
        handle: ConnectionHandle,
        ack: oneshot::Sender<()>,
    },
    Unregister {
        room: RoomKey,
        id: ConnectionId,
    },
    Broadcast {
        kind: EventKind,
        room: RoomKey,
        frame: Bytes,
        reply: Option<oneshot::Sender<BroadcastReport>>,
    },
    Flush(oneshot::Sender<()>),
    Shutdown,
}

/// The hub's control loop.
pub struct Hub {
    registry: Arc<RoomRegistry>,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl Hub {
    /// Create a hub and a handle to it. The hub does nothing until [`Hub::run`].
    #[must_use]
    pub fn new(config: HubConfig) -> (Self, HubHandle) {
        info!("Creating hub with config: {:?}", config);
        let registry = Arc::new(RoomRegistry::new());
        let (tx, rx) = mpsc::unbounded_channel();

        let hub = Self {
            registry: Arc::clone(&registry),
            commands: rx,
        };
        let handle = HubHandle {
            commands: tx,
            registry,
            config: Arc::new(config),
        };
        (hub, handle)
    }

    /// Create a hub and run it on a new task.
    #[must_use]
    pub fn spawn(config: HubConfig) -> (HubHandle, JoinHandle<()>) {
        let (hub, handle) = Self::new(config);
        let task = tokio::spawn(hub.run());
        (handle, task)
    }

    /// Process commands until shutdown or until every handle is dropped.
    ///
    /// On exit every registered connection is dropped, closing its mailbox.
    pub async fn run(mut self) {
        debug!("Hub loop started");

        while let Some(command) = self.commands.recv().await {
            match command {
                Command::Register { handle, ack } => {
                    self.register(handle);
                    let _ = ack.send(());
                }
                Command::Unregister { room, id } => {
                    self.remove(&room, id);
                }
                Command::Broadcast {
                    kind,
                    room,
                    frame,
                    reply,
                } => {
                    let report = self.fan_out(kind, &room, &frame);
                    if let Some(reply) = reply {
                        let _ = reply.send(report);
                    }
                }
                Command::Flush(ack) => {
                    let _ = ack.send(());
                }
                Command::Shutdown => break,
            }
        }

        let drained = self.registry.drain();
        for handle in &drained {
            handle.retire();
        }
        metrics::set_membership(0, 0);
        info!(connections = drained.len(), "Hub stopped");
    }

    fn register(&self, handle: ConnectionHandle) {
        if handle.is_unregistered() {
            warn!(
                connection = %handle.id(),
                room = %handle.room(),
                "Refusing to register a connection that was already unregistered"
            );
            return;
        }

        let id = handle.id();
        let room = handle.room().to_string();
        let subscriber = handle.subscriber().clone();
        if self.registry.add(handle) {
            debug!(
                connection = %id,
                room = %room,
                subscriber = %subscriber,
                members = self.registry.member_count(&room),
                "Registered"
            );
            self.update_gauges();
        }
    }

    fn remove(&self, room: &str, id: ConnectionId) -> bool {
        match self.registry.remove(room, id) {
            Some(handle) => {
                handle.retire();
                debug!(
                    connection = %id,
                    room = %room,
                    members = self.registry.member_count(room),
                    "Unregistered"
                );
                self.update_gauges();
                true
            }
            None => {
                trace!(connection = %id, room = %room, "Unregister of unknown connection");
                false
            }
        }
    }

    fn fan_out(&self, kind: EventKind, room: &str, frame: &Bytes) -> BroadcastReport {
        metrics::record_event(kind.as_str());

        let members = self.registry.snapshot(room);
        let mut report = BroadcastReport::default();

        if members.is_empty() {
            trace!(room = %room, kind = %kind, "No subscribers");
            return report;
        }

        for member in members {
            match member.try_deliver(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        connection = %member.id(),
                        room = %room,
                        subscriber = %member.subscriber(),
                        "Mailbox full, evicting slow subscriber"
                    );
                    if self.remove(room, member.id()) {
                        report.evicted += 1;
                        metrics::record_eviction();
                    }
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(connection = %member.id(), room = %room, "Mailbox closed, removing");
                    self.remove(room, member.id());
                }
            }
        }

        metrics::record_deliveries(report.delivered);
        trace!(
            room = %room,
            kind = %kind,
            delivered = report.delivered,
            evicted = report.evicted,
            "Broadcast"
        );
        report
    }

    fn update_gauges(&self) {
        let stats = self.registry.stats();
        metrics::set_membership(stats.room_count, stats.connection_count);
    }
}

/// Cloneable handle to a running hub.
#[derive(Clone)]
pub struct HubHandle {
    commands: mpsc::UnboundedSender<Command>,
    registry: Arc<RoomRegistry>,
    config: Arc<HubConfig>,
}

impl HubHandle {
    /// Open a connection for `subscriber` in `room`, sized by the hub config.
    ///
    /// The connection is not registered yet.
    #[must_use]
    pub fn open(
        &self,
        room: impl Into<RoomKey>,
        subscriber: impl Into<SubscriberId>,
    ) -> (ConnectionHandle, Mailbox) {
        Connection::open(room, subscriber, self.config.mailbox_capacity)
    }

    /// Add a connection to its room.
    ///
    /// Returns once the hub has applied the registration, so any broadcast
    /// issued afterwards, from any task, sees the new member.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Shutdown`] if the hub has stopped; the handle is
    /// dropped and its mailbox closes.
    pub async fn register(&self, handle: ConnectionHandle) -> Result<(), HubError> {
        let (ack, done) = oneshot::channel();
        self.commands
            .send(Command::Register { handle, ack })
            .map_err(|_| HubError::Shutdown)?;
        done.await.map_err(|_| HubError::Shutdown)
    }

    /// Remove a connection from its room and close its mailbox.
    ///
    /// Idempotent; unknown connections are ignored. Deliveries to the
    /// connection stop immediately, before the hub processes the removal.
    pub fn unregister(&self, connection: &ConnectionRef) {
        connection.retire();
        let _ = self.commands.send(Command::Unregister {
            room: connection.room().to_string(),
            id: connection.id(),
        });
    }

    /// Serialize an event once and fan it out to its room.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Encode`] if the event cannot be serialized, in which
    /// case nothing is delivered, or [`HubError::Shutdown`] if the hub has
    /// stopped.
    pub async fn broadcast<P: Serialize>(
        &self,
        event: &Event<P>,
    ) -> Result<BroadcastReport, HubError> {
        let frame = event.encode()?;
        let (reply, report) = oneshot::channel();
        self.commands
            .send(Command::Broadcast {
                kind: event.kind(),
                room: event.room().to_string(),
                frame,
                reply: Some(reply),
            })
            .map_err(|_| HubError::Shutdown)?;
        report.await.map_err(|_| HubError::Shutdown)
    }

    /// Fire-and-forget broadcast for producers on the write path.
    ///
    /// Failures are logged and never surfaced.
    pub fn emit<P: Serialize + ?Sized>(&self, kind: EventKind, room: &str, payload: &P) {
        let frame = match codec::encode(kind, room, payload) {
            Ok(frame) => frame,
            Err(e) => {
                metrics::record_encode_error();
                warn!(room = %room, kind = %kind, error = %e, "Dropping event that failed to encode");
                return;
            }
        };

        let sent = self.commands.send(Command::Broadcast {
            kind,
            room: room.to_string(),
            frame,
            reply: None,
        });
        if sent.is_err() {
            debug!(room = %room, kind = %kind, "Hub stopped, event dropped");
        }
    }

    /// Wait until every command sent before this call has been processed.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Shutdown`] if the hub has stopped.
    pub async fn flush(&self) -> Result<(), HubError> {
        let (ack, done) = oneshot::channel();
        self.commands
            .send(Command::Flush(ack))
            .map_err(|_| HubError::Shutdown)?;
        done.await.map_err(|_| HubError::Shutdown)
    }

    /// Ask the hub to stop. Every registered mailbox is closed.
    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }

    /// Whether the control loop is still accepting commands.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    /// Hub configuration.
    #[must_use]
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Whether a room currently has members.
    #[must_use]
    pub fn room_exists(&self, room: &str) -> bool {
        self.registry.contains_room(room)
    }

    /// Number of members in a room.
    #[must_use]
    pub fn subscriber_count(&self, room: &str) -> usize {
        self.registry.member_count(room)
    }

    /// Whether a connection is currently registered in its room.
    #[must_use]
    pub fn is_registered(&self, connection: &ConnectionRef) -> bool {
        self.registry.is_member(connection.room(), connection.id())
    }

    /// Registry statistics.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        self.registry.stats()
    }
}
