//! Per-connection reader and writer pumps.
//!
//! [`serve`] registers a connection with the hub, then runs two tasks until
//! both have exited:
//!
//! - the writer forwards mailbox messages to the sink in order, optionally
//!   interleaving keepalive pings, and stops on mailbox closure or a failed
//!   write;
//! - the reader consumes inbound frames and stops on a read error, a clean
//!   close, an idle timeout, or the writer's close signal.
//!
//! Whichever exits first unregisters the connection (unregister is
//! idempotent, so both do). The writer always closes the transport on its
//! way out.

use commentcast_core::{ConnectionHandle, ConnectionRef, ConnectionState, HubHandle, Mailbox};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, trace, warn};

use crate::traits::{FrameSink, FrameStream, Inbound, TransportError};

/// Pump timing configuration.
#[derive(Debug, Clone)]
pub struct PumpConfig {
    /// Interval between keepalive pings. `None` disables pings.
    pub ping_interval: Option<Duration>,
    /// Maximum time without any inbound frame before the peer is considered
    /// dead. `None` waits forever.
    pub idle_timeout: Option<Duration>,
    /// Maximum time a single write may take.
    pub write_timeout: Option<Duration>,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            ping_interval: Some(Duration::from_secs(30)),
            idle_timeout: Some(Duration::from_secs(60)),
            write_timeout: Some(Duration::from_secs(10)),
        }
    }
}

impl PumpConfig {
    /// No pings and no timeouts.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            ping_interval: None,
            idle_timeout: None,
            write_timeout: None,
        }
    }
}

/// Register a connection and drive it until it is closed.
///
/// Returns the connection's final state, which is always
/// [`ConnectionState::Closed`].
pub async fn serve<W, R>(
    hub: HubHandle,
    handle: ConnectionHandle,
    mailbox: Mailbox,
    mut sink: W,
    stream: R,
    config: PumpConfig,
) -> ConnectionState
where
    W: FrameSink + 'static,
    R: FrameStream + 'static,
{
    let conn = handle.connection_ref();

    if let Err(e) = hub.register(handle).await {
        warn!(connection = %conn.id(), room = %conn.room(), error = %e, "Registration failed");
        let _ = sink.close().await;
        conn.advance(ConnectionState::Closed);
        return conn.state();
    }

    conn.advance(ConnectionState::Active);
    debug!(
        connection = %conn.id(),
        room = %conn.room(),
        subscriber = %conn.subscriber(),
        "Connection active"
    );

    let (close_tx, close_rx) = oneshot::channel();

    let writer = tokio::spawn(write_pump(
        hub.clone(),
        conn.clone(),
        mailbox,
        sink,
        close_tx,
        config.clone(),
    ));
    let reader = tokio::spawn(read_pump(
        hub.clone(),
        conn.clone(),
        stream,
        close_rx,
        config.idle_timeout,
    ));

    let (written, read) = tokio::join!(writer, reader);
    for result in [written, read] {
        if let Err(e) = result {
            error!(connection = %conn.id(), error = %e, "Pump task failed");
        }
    }

    // A panicked pump never reached its own unregister.
    hub.unregister(&conn);
    conn.advance(ConnectionState::Closed);
    debug!(connection = %conn.id(), room = %conn.room(), "Connection closed");
    conn.state()
}

async fn write_pump<W: FrameSink>(
    hub: HubHandle,
    conn: ConnectionRef,
    mut mailbox: Mailbox,
    mut sink: W,
    close_tx: oneshot::Sender<()>,
    config: PumpConfig,
) {
    let mut pings = config.ping_interval.map(|period| {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });

    loop {
        tokio::select! {
            message = mailbox.recv() => {
                let Some(frame) = message else {
                    debug!(connection = %conn.id(), "Mailbox closed");
                    break;
                };
                trace!(connection = %conn.id(), bytes = frame.len(), "Writing event");
                if let Err(e) = with_timeout(config.write_timeout, sink.send_text(frame)).await {
                    debug!(connection = %conn.id(), error = %e, "Write failed");
                    break;
                }
            }
            _ = next_tick(&mut pings) => {
                if let Err(e) = with_timeout(config.write_timeout, sink.ping()).await {
                    debug!(connection = %conn.id(), error = %e, "Ping failed");
                    break;
                }
            }
        }
    }

    if conn.advance(ConnectionState::Closing) {
        debug!(connection = %conn.id(), "Writer exited first");
    }
    hub.unregister(&conn);

    if let Err(e) = with_timeout(config.write_timeout, sink.close()).await {
        trace!(connection = %conn.id(), error = %e, "Close failed");
    }
    let _ = close_tx.send(());
}

async fn read_pump<R: FrameStream>(
    hub: HubHandle,
    conn: ConnectionRef,
    mut stream: R,
    mut close_rx: oneshot::Receiver<()>,
    idle_timeout: Option<Duration>,
) {
    loop {
        tokio::select! {
            biased;

            _ = &mut close_rx => {
                debug!(connection = %conn.id(), "Writer closed the transport");
                break;
            }

            frame = with_timeout(idle_timeout, stream.recv()) => {
                match frame {
                    Ok(Some(Inbound::Data(len))) => {
                        trace!(connection = %conn.id(), bytes = len, "Ignoring inbound message");
                    }
                    Ok(Some(Inbound::Ping | Inbound::Pong)) => {
                        trace!(connection = %conn.id(), "Keepalive");
                    }
                    Ok(None) => {
                        debug!(connection = %conn.id(), "Peer closed the connection");
                        break;
                    }
                    Err(TransportError::Timeout) => {
                        debug!(connection = %conn.id(), "Idle timeout");
                        break;
                    }
                    Err(e) => {
                        warn!(connection = %conn.id(), error = %e, "Read failed");
                        break;
                    }
                }
            }
        }
    }

    if conn.advance(ConnectionState::Closing) {
        debug!(connection = %conn.id(), "Reader exited first");
    }
    hub.unregister(&conn);
}

async fn with_timeout<T, F>(limit: Option<Duration>, fut: F) -> Result<T, TransportError>
where
    F: std::future::Future<Output = Result<T, TransportError>>,
{
    match limit {
        Some(limit) => time::timeout(limit, fut)
            .await
            .unwrap_or(Err(TransportError::Timeout)),
        None => fut.await,
    }
}

async fn next_tick(interval: &mut Option<time::Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
