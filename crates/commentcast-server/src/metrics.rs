//! Metrics export for commentcast.
//!
//! Hub metrics are recorded in `commentcast-core`; this module describes
//! them, adds connection-level metrics, and exports everything in
//! Prometheus format.

use commentcast_core::metrics::names as hub;
use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

/// Metric names.
pub mod names {
    pub const CONNECTIONS_TOTAL: &str = "commentcast_connections_total";
    pub const CONNECTIONS_ACTIVE: &str = "commentcast_connections_active";
    pub const HANDSHAKES_REJECTED_TOTAL: &str = "commentcast_handshakes_rejected_total";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(
        names::CONNECTIONS_TOTAL,
        "Total number of connections since server start"
    );
    metrics::describe_gauge!(
        names::CONNECTIONS_ACTIVE,
        "Current number of open WebSocket connections"
    );
    metrics::describe_counter!(
        names::HANDSHAKES_REJECTED_TOTAL,
        "Handshakes rejected before upgrade"
    );
    metrics::describe_counter!(hub::EVENTS_TOTAL, "Events emitted, by kind");
    metrics::describe_counter!(hub::DELIVERIES_TOTAL, "Frames queued to subscriber mailboxes");
    metrics::describe_counter!(
        hub::EVICTIONS_TOTAL,
        "Subscribers disconnected for falling behind"
    );
    metrics::describe_counter!(hub::ENCODE_ERRORS_TOTAL, "Events that failed to serialize");
    metrics::describe_gauge!(hub::ROOMS_ACTIVE, "Rooms with at least one subscriber");
    metrics::describe_gauge!(hub::SUBSCRIBERS_ACTIVE, "Registered subscribers");

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the exporter cannot be installed.
pub fn start_metrics_server(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record a handshake rejected with the given reason.
pub fn record_rejected_handshake(reason: &'static str) {
    counter!(names::HANDSHAKES_REJECTED_TOTAL, "reason" => reason).increment(1);
}

/// Metrics guard that tracks an open connection until dropped.
pub struct ConnectionMetricsGuard;

impl ConnectionMetricsGuard {
    /// Create a new metrics guard, recording a connection.
    #[must_use]
    pub fn new() -> Self {
        counter!(names::CONNECTIONS_TOTAL).increment(1);
        gauge!(names::CONNECTIONS_ACTIVE).increment(1.0);
        Self
    }
}

impl Default for ConnectionMetricsGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectionMetricsGuard {
    fn drop(&mut self) {
        gauge!(names::CONNECTIONS_ACTIVE).decrement(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_without_recorder() {
        // No recorder installed: every call is a no-op
        init_metrics();
        record_rejected_handshake("missing_room");
        let _guard = ConnectionMetricsGuard::new();
    }
}
