//! Hub instrumentation.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! embedding binary installs a recorder.

use metrics::{counter, gauge};

/// Metric names.
pub mod names {
    pub const EVENTS_TOTAL: &str = "commentcast_events_total";
    pub const DELIVERIES_TOTAL: &str = "commentcast_deliveries_total";
    pub const EVICTIONS_TOTAL: &str = "commentcast_evictions_total";
    pub const ENCODE_ERRORS_TOTAL: &str = "commentcast_encode_errors_total";
    pub const ROOMS_ACTIVE: &str = "commentcast_rooms_active";
    pub const SUBSCRIBERS_ACTIVE: &str = "commentcast_subscribers_active";
}

/// Record an event accepted for fan-out.
pub fn record_event(kind: &'static str) {
    counter!(names::EVENTS_TOTAL, "kind" => kind).increment(1);
}

/// Record successful mailbox deliveries.
pub fn record_deliveries(count: usize) {
    counter!(names::DELIVERIES_TOTAL).increment(count as u64);
}

/// Record a slow-consumer eviction.
pub fn record_eviction() {
    counter!(names::EVICTIONS_TOTAL).increment(1);
}

/// Record an event that failed to serialize.
pub fn record_encode_error() {
    counter!(names::ENCODE_ERRORS_TOTAL).increment(1);
}

/// Update room and subscriber gauges.
pub fn set_membership(rooms: usize, subscribers: usize) {
    gauge!(names::ROOMS_ACTIVE).set(rooms as f64);
    gauge!(names::SUBSCRIBERS_ACTIVE).set(subscribers as f64);
}
