use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: bookings created. Labels: none.
pub const BOOKINGS_CREATED_TOTAL: &str = "hallpass_bookings_created_total";

/// Counter: booking requests refused because the slot was taken,
/// pre-write or at commit. Labels: stage (precheck | commit).
pub const BOOKING_CONFLICTS_TOTAL: &str = "hallpass_booking_conflicts_total";

/// Counter: lifecycle transitions applied. Labels: to.
pub const BOOKING_TRANSITIONS_TOTAL: &str = "hallpass_booking_transitions_total";

/// Counter: availability searches served.
pub const ROOM_SEARCHES_TOTAL: &str = "hallpass_room_searches_total";

// ── Failure-path metrics ────────────────────────────────────────

/// Counter: sensitive operations refused by the rate limiter.
pub const RATE_LIMITED_TOTAL: &str = "hallpass_rate_limited_total";

/// Counter: store calls that exceeded the configured timeout.
pub const STORE_TIMEOUTS_TOTAL: &str = "hallpass_store_timeouts_total";

/// Counter: notification dispatches that failed (logged and swallowed).
pub const NOTIFY_FAILURES_TOTAL: &str = "hallpass_notify_failures_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
