//! Prometheus exposition for connection and messaging metrics.
//!
//! Messaging-core metric names live in `barpi_stomp::metrics` and are
//! re-exported here so every name the server exposes is in one place.

use ::metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::errors::ServerError;

pub use barpi_stomp::metrics::{
    STOMP_FRAMES_RECEIVED_TOTAL, STOMP_MESSAGES_PUBLISHED_TOTAL, WS_BROADCAST_DROPS_TOTAL,
};

/// Connections accepted (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// Connections ended (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Connections currently open (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Connection lifetime (histogram, seconds).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";

/// Kiosk tablets stay connected for hours; short sessions are page reloads.
const CONNECTION_DURATION_BUCKETS: &[f64] = &[1.0, 10.0, 60.0, 600.0, 3600.0, 14_400.0, 86_400.0];

fn builder() -> Result<PrometheusBuilder, ServerError> {
    Ok(PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full(WS_CONNECTION_DURATION_SECONDS.to_string()),
        CONNECTION_DURATION_BUCKETS,
    )?)
}

/// Attach help text and units to every metric name.
pub fn describe() {
    describe_counter!(WS_CONNECTIONS_TOTAL, "WebSocket connections accepted");
    describe_counter!(WS_DISCONNECTIONS_TOTAL, "WebSocket connections ended");
    describe_gauge!(WS_CONNECTIONS_ACTIVE, "WebSocket connections currently open");
    describe_histogram!(
        WS_CONNECTION_DURATION_SECONDS,
        Unit::Seconds,
        "Lifetime of closed WebSocket connections"
    );
    describe_counter!(
        WS_BROADCAST_DROPS_TOTAL,
        "MESSAGE frames dropped because a subscriber mailbox was full or closed"
    );
    describe_counter!(STOMP_FRAMES_RECEIVED_TOTAL, "Inbound STOMP frames by command");
    describe_counter!(
        STOMP_MESSAGES_PUBLISHED_TOTAL,
        "MESSAGE frames enqueued to subscribers"
    );
}

/// Install the global recorder and describe all metrics.
///
/// Call once at startup. The returned handle renders `/metrics`.
pub fn install_recorder() -> Result<PrometheusHandle, ServerError> {
    let handle = builder()?.install_recorder()?;
    describe();
    info!("prometheus recorder installed");
    Ok(handle)
}
