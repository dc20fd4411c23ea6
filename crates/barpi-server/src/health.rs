//! `/health` endpoint body.

use std::time::Instant;

use barpi_stomp::MessagingCore;
use serde::Serialize;

use crate::config::ServerConfig;

/// Liveness plus a snapshot of the messaging core.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse<'a> {
    /// `"ok"` whenever the server can answer.
    pub status: &'static str,
    /// Application name from settings.
    pub name: &'a str,
    /// Application version from settings.
    pub version: &'a str,
    /// Whole seconds since the server was created.
    pub uptime_secs: u64,
    /// Live STOMP sessions.
    pub connections: usize,
    /// Destinations with at least one subscriber.
    pub topics: usize,
}

impl<'a> HealthResponse<'a> {
    /// Snapshot `core` for a server configured with `config`.
    pub fn snapshot(config: &'a ServerConfig, core: &MessagingCore, started: Instant) -> Self {
        Self {
            status: "ok",
            name: &config.app_name,
            version: &config.app_version,
            uptime_secs: started.elapsed().as_secs(),
            connections: core.session_count(),
            topics: core.topic_count(),
        }
    }
}
