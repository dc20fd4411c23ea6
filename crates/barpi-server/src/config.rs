//! Server configuration.

use std::time::Duration;

use barpi_settings::BarPiSettings;
use serde::{Deserialize, Serialize};

/// Configuration for the Bar-Pi server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// `WebSocket` endpoint path.
    pub ws_path: String,
    /// Idle interval between server pings, in seconds.
    pub heartbeat_interval_secs: u64,
    /// Deadline for each outbound write, in seconds.
    pub write_timeout_secs: u64,
    /// Max inbound `WebSocket` message size in bytes.
    pub max_message_size: usize,
    /// Application name reported by `/health`.
    pub app_name: String,
    /// Application version reported by `/health`.
    pub app_version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            ws_path: "/websocket".into(),
            heartbeat_interval_secs: 54,
            write_timeout_secs: 10,
            max_message_size: 1024 * 1024,
            app_name: "CocktailPi".into(),
            app_version: "2.0.0".into(),
        }
    }
}

impl ServerConfig {
    /// Heartbeat interval as a `Duration`.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Write deadline as a `Duration`.
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

impl From<&BarPiSettings> for ServerConfig {
    fn from(settings: &BarPiSettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            ws_path: settings.messaging.ws_path.clone(),
            heartbeat_interval_secs: settings.messaging.heartbeat_interval_secs,
            write_timeout_secs: settings.messaging.write_timeout_secs,
            max_message_size: settings.messaging.max_message_size,
            app_name: settings.name.clone(),
            app_version: settings.version.clone(),
        }
    }
}
