//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so a settings
//! file may contain any subset of fields. Missing fields keep their
//! compiled default.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type for the Bar-Pi backend.
///
/// ```json
/// {
///   "server": { "port": 9090 },
///   "messaging": { "wsPath": "/websocket", "mailboxCapacity": 512 }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BarPiSettings {
    /// Application name reported by `/health`.
    pub name: String,
    /// Application version reported by `/health`.
    pub version: String,
    /// HTTP listener settings.
    pub server: ServerSettings,
    /// Push-messaging settings.
    pub messaging: MessagingSettings,
    /// Bearer-token validation settings.
    pub jwt: JwtSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}

impl Default for BarPiSettings {
    fn default() -> Self {
        Self {
            name: "CocktailPi".to_string(),
            version: "2.0.0".to_string(),
            server: ServerSettings::default(),
            messaging: MessagingSettings::default(),
            jwt: JwtSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl BarPiSettings {
    /// Check constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(SettingsError::invalid("server.port", "must be non-zero"));
        }
        if self.jwt.secret.is_empty() {
            return Err(SettingsError::invalid("jwt.secret", "cannot be empty"));
        }
        let path = &self.messaging.ws_path;
        if !path.starts_with('/') || path.len() < 2 || path.ends_with('/') {
            return Err(SettingsError::invalid(
                "messaging.wsPath",
                format!("{path:?} must start with '/' and not end with '/'"),
            ));
        }
        let messaging = &self.messaging;
        for (field, value) in [
            ("messaging.mailboxCapacity", messaging.mailbox_capacity as u64),
            ("messaging.heartbeatIntervalSecs", messaging.heartbeat_interval_secs),
            ("messaging.writeTimeoutSecs", messaging.write_timeout_secs),
        ] {
            if value == 0 {
                return Err(SettingsError::invalid(field, "must be at least 1"));
            }
        }
        Ok(())
    }
}

/// HTTP listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Push-messaging (STOMP over WebSocket) settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessagingSettings {
    /// Path of the WebSocket upgrade endpoint. The SockJS discovery
    /// endpoint is served at `{ws_path}/info`.
    pub ws_path: String,
    /// Outbound mailbox capacity per session, in frames.
    pub mailbox_capacity: usize,
    /// Idle interval between server pings, in seconds.
    pub heartbeat_interval_secs: u64,
    /// Deadline for a single outbound write, in seconds.
    pub write_timeout_secs: u64,
    /// Value of the `server` header in CONNECTED frames.
    pub server_name: String,
    /// Largest accepted inbound WebSocket message, in bytes.
    pub max_message_size: usize,
}

impl Default for MessagingSettings {
    fn default() -> Self {
        Self {
            ws_path: "/websocket".to_string(),
            mailbox_capacity: 256,
            heartbeat_interval_secs: 54,
            write_timeout_secs: 10,
            server_name: "Bar-Pi/1.0".to_string(),
            max_message_size: 1024 * 1024,
        }
    }
}

/// Bearer-token validation settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JwtSettings {
    /// HMAC secret shared with the token issuer.
    pub secret: String,
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            secret: "change-me-in-production-please-use-a-secure-random-string".to_string(),
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive (overridden by `RUST_LOG`).
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
