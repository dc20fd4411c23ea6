//! SockJS `/info` discovery endpoint.
//!
//! SockJS clients query `{ws_path}/info` before choosing a transport. The
//! answer always advertises the raw `WebSocket` transport; no fallback
//! transports are served.

use axum::Json;
use axum::http::header;
use axum::response::IntoResponse;
use serde::Serialize;

/// Body of the `/info` response.
#[derive(Debug, Clone, Serialize)]
pub struct SockJsInfo {
    /// `WebSocket` transport available.
    pub websocket: bool,
    /// Accepted origins.
    pub origins: Vec<String>,
    /// Whether sticky-session cookies are required.
    pub cookie_needed: bool,
    /// Random value clients use to seed their own ids.
    pub entropy: u32,
}

impl SockJsInfo {
    /// Build a response with fresh entropy.
    pub fn generate() -> Self {
        Self {
            websocket: true,
            origins: vec!["*:*".to_string()],
            cookie_needed: false,
            entropy: rand::random(),
        }
    }
}

/// `GET {ws_path}/info`
pub async fn info_handler() -> impl IntoResponse {
    (
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::CACHE_CONTROL, "no-store, no-cache, must-revalidate, max-age=0"),
        ],
        Json(SockJsInfo::generate()),
    )
}
