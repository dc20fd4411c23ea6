//! # barpi-server
//!
//! Axum HTTP + `WebSocket` server hosting the Bar-Pi messaging core.
//!
//! - `GET {ws_path}` and `GET {ws_path}/{*rest}`: STOMP over `WebSocket`
//! - `GET {ws_path}/info`: SockJS discovery
//! - `GET /health`, `GET /metrics`
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use errors::ServerError;
pub use server::BarPiServer;
