//! STOMP-over-`WebSocket` transport.
//!
//! - [`connection`]: per-connection read and write loops
//! - [`sockjs`]: SockJS discovery endpoint

pub mod connection;
pub mod sockjs;
