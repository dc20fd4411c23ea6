//! # barpi-stomp
//!
//! The real-time messaging core of the Bar-Pi backend: a STOMP 1.2 subset
//! spoken over a WebSocket.
//!
//! - [`frame`]: wire codec and SockJS envelope unwrapping
//! - [`command`]: typed client commands validated at parse time
//! - [`session`]: per-connection state and bounded outbound mailbox
//! - [`broker`]: [`MessagingCore`], the topic registry and dispatcher
//! - [`handler`]: applies one inbound frame to a session
//! - [`publish`]: typed JSON publishing to the appliance's destinations
//!
//! The transport (WebSocket read/write loops) lives in `barpi-server`.

#![deny(unsafe_code)]

pub mod broker;
pub mod command;
pub mod errors;
pub mod frame;
pub mod handler;
pub mod ids;
pub mod metrics;
pub mod publish;
pub mod session;

pub use broker::{MessagingConfig, MessagingCore};
pub use command::ClientCommand;
pub use errors::CommandError;
pub use frame::{Frame, parse_payload};
pub use handler::{FrameOutcome, UsernameResolver, handle_frame};
pub use ids::{MessageId, SessionId};
pub use publish::{Audience, Publisher};
pub use session::{ClientSession, SessionState, Subscription};
