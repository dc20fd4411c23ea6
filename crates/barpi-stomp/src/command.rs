//! Typed client commands.
//!
//! Each inbound frame is converted into a [`ClientCommand`] before it
//! touches any state, so a SUBSCRIBE without an `id` never reaches the
//! registry.

use crate::errors::CommandError;
use crate::frame::{self, Frame};

/// A validated client-to-server command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientCommand {
    /// `CONNECT` or `STOMP`.
    Connect {
        /// Raw `Authorization` header, if present.
        authorization: Option<String>,
    },
    /// `SUBSCRIBE`.
    Subscribe {
        /// Topic to listen on.
        destination: String,
        /// Client-chosen subscription id.
        id: String,
    },
    /// `UNSUBSCRIBE`.
    Unsubscribe {
        /// Subscription id to cancel.
        id: String,
    },
    /// `SEND`.
    Send {
        /// Topic to publish to.
        destination: String,
        /// Message body, forwarded verbatim.
        body: String,
    },
    /// `DISCONNECT`.
    Disconnect,
}

impl ClientCommand {
    /// Command name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connect { .. } => frame::CONNECT,
            Self::Subscribe { .. } => frame::SUBSCRIBE,
            Self::Unsubscribe { .. } => frame::UNSUBSCRIBE,
            Self::Send { .. } => frame::SEND,
            Self::Disconnect => frame::DISCONNECT,
        }
    }
}

fn required(
    frame: &Frame,
    command: &'static str,
    header: &'static str,
) -> Result<String, CommandError> {
    frame
        .get(header)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(CommandError::MissingHeader { command, header })
}

impl TryFrom<Frame> for ClientCommand {
    type Error = CommandError;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        match frame.command.as_str() {
            frame::CONNECT | frame::STOMP => Ok(Self::Connect {
                authorization: frame
                    .get("Authorization")
                    .or_else(|| frame.get("authorization"))
                    .map(str::to_string),
            }),
            frame::SUBSCRIBE => Ok(Self::Subscribe {
                destination: required(&frame, frame::SUBSCRIBE, "destination")?,
                id: required(&frame, frame::SUBSCRIBE, "id")?,
            }),
            frame::UNSUBSCRIBE => Ok(Self::Unsubscribe {
                id: required(&frame, frame::UNSUBSCRIBE, "id")?,
            }),
            frame::SEND => {
                let destination = required(&frame, frame::SEND, "destination")?;
                Ok(Self::Send {
                    destination,
                    body: frame.body,
                })
            }
            frame::DISCONNECT => Ok(Self::Disconnect),
            _ => Err(CommandError::Unsupported(frame.command)),
        }
    }
}
