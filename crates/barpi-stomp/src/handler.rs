//! Applies one inbound frame to a session.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, warn};

use crate::broker::MessagingCore;
use crate::command::ClientCommand;
use crate::errors::CommandError;
use crate::frame::Frame;
use crate::metrics::STOMP_FRAMES_RECEIVED_TOTAL;
use crate::session::ClientSession;

/// Resolves a bearer token to the username it was issued for.
///
/// Consulted once per CONNECT. Returning `None` leaves the session
/// anonymous; the connection is still accepted.
pub trait UsernameResolver: Send + Sync {
    /// Resolve `token` (without the `Bearer ` prefix).
    fn resolve(&self, token: &str) -> Option<String>;
}

/// Frame-counter label for every command a client may not send.
const UNSUPPORTED_LABEL: &str = "unsupported";

/// What the connection loop should do after a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Keep reading.
    Continue,
    /// The client asked to disconnect; tear the session down.
    Disconnect,
}

/// Dispatch a parsed frame.
///
/// Frames are processed in any session state. Incomplete or unsupported
/// commands are logged and ignored; no ERROR frame is ever sent.
pub fn handle_frame(
    core: &MessagingCore,
    session: &Arc<ClientSession>,
    frame: Frame,
    resolver: &dyn UsernameResolver,
) -> FrameOutcome {
    let parsed = ClientCommand::try_from(frame);
    let label = match &parsed {
        Ok(command) => command.name(),
        Err(CommandError::MissingHeader { command, .. }) => *command,
        Err(CommandError::Unsupported(_)) => UNSUPPORTED_LABEL,
    };
    counter!(STOMP_FRAMES_RECEIVED_TOTAL, "command" => label).increment(1);

    let command = match parsed {
        Ok(command) => command,
        Err(e @ CommandError::MissingHeader { .. }) => {
            warn!(session_id = %session.id(), error = %e, "ignoring incomplete command");
            return FrameOutcome::Continue;
        }
        Err(e @ CommandError::Unsupported(_)) => {
            debug!(session_id = %session.id(), error = %e, "ignoring frame");
            return FrameOutcome::Continue;
        }
    };

    debug!(
        session_id = %session.id(),
        state = ?session.state(),
        command = command.name(),
        "handling frame"
    );

    match command {
        ClientCommand::Connect { authorization } => {
            let username = authorization.as_deref().and_then(|value| {
                if let Some(token) = value.strip_prefix("Bearer ") {
                    resolver.resolve(token.trim())
                } else {
                    debug!(session_id = %session.id(), "authorization header without Bearer scheme");
                    None
                }
            });
            let connected = core.connect(session, username);
            let _ = session.send(Arc::new(connected.to_wire()));
        }
        ClientCommand::Subscribe { destination, id } => {
            let _ = core.subscribe(session, &destination, &id);
        }
        ClientCommand::Unsubscribe { id } => {
            let _ = core.unsubscribe(session, &id);
        }
        ClientCommand::Send { destination, body } => {
            let _ = core.broadcast(&destination, &body);
        }
        ClientCommand::Disconnect => return FrameOutcome::Disconnect,
    }
    FrameOutcome::Continue
}
