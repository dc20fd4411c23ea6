//! Per-connection lifecycle: upgrade through teardown.
//!
//! Each connection runs two tasks. The reader parses inbound payloads and
//! applies them to the session; it never writes to the socket. The writer
//! owns the sink, drains the session mailbox, and pings when idle. Either
//! side ending tears the session down exactly once.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use barpi_stomp::{
    ClientSession, FrameOutcome, MessagingCore, UsernameResolver, handle_frame, parse_payload,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, instrument, warn};

use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
};

/// Everything a connection needs from the server.
#[derive(Clone)]
pub struct ConnectionContext {
    /// Shared messaging core.
    pub core: Arc<MessagingCore>,
    /// Bearer-token resolver consulted on CONNECT.
    pub resolver: Arc<dyn UsernameResolver>,
    /// Server shutdown signal.
    pub shutdown: CancellationToken,
    /// Idle interval before a ping is sent.
    pub heartbeat_interval: Duration,
    /// Deadline for each socket write.
    pub write_timeout: Duration,
}

/// Releases a session when the connection task ends, however it ends.
///
/// Dropped on normal return and during unwinding alike, so a panic in frame
/// handling still removes the session and its subscriptions.
struct SessionGuard {
    core: Arc<MessagingCore>,
    session: Arc<ClientSession>,
    writer: AbortHandle,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let _ = self.core.close_session(self.session.id());
        self.writer.abort();

        let age = self.session.age();
        if std::thread::panicking() {
            error!(duration_secs = age.as_secs(), "connection task panicked, session released");
        }
        info!(
            duration_secs = age.as_secs(),
            dropped = self.session.drop_count(),
            "websocket disconnected"
        );
        counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
        gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
        histogram!(WS_CONNECTION_DURATION_SECONDS).record(age.as_secs_f64());
    }
}

/// Run one STOMP connection until the client leaves, a write fails, or the
/// server shuts down.
pub async fn run_connection(ws: WebSocket, ctx: ConnectionContext) {
    let (ws_tx, ws_rx) = ws.split();
    serve(ws_tx, ws_rx, ctx).await;
}

#[instrument(skip_all, fields(session_id))]
async fn serve<S, R, E>(ws_tx: S, mut ws_rx: R, ctx: ConnectionContext)
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: Display + Send,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let (session, mailbox) = ctx.core.open_session();
    let _ = tracing::Span::current().record("session_id", session.id().as_str());

    info!("websocket connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    let mut writer = tokio::spawn(
        write_loop(ws_tx, mailbox, ctx.heartbeat_interval, ctx.write_timeout).in_current_span(),
    );
    let _guard = SessionGuard {
        core: Arc::clone(&ctx.core),
        session: Arc::clone(&session),
        writer: writer.abort_handle(),
    };

    let reader = async {
        while let Some(msg) = ws_rx.next().await {
            let outcome = match msg {
                Ok(Message::Text(text)) => dispatch(&ctx, &session, text.as_str()),
                Ok(Message::Binary(data)) => {
                    if let Ok(text) = std::str::from_utf8(&data) {
                        dispatch(&ctx, &session, text)
                    } else {
                        debug!(len = data.len(), "ignoring non-UTF-8 binary message");
                        FrameOutcome::Continue
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!("client sent close frame");
                    break;
                }
                Ok(Message::Ping(_) | Message::Pong(_)) => FrameOutcome::Continue,
                Err(e) => {
                    debug!(error = %e, "websocket read failed");
                    break;
                }
            };
            if outcome == FrameOutcome::Disconnect {
                debug!("client requested disconnect");
                break;
            }
        }
    };

    let writer_finished = tokio::select! {
        () = reader => false,
        _ = &mut writer => {
            debug!("writer ended, closing connection");
            true
        }
        () = ctx.shutdown.cancelled() => {
            debug!("server shutting down, closing connection");
            false
        }
    };

    // Closing the session closes the mailbox, so the writer sends Close and exits.
    let _ = ctx.core.close_session(session.id());
    if !writer_finished && timeout(ctx.write_timeout, &mut writer).await.is_err() {
        warn!("writer did not finish in time, aborting");
    }
}

fn dispatch(ctx: &ConnectionContext, session: &Arc<ClientSession>, text: &str) -> FrameOutcome {
    for frame in parse_payload(text) {
        if handle_frame(&ctx.core, session, frame, ctx.resolver.as_ref()) == FrameOutcome::Disconnect {
            return FrameOutcome::Disconnect;
        }
    }
    FrameOutcome::Continue
}

/// Drain `mailbox` into the socket, pinging after `heartbeat_interval` of
/// silence. Ends on the first failed or timed-out write, or after sending
/// Close once the mailbox is closed.
async fn write_loop<S>(
    mut ws_tx: S,
    mut mailbox: mpsc::Receiver<Arc<String>>,
    heartbeat_interval: Duration,
    write_timeout: Duration,
) where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut ping = tokio::time::interval(heartbeat_interval);
    // Skip the immediate first tick
    let _ = ping.tick().await;

    loop {
        let (outbound, is_ping) = tokio::select! {
            msg = mailbox.recv() => match msg {
                Some(text) => (Message::Text(Arc::unwrap_or_clone(text).into()), false),
                None => {
                    let _ = timeout(write_timeout, ws_tx.send(Message::Close(None))).await;
                    break;
                }
            },
            _ = ping.tick() => (Message::Ping(Bytes::new()), true),
        };

        match timeout(write_timeout, ws_tx.send(outbound)).await {
            Ok(Ok(())) => {
                if !is_ping {
                    ping.reset();
                }
            }
            Ok(Err(e)) => {
                debug!(error = %e, "websocket write failed");
                break;
            }
            Err(_) => {
                warn!(timeout_secs = write_timeout.as_secs(), "websocket write timed out");
                break;
            }
        }
    }
}
