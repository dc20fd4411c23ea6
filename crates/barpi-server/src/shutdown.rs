//! Shutdown of the listener and every upgraded connection.
//!
//! axum's graceful shutdown stops accepting and waits for in-flight HTTP
//! requests, but an upgraded WebSocket is detached from its request. Each
//! connection loop is therefore tracked here so shutdown can wait for the
//! sessions to tear down and send their Close frames.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tokio_util::task::task_tracker::TrackedFuture;
use tracing::{info, warn};

/// How long to wait for connections to close.
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Cancellation signal plus the set of live connection loops.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    connections: TaskTracker,
}

impl ShutdownCoordinator {
    /// Create a coordinator with no tracked connections.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            connections: TaskTracker::new(),
        }
    }

    /// Token observed by the listener and every connection loop.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Signal shutdown without waiting.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether shutdown has been signalled.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wrap a connection loop so [`drain`](Self::drain) waits for it.
    pub fn track<F: Future>(&self, connection: F) -> TrackedFuture<F> {
        self.connections.track_future(connection)
    }

    /// Connection loops still running.
    pub fn open_connections(&self) -> usize {
        self.connections.len()
    }

    /// Signal shutdown, then wait for the listener task and all tracked
    /// connections. After `timeout` (10 s by default) the listener is
    /// aborted and remaining connections are abandoned.
    pub async fn drain(&self, listener: JoinHandle<()>, timeout: Option<Duration>) {
        let timeout = timeout.unwrap_or(DEFAULT_DRAIN_TIMEOUT);
        self.shutdown();
        let _ = self.connections.close();
        info!(
            connections = self.open_connections(),
            timeout_secs = timeout.as_secs(),
            "draining connections"
        );

        let abort = listener.abort_handle();
        let all_done = async {
            let _ = listener.await;
            self.connections.wait().await;
        };
        if tokio::time::timeout(timeout, all_done).await.is_err() {
            warn!(
                remaining = self.open_connections(),
                "drain timed out after {timeout:?}"
            );
            abort.abort();
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
