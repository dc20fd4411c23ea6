//! Per-connection session state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::ids::SessionId;

/// Lifecycle of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Upgraded, no CONNECT seen yet.
    Connecting,
    /// CONNECT acknowledged.
    Connected,
    /// Torn down. Terminal.
    Closed,
}

/// A client's interest in one destination.
#[derive(Clone, Debug)]
pub struct Subscription {
    /// Client-chosen id, echoed in every MESSAGE.
    pub id: String,
    /// Subscribed destination.
    pub destination: String,
    /// Owning session. Non-owning so the registry never keeps a session alive.
    pub session: Weak<ClientSession>,
}

/// Server-side state for one live connection.
pub struct ClientSession {
    id: SessionId,
    username: Mutex<Option<String>>,
    state: Mutex<SessionState>,
    /// Sender half of the outbound mailbox. `None` once closed.
    mailbox: Mutex<Option<mpsc::Sender<Arc<String>>>>,
    /// Subscription id -> subscription. Mutated only under the registry
    /// write lock.
    pub(crate) subscriptions: Mutex<HashMap<String, Subscription>>,
    dropped_messages: AtomicU64,
    connected_at: Instant,
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("username", &self.username())
            .finish_non_exhaustive()
    }
}

impl ClientSession {
    /// Create a session that delivers into `mailbox`.
    pub fn new(id: SessionId, mailbox: mpsc::Sender<Arc<String>>) -> Self {
        Self {
            id,
            username: Mutex::new(None),
            state: Mutex::new(SessionState::Connecting),
            mailbox: Mutex::new(Some(mailbox)),
            subscriptions: Mutex::new(HashMap::new()),
            dropped_messages: AtomicU64::new(0),
            connected_at: Instant::now(),
        }
    }

    /// Session id.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Authenticated username, if CONNECT carried a valid token.
    pub fn username(&self) -> Option<String> {
        self.username.lock().clone()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Move to CONNECTED and attach the resolved username. Ignored once closed.
    pub fn mark_connected(&self, username: Option<String>) {
        let mut state = self.state.lock();
        if *state == SessionState::Closed {
            return;
        }
        *state = SessionState::Connected;
        *self.username.lock() = username;
    }

    /// Enqueue a serialized frame without blocking.
    ///
    /// Returns `false` if the mailbox is full or closed, and increments
    /// the dropped message counter.
    pub fn send(&self, message: Arc<String>) -> bool {
        let delivered = self
            .mailbox
            .lock()
            .as_ref()
            .is_some_and(|tx| tx.try_send(message).is_ok());
        if !delivered {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
        }
        delivered
    }

    /// Close the mailbox so the write loop drains and exits.
    ///
    /// Returns `true` on the first call only.
    pub fn close(&self) -> bool {
        *self.state.lock() = SessionState::Closed;
        self.mailbox.lock().take().is_some()
    }

    /// Total messages dropped for this session.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.lock().len()
    }

    /// Snapshot of (subscription id, destination) pairs.
    pub fn subscriptions(&self) -> Vec<(String, String)> {
        self.subscriptions
            .lock()
            .values()
            .map(|s| (s.id.clone(), s.destination.clone()))
            .collect()
    }

    /// Session age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
