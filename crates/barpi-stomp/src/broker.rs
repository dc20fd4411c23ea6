//! Topic registry and dispatcher.
//!
//! [`MessagingCore`] owns the destination -> subscriptions map and the set
//! of live sessions behind one reader/writer lock. Mutations (subscribe,
//! unsubscribe, connect, teardown) take the write lock. Dispatch takes the
//! read lock only long enough to snapshot the subscriber set and enqueues
//! after releasing it, so a slow subscriber never stalls publication.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::counter;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::frame::{self, Frame};
use crate::ids::{MessageId, SessionId};
use crate::metrics::{STOMP_MESSAGES_PUBLISHED_TOTAL, WS_BROADCAST_DROPS_TOTAL};
use crate::session::{ClientSession, Subscription};

/// Prefix that turns a destination into its per-user variant.
pub const USER_DESTINATION_PREFIX: &str = "/user";

/// Tunables for the messaging core.
#[derive(Clone, Debug)]
pub struct MessagingConfig {
    /// Outbound mailbox capacity per session, in frames.
    pub mailbox_capacity: usize,
    /// Value of the `server` header in CONNECTED frames.
    pub server_name: String,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 256,
            server_name: "Bar-Pi/1.0".to_string(),
        }
    }
}

/// Topic entries are keyed by owning session and subscription id.
type SubscriptionKey = (SessionId, String);

#[derive(Default)]
struct Registry {
    sessions: HashMap<SessionId, Arc<ClientSession>>,
    topics: HashMap<String, HashMap<SubscriptionKey, Subscription>>,
}

impl Registry {
    fn remove_entry(&mut self, destination: &str, session_id: &SessionId, subscription_id: &str) {
        if let Some(subscribers) = self.topics.get_mut(destination) {
            let _ = subscribers.remove(&(session_id.clone(), subscription_id.to_string()));
            if subscribers.is_empty() {
                let _ = self.topics.remove(destination);
            }
        }
    }
}

/// The messaging core: sessions, subscriptions and fan-out.
pub struct MessagingCore {
    config: MessagingConfig,
    registry: RwLock<Registry>,
}

impl MessagingCore {
    /// Create an empty core.
    pub fn new(config: MessagingConfig) -> Self {
        Self {
            config,
            registry: RwLock::new(Registry::default()),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &MessagingConfig {
        &self.config
    }

    /// Register a new session and return it with the receiving end of its
    /// mailbox.
    pub fn open_session(&self) -> (Arc<ClientSession>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(self.config.mailbox_capacity.max(1));
        let session = Arc::new(ClientSession::new(SessionId::generate(), tx));
        {
            let mut registry = self.registry.write();
            let _ = registry
                .sessions
                .insert(session.id().clone(), Arc::clone(&session));
        }
        debug!(session_id = %session.id(), "session opened");
        (session, rx)
    }

    /// Mark a session connected and build its CONNECTED frame.
    pub fn connect(&self, session: &ClientSession, username: Option<String>) -> Frame {
        {
            let _registry = self.registry.write();
            session.mark_connected(username);
        }
        info!(
            session_id = %session.id(),
            username = session.username().as_deref().unwrap_or("-"),
            "client connected"
        );
        Frame::new(frame::CONNECTED)
            .header("version", "1.2")
            .header("session", session.id().as_str())
            .header("server", self.config.server_name.as_str())
            .header("heart-beat", "0,0")
    }

    /// Add a subscription to both the session and the registry.
    ///
    /// An id already in use on the session is replaced. Returns `false` if
    /// the session has already been torn down.
    pub fn subscribe(&self, session: &Arc<ClientSession>, destination: &str, id: &str) -> bool {
        let mut registry = self.registry.write();
        if !registry.sessions.contains_key(session.id()) {
            debug!(session_id = %session.id(), destination, "subscribe on closed session ignored");
            return false;
        }

        let subscription = Subscription {
            id: id.to_string(),
            destination: destination.to_string(),
            session: Arc::downgrade(session),
        };
        let previous = session
            .subscriptions
            .lock()
            .insert(id.to_string(), subscription.clone());
        if let Some(previous) = previous {
            registry.remove_entry(&previous.destination, session.id(), &previous.id);
        }
        let _ = registry
            .topics
            .entry(destination.to_string())
            .or_default()
            .insert((session.id().clone(), id.to_string()), subscription);

        debug!(session_id = %session.id(), destination, subscription_id = id, "subscribed");
        true
    }

    /// Remove a subscription by id. Returns `false` if it did not exist.
    pub fn unsubscribe(&self, session: &ClientSession, id: &str) -> bool {
        let mut registry = self.registry.write();
        let Some(removed) = session.subscriptions.lock().remove(id) else {
            return false;
        };
        registry.remove_entry(&removed.destination, session.id(), id);
        debug!(
            session_id = %session.id(),
            destination = %removed.destination,
            subscription_id = id,
            "unsubscribed"
        );
        true
    }

    /// Tear a session down: drop every subscription, forget the session and
    /// close its mailbox.
    ///
    /// Idempotent. Returns `true` only for the call that did the work.
    pub fn close_session(&self, session_id: &SessionId) -> bool {
        let session = {
            let mut registry = self.registry.write();
            let Some(session) = registry.sessions.remove(session_id) else {
                return false;
            };
            let subscriptions: Vec<Subscription> = session
                .subscriptions
                .lock()
                .drain()
                .map(|(_, s)| s)
                .collect();
            for sub in &subscriptions {
                registry.remove_entry(&sub.destination, session_id, &sub.id);
            }
            session
        };
        let _ = session.close();
        info!(
            session_id = %session_id,
            dropped = session.drop_count(),
            "session closed"
        );
        true
    }

    /// Deliver `body` to every subscriber of `destination`.
    ///
    /// Each subscriber gets its own MESSAGE frame with its subscription id
    /// and a fresh message id. A full or closed mailbox drops the message
    /// for that subscriber only. Returns the number of frames enqueued.
    pub fn broadcast(&self, destination: &str, body: &str) -> usize {
        let targets: Vec<Subscription> = {
            let registry = self.registry.read();
            match registry.topics.get(destination) {
                Some(subscribers) => subscribers.values().cloned().collect(),
                None => return 0,
            }
        };

        let mut delivered = 0usize;
        for sub in targets {
            let Some(session) = sub.session.upgrade() else {
                continue;
            };
            let message = Frame::new(frame::MESSAGE)
                .header("subscription", sub.id.as_str())
                .header("destination", destination)
                .header("message-id", MessageId::generate().as_str())
                .body(body);
            if session.send(Arc::new(message.to_wire())) {
                delivered += 1;
            } else {
                counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
                warn!(
                    session_id = %session.id(),
                    destination,
                    subscription_id = %sub.id,
                    "mailbox full or closed, message dropped"
                );
            }
        }

        counter!(STOMP_MESSAGES_PUBLISHED_TOTAL).increment(delivered as u64);
        debug!(destination, recipients = delivered, "broadcast");
        delivered
    }

    /// Deliver to the per-user variant of `destination` (`/user` + destination).
    ///
    /// Subscribers opt in by subscribing to that destination themselves;
    /// the subscribing session's username is not checked.
    pub fn send_to_user(&self, username: &str, destination: &str, body: &str) -> usize {
        let user_destination = format!("{USER_DESTINATION_PREFIX}{destination}");
        debug!(username, destination = %user_destination, "send to user");
        self.broadcast(&user_destination, body)
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.registry.read().sessions.len()
    }

    /// Number of destinations with at least one subscriber.
    pub fn topic_count(&self) -> usize {
        self.registry.read().topics.len()
    }

    /// Number of subscriptions on `destination`.
    pub fn subscriber_count(&self, destination: &str) -> usize {
        self.registry
            .read()
            .topics
            .get(destination)
            .map_or(0, HashMap::len)
    }

    /// Destinations with at least one subscriber, sorted.
    pub fn destinations(&self) -> Vec<String> {
        let mut destinations: Vec<String> = self.registry.read().topics.keys().cloned().collect();
        destinations.sort();
        destinations
    }
}

impl Default for MessagingCore {
    fn default() -> Self {
        Self::new(MessagingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn core_with_capacity(capacity: usize) -> MessagingCore {
        MessagingCore::new(MessagingConfig {
            mailbox_capacity: capacity,
            ..MessagingConfig::default()
        })
    }

    fn recv_frame(rx: &mut mpsc::Receiver<Arc<String>>) -> Frame {
        let wire = rx.try_recv().expect("expected a queued frame");
        Frame::parse(&wire).expect("queued frame should parse")
    }

    /// (session, subscription id, destination) reachable from sessions and
    /// from topics, respectively.
    type Reachable = BTreeSet<(String, String, String)>;

    fn reachable(core: &MessagingCore) -> (Reachable, Reachable) {
        let registry = core.registry.read();
        let from_sessions = registry
            .sessions
            .values()
            .flat_map(|s| {
                s.subscriptions()
                    .into_iter()
                    .map(move |(id, dest)| (s.id().to_string(), id, dest))
            })
            .collect();
        let from_topics = registry
            .topics
            .iter()
            .flat_map(|(dest, subs)| {
                subs.iter().map(move |((sid, id), sub)| {
                    assert_eq!(&sub.destination, dest);
                    assert_eq!(&sub.id, id);
                    (sid.to_string(), id.clone(), dest.clone())
                })
            })
            .collect();
        (from_sessions, from_topics)
    }

    #[test]
    fn open_session_registers() {
        let core = MessagingCore::default();
        let (session, _rx) = core.open_session();
        assert_eq!(core.session_count(), 1);
        assert!(session.id().as_str().starts_with("session-"));
    }

    #[test]
    fn connect_builds_connected_frame() {
        let core = MessagingCore::default();
        let (session, _rx) = core.open_session();
        let frame = core.connect(&session, Some("alice".into()));
        assert_eq!(frame.command, "CONNECTED");
        assert_eq!(frame.get("version"), Some("1.2"));
        assert_eq!(frame.get("session"), Some(session.id().as_str()));
        assert_eq!(frame.get("server"), Some("Bar-Pi/1.0"));
        assert_eq!(frame.get("heart-beat"), Some("0,0"));
        assert_eq!(session.username().as_deref(), Some("alice"));
    }

    #[test]
    fn broadcast_reaches_subscriber() {
        let core = MessagingCore::default();
        let (session, mut rx) = core.open_session();
        assert!(core.subscribe(&session, "/topic/cocktailprogress", "sub-0"));

        let body = r#"{"status":"in_progress","percentComplete":50}"#;
        assert_eq!(core.broadcast("/topic/cocktailprogress", body), 1);

        let frame = recv_frame(&mut rx);
        assert_eq!(frame.command, "MESSAGE");
        assert_eq!(frame.get("subscription"), Some("sub-0"));
        assert_eq!(frame.get("destination"), Some("/topic/cocktailprogress"));
        assert!(frame.get("message-id").unwrap().starts_with("msg-"));
        assert_eq!(frame.body, body);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn broadcast_without_subscribers_is_noop() {
        let core = MessagingCore::default();
        let (_session, mut rx) = core.open_session();
        assert_eq!(core.broadcast("/topic/nobody", "x"), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn two_subscribers_get_distinct_message_ids() {
        let core = MessagingCore::default();
        let (a, mut rx_a) = core.open_session();
        let (b, mut rx_b) = core.open_session();
        assert!(core.subscribe(&a, "/topic/pump/layout", "a-1"));
        assert!(core.subscribe(&b, "/topic/pump/layout", "b-7"));

        assert_eq!(core.broadcast("/topic/pump/layout", "[]"), 2);
        let fa = recv_frame(&mut rx_a);
        let fb = recv_frame(&mut rx_b);
        assert_eq!(fa.get("subscription"), Some("a-1"));
        assert_eq!(fb.get("subscription"), Some("b-7"));
        assert_ne!(fa.get("message-id"), fb.get("message-id"));
        assert_eq!(fa.body, fb.body);
    }

    #[test]
    fn two_subscriptions_same_session_each_delivered() {
        let core = MessagingCore::default();
        let (session, mut rx) = core.open_session();
        assert!(core.subscribe(&session, "/topic/a", "s1"));
        assert!(core.subscribe(&session, "/topic/a", "s2"));
        assert_eq!(core.subscriber_count("/topic/a"), 2);
        assert_eq!(core.broadcast("/topic/a", "x"), 2);
        let mut ids = vec![
            recv_frame(&mut rx).get("subscription").unwrap().to_string(),
            recv_frame(&mut rx).get("subscription").unwrap().to_string(),
        ];
        ids.sort();
        assert_eq!(ids, vec!["s1", "s2"]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let core = MessagingCore::default();
        let (session, mut rx) = core.open_session();
        assert!(core.subscribe(&session, "/topic/a", "sub-0"));
        assert!(core.unsubscribe(&session, "sub-0"));
        assert_eq!(core.broadcast("/topic/a", "x"), 0);
        assert!(rx.try_recv().is_err());
        assert_eq!(core.topic_count(), 0);
    }

    #[test]
    fn unsubscribe_unknown_is_noop() {
        let core = MessagingCore::default();
        let (session, _rx) = core.open_session();
        assert!(core.subscribe(&session, "/topic/a", "sub-0"));
        assert!(!core.unsubscribe(&session, "nope"));
        assert_eq!(core.subscriber_count("/topic/a"), 1);
    }

    #[test]
    fn resubscribe_same_id_replaces() {
        let core = MessagingCore::default();
        let (session, mut rx) = core.open_session();
        assert!(core.subscribe(&session, "/topic/a", "sub-0"));
        assert!(core.subscribe(&session, "/topic/b", "sub-0"));
        assert_eq!(core.destinations(), vec!["/topic/b".to_string()]);
        assert_eq!(session.subscription_count(), 1);
        assert_eq!(core.broadcast("/topic/a", "x"), 0);
        assert_eq!(core.broadcast("/topic/b", "y"), 1);
        assert_eq!(recv_frame(&mut rx).body, "y");
    }

    #[tokio::test]
    async fn close_session_removes_everything() {
        let core = MessagingCore::default();
        let (session, mut rx) = core.open_session();
        let (other, _other_rx) = core.open_session();
        assert!(core.subscribe(&session, "/topic/a", "1"));
        assert!(core.subscribe(&session, "/topic/b", "2"));
        assert!(core.subscribe(&other, "/topic/a", "1"));

        assert!(core.close_session(session.id()));
        assert_eq!(core.session_count(), 1);
        assert_eq!(core.subscriber_count("/topic/a"), 1);
        assert_eq!(core.subscriber_count("/topic/b"), 0);
        assert_eq!(core.destinations(), vec!["/topic/a".to_string()]);
        assert_eq!(core.broadcast("/topic/a", "x"), 1);
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn close_session_is_idempotent() {
        let core = MessagingCore::default();
        let (session, _rx) = core.open_session();
        assert!(core.subscribe(&session, "/topic/a", "1"));
        assert!(core.close_session(session.id()));
        assert!(!core.close_session(session.id()));
        assert!(!core.close_session(&SessionId::from_raw("session-unknown")));
        assert_eq!(core.session_count(), 0);
        assert_eq!(core.topic_count(), 0);
    }

    #[test]
    fn subscribe_after_close_rejected() {
        let core = MessagingCore::default();
        let (session, _rx) = core.open_session();
        assert!(core.close_session(session.id()));
        assert!(!core.subscribe(&session, "/topic/a", "1"));
        assert_eq!(core.topic_count(), 0);
    }

    #[test]
    fn full_mailbox_drops_only_that_subscriber() {
        let core = core_with_capacity(1);
        let (slow, mut slow_rx) = core.open_session();
        let (fast, mut fast_rx) = core.open_session();
        assert!(core.subscribe(&slow, "/topic/a", "s"));
        assert!(core.subscribe(&fast, "/topic/a", "f"));

        assert_eq!(core.broadcast("/topic/a", "one"), 2);
        let _ = recv_frame(&mut fast_rx);
        assert_eq!(core.broadcast("/topic/a", "two"), 1);

        assert_eq!(slow.drop_count(), 1);
        assert_eq!(fast.drop_count(), 0);
        assert_eq!(recv_frame(&mut slow_rx).body, "one");
        assert_eq!(recv_frame(&mut fast_rx).body, "two");
    }

    #[test]
    fn send_to_user_only_reaches_user_destination() {
        let core = MessagingCore::default();
        let (plain, mut plain_rx) = core.open_session();
        let (user, mut user_rx) = core.open_session();
        assert!(core.subscribe(&plain, "/topic/x", "p"));
        assert!(core.subscribe(&user, "/user/topic/x", "u"));

        assert_eq!(core.send_to_user("alice", "/topic/x", "hi"), 1);
        assert!(plain_rx.try_recv().is_err());
        let frame = recv_frame(&mut user_rx);
        assert_eq!(frame.get("destination"), Some("/user/topic/x"));
        assert_eq!(frame.get("subscription"), Some("u"));
        assert_eq!(frame.body, "hi");
    }

    #[test]
    fn registry_invariant_holds_after_mixed_operations() {
        let core = MessagingCore::default();
        let sessions: Vec<_> = (0..4).map(|_| core.open_session()).collect();
        for (i, (session, _)) in sessions.iter().enumerate() {
            for j in 0..3 {
                let destination = format!("/topic/{}", (i + j) % 3);
                assert!(core.subscribe(session, &destination, &format!("sub-{j}")));
            }
        }
        assert!(core.unsubscribe(&sessions[0].0, "sub-1"));
        assert!(core.subscribe(&sessions[1].0, "/topic/new", "sub-0"));
        assert!(core.close_session(sessions[2].0.id()));

        let (from_sessions, from_topics) = reachable(&core);
        assert_eq!(from_sessions, from_topics);
        assert_eq!(from_sessions.len(), 8);
    }

    #[test]
    fn dropped_session_is_skipped() {
        let core = MessagingCore::default();
        let (session, rx) = core.open_session();
        assert!(core.subscribe(&session, "/topic/a", "1"));
        drop(rx);
        assert_eq!(core.broadcast("/topic/a", "x"), 0);
        assert_eq!(session.drop_count(), 1);
    }
}
