//! Typed publishing to the appliance's fixed destinations.
//!
//! Producers (cocktail orchestrator, pump service, event actions) hand a
//! serializable snapshot to [`Publisher`]. Serialization failures are
//! logged and the publish is dropped; callers never see an error.

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::broker::MessagingCore;

/// Cocktail production progress.
pub const COCKTAIL_PROGRESS: &str = "/topic/cocktailprogress";
/// Pump layout.
pub const PUMP_LAYOUT: &str = "/topic/pump/layout";
/// Running event-action status.
pub const EVENT_ACTION_STATUS: &str = "/topic/eventactionstatus";
/// Event-action log, suffixed with `/{actionId}`.
pub const EVENT_ACTION_LOG: &str = "/topic/eventactionlog";
/// Dispensing area / glass detection.
pub const DISPENSING_AREA: &str = "/topic/dispensingarea";
/// Pump running state, suffixed with `/{pumpId}`.
pub const PUMP_RUNNING_STATE: &str = "/topic/pump/runningstate";
/// UI state signals.
pub const UI_STATE_INFOS: &str = "/topic/uistateinfos";

/// Body that tells clients to clear an event-action log.
pub const CLEAR_LOG_SIGNAL: &str = "DELETE";
/// Body that tells clients to drop cached recipe pages.
pub const INVALIDATE_RECIPES_SIGNAL: &str = "INVALIDATE_CACHED_RECIPES";

/// Who a publish is addressed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Audience<'a> {
    /// Every subscriber of the destination.
    All,
    /// Subscribers of the `/user`-prefixed destination.
    User(&'a str),
}

/// Typed front end over [`MessagingCore`].
#[derive(Clone)]
pub struct Publisher {
    core: Arc<MessagingCore>,
}

impl Publisher {
    /// Wrap a shared core.
    pub fn new(core: Arc<MessagingCore>) -> Self {
        Self { core }
    }

    /// Publish cocktail progress.
    pub fn cocktail_progress<T: Serialize + ?Sized>(&self, to: Audience<'_>, progress: &T) -> usize {
        self.publish_json(to, COCKTAIL_PROGRESS, progress)
    }

    /// Publish the pump layout.
    pub fn pump_layout<T: Serialize + ?Sized>(&self, to: Audience<'_>, pumps: &T) -> usize {
        self.publish_json(to, PUMP_LAYOUT, pumps)
    }

    /// Publish running event-action status.
    pub fn event_action_status<T: Serialize + ?Sized>(&self, to: Audience<'_>, status: &T) -> usize {
        self.publish_json(to, EVENT_ACTION_STATUS, status)
    }

    /// Publish log entries for one event action.
    pub fn event_action_log<T: Serialize + ?Sized>(
        &self,
        to: Audience<'_>,
        action_id: i64,
        entries: &T,
    ) -> usize {
        self.publish_json(to, &format!("{EVENT_ACTION_LOG}/{action_id}"), entries)
    }

    /// Tell subscribers of an action's log to clear it.
    pub fn clear_event_action_log(&self, to: Audience<'_>, action_id: i64) -> usize {
        self.publish_raw(
            to,
            &format!("{EVENT_ACTION_LOG}/{action_id}"),
            CLEAR_LOG_SIGNAL,
        )
    }

    /// Publish dispensing-area (glass detection) state.
    pub fn detected_glass<T: Serialize + ?Sized>(&self, to: Audience<'_>, state: &T) -> usize {
        self.publish_json(to, DISPENSING_AREA, state)
    }

    /// Publish one pump's running state.
    pub fn pump_running_state<T: Serialize + ?Sized>(
        &self,
        to: Audience<'_>,
        pump_id: i64,
        state: &T,
    ) -> usize {
        self.publish_json(to, &format!("{PUMP_RUNNING_STATE}/{pump_id}"), state)
    }

    /// Tell clients to drop cached recipe pages.
    pub fn invalidate_recipe_scroll_caches(&self, to: Audience<'_>) -> usize {
        self.publish_raw(to, UI_STATE_INFOS, INVALIDATE_RECIPES_SIGNAL)
    }

    /// Serialize `value` as JSON and publish it. Returns 0 on serialization
    /// failure.
    pub fn publish_json<T: Serialize + ?Sized>(
        &self,
        to: Audience<'_>,
        destination: &str,
        value: &T,
    ) -> usize {
        match serde_json::to_string(value) {
            Ok(body) => self.publish_raw(to, destination, &body),
            Err(e) => {
                warn!(destination, error = %e, "failed to serialize publish payload, dropping");
                0
            }
        }
    }

    /// Publish a pre-rendered body.
    pub fn publish_raw(&self, to: Audience<'_>, destination: &str, body: &str) -> usize {
        match to {
            Audience::All => self.core.broadcast(destination, body),
            Audience::User(username) => self.core.send_to_user(username, destination, body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::session::ClientSession;
    use serde::ser::Error as _;
    use tokio::sync::mpsc;

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("nope"))
        }
    }

    fn subscribed(
        core: &MessagingCore,
        destination: &str,
    ) -> (Arc<ClientSession>, mpsc::Receiver<Arc<String>>) {
        let (session, rx) = core.open_session();
        assert!(core.subscribe(&session, destination, "sub-0"));
        (session, rx)
    }

    fn next(rx: &mut mpsc::Receiver<Arc<String>>) -> Frame {
        Frame::parse(&rx.try_recv().unwrap()).unwrap()
    }

    #[test]
    fn cocktail_progress_scenario() {
        let core = Arc::new(MessagingCore::default());
        let publisher = Publisher::new(Arc::clone(&core));
        let (_s, mut rx) = subscribed(&core, COCKTAIL_PROGRESS);

        let progress = serde_json::json!({"status": "in_progress", "percentComplete": 50});
        assert_eq!(publisher.cocktail_progress(Audience::All, &progress), 1);

        let frame = next(&mut rx);
        assert_eq!(frame.get("subscription"), Some("sub-0"));
        assert_eq!(frame.get("destination"), Some(COCKTAIL_PROGRESS));
        assert_eq!(frame.body, r#"{"percentComplete":50,"status":"in_progress"}"#);
    }

    #[test]
    fn ids_rendered_in_decimal() {
        let core = Arc::new(MessagingCore::default());
        let publisher = Publisher::new(Arc::clone(&core));
        let (_a, mut log_rx) = subscribed(&core, "/topic/eventactionlog/42");
        let (_b, mut pump_rx) = subscribed(&core, "/topic/pump/runningstate/7");

        assert_eq!(publisher.event_action_log(Audience::All, 42, &["line"]), 1);
        assert_eq!(publisher.pump_running_state(Audience::All, 7, &true), 1);
        assert_eq!(next(&mut log_rx).body, r#"["line"]"#);
        assert_eq!(next(&mut pump_rx).body, "true");
    }

    #[test]
    fn user_audience_targets_user_destination() {
        let core = Arc::new(MessagingCore::default());
        let publisher = Publisher::new(Arc::clone(&core));
        let (_plain, mut plain_rx) = subscribed(&core, PUMP_LAYOUT);
        let (_user, mut user_rx) = subscribed(&core, "/user/topic/pump/layout");

        assert_eq!(publisher.pump_layout(Audience::User("bob"), &Vec::<u8>::new()), 1);
        assert!(plain_rx.try_recv().is_err());
        assert_eq!(next(&mut user_rx).body, "[]");
    }

    #[test]
    fn signals_are_raw_bodies() {
        let core = Arc::new(MessagingCore::default());
        let publisher = Publisher::new(Arc::clone(&core));
        let (_a, mut log_rx) = subscribed(&core, "/topic/eventactionlog/3");
        let (_b, mut ui_rx) = subscribed(&core, UI_STATE_INFOS);

        assert_eq!(publisher.clear_event_action_log(Audience::All, 3), 1);
        assert_eq!(publisher.invalidate_recipe_scroll_caches(Audience::All), 1);
        assert_eq!(next(&mut log_rx).body, "DELETE");
        assert_eq!(next(&mut ui_rx).body, "INVALIDATE_CACHED_RECIPES");
    }

    #[test]
    fn signals_can_target_one_user() {
        let core = Arc::new(MessagingCore::default());
        let publisher = Publisher::new(Arc::clone(&core));
        let (_plain, mut plain_rx) = subscribed(&core, UI_STATE_INFOS);
        let (_ui, mut ui_rx) = subscribed(&core, "/user/topic/uistateinfos");
        let (_log, mut log_rx) = subscribed(&core, "/user/topic/eventactionlog/7");

        assert_eq!(
            publisher.invalidate_recipe_scroll_caches(Audience::User("carol")),
            1
        );
        assert_eq!(publisher.clear_event_action_log(Audience::User("carol"), 7), 1);
        assert!(plain_rx.try_recv().is_err());
        assert_eq!(next(&mut ui_rx).body, "INVALIDATE_CACHED_RECIPES");
        assert_eq!(next(&mut log_rx).body, "DELETE");
    }

    #[test]
    fn remaining_destinations() {
        let core = Arc::new(MessagingCore::default());
        let publisher = Publisher::new(Arc::clone(&core));
        let (_a, mut status_rx) = subscribed(&core, EVENT_ACTION_STATUS);
        let (_b, mut glass_rx) = subscribed(&core, DISPENSING_AREA);

        assert_eq!(publisher.event_action_status(Audience::All, &[1, 2]), 1);
        assert_eq!(publisher.detected_glass(Audience::All, &"present"), 1);
        assert_eq!(next(&mut status_rx).body, "[1,2]");
        assert_eq!(next(&mut glass_rx).body, "\"present\"");
    }

    #[test]
    fn serialization_failure_is_dropped() {
        let core = Arc::new(MessagingCore::default());
        let publisher = Publisher::new(Arc::clone(&core));
        let (_s, mut rx) = subscribed(&core, COCKTAIL_PROGRESS);

        assert_eq!(publisher.cocktail_progress(Audience::All, &Unserializable), 0);
        assert!(rx.try_recv().is_err());
    }
}
