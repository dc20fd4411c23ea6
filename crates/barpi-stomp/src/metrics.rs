//! Metric names recorded by the messaging core.

/// Counter: deliveries dropped because a subscriber mailbox was full or closed.
pub const WS_BROADCAST_DROPS_TOTAL: &str = "ws_broadcast_drops_total";
/// Counter: inbound STOMP frames parsed (label: `command`, or `unsupported`).
pub const STOMP_FRAMES_RECEIVED_TOTAL: &str = "stomp_frames_received_total";
/// Counter: MESSAGE frames enqueued to subscriber mailboxes.
pub const STOMP_MESSAGES_PUBLISHED_TOTAL: &str = "stomp_messages_published_total";
