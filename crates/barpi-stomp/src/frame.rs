//! STOMP frame codec.
//!
//! Wire grammar: `COMMAND\n(key:value\n)*\nBODY\0`. Parsing is lenient in
//! the ways browser clients need (leading heart-beat EOLs, CRLF line ends,
//! trailing EOLs after the NUL) and strict about structure: a frame without
//! a command, with a header line lacking a colon, or without the blank line
//! that ends the headers does not parse.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use tracing::debug;

/// `CONNECT` command.
pub const CONNECT: &str = "CONNECT";
/// `STOMP` command (CONNECT alias).
pub const STOMP: &str = "STOMP";
/// `CONNECTED` command.
pub const CONNECTED: &str = "CONNECTED";
/// `SUBSCRIBE` command.
pub const SUBSCRIBE: &str = "SUBSCRIBE";
/// `UNSUBSCRIBE` command.
pub const UNSUBSCRIBE: &str = "UNSUBSCRIBE";
/// `SEND` command.
pub const SEND: &str = "SEND";
/// `MESSAGE` command.
pub const MESSAGE: &str = "MESSAGE";
/// `DISCONNECT` command.
pub const DISCONNECT: &str = "DISCONNECT";
/// `ERROR` command. Never emitted by this server.
pub const ERROR: &str = "ERROR";

/// One protocol message unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Command token, never empty.
    pub command: String,
    /// Header map. Serialized in key order.
    pub headers: BTreeMap<String, String>,
    /// Frame body, possibly empty.
    pub body: String,
}

impl Frame {
    /// Create a frame with no headers and an empty body.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            headers: BTreeMap::new(),
            body: String::new(),
        }
    }

    /// Builder-style header insertion.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.headers.insert(key.into(), value.into());
        self
    }

    /// Builder-style body assignment.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Look up a header value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    /// Parse one frame from text. Returns `None` for heart-beats and
    /// malformed input.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim_start_matches(['\r', '\n']);
        if text.is_empty() {
            return None;
        }

        let (command_line, mut rest) = text.split_once('\n')?;
        let command = command_line.trim();
        if command.is_empty() {
            return None;
        }

        let mut headers = BTreeMap::new();
        loop {
            let (line, tail) = rest.split_once('\n')?;
            rest = tail;
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                break;
            }
            let (key, value) = line.split_once(':')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            let _ = headers.insert(key.to_string(), value.trim().to_string());
        }

        // The first NUL terminates the frame; anything after it is EOL padding.
        let body = rest.split_once('\0').map_or(rest, |(body, _)| body);

        Some(Self {
            command: command.to_string(),
            headers,
            body: body.to_string(),
        })
    }

    /// Render the frame in wire form, including the NUL terminator.
    pub fn to_wire(&self) -> String {
        let mut out = String::with_capacity(
            self.command.len() + self.body.len() + self.headers.len() * 32 + 3,
        );
        out.push_str(&self.command);
        out.push('\n');
        for (key, value) in &self.headers {
            let _ = writeln!(out, "{key}:{value}");
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }
}

/// Parse an inbound WebSocket payload into frames.
///
/// SockJS clients wrap frames in a JSON array of strings; each element is
/// parsed in order and unparsable elements are skipped. Any other payload
/// is parsed as a single frame.
pub fn parse_payload(text: &str) -> Vec<Frame> {
    let trimmed = text.trim();
    if trimmed.starts_with('[') && trimmed.ends_with(']') {
        if let Ok(elements) = serde_json::from_str::<Vec<String>>(trimmed) {
            return elements
                .iter()
                .filter_map(|element| {
                    let frame = Frame::parse(element);
                    if frame.is_none() {
                        debug!(len = element.len(), "discarding malformed frame in envelope");
                    }
                    frame
                })
                .collect();
        }
    }
    match Frame::parse(text) {
        Some(frame) => vec![frame],
        None => {
            debug!(len = text.len(), "discarding malformed frame");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_connect_with_headers() {
        let frame =
            Frame::parse("CONNECT\naccept-version:1.2\nhost:bar-pi\n\n\0").unwrap();
        assert_eq!(frame.command, "CONNECT");
        assert_eq!(frame.get("accept-version"), Some("1.2"));
        assert_eq!(frame.get("host"), Some("bar-pi"));
        assert!(frame.body.is_empty());
    }

    #[test]
    fn parse_send_with_body() {
        let frame =
            Frame::parse("SEND\ndestination:/topic/x\n\n{\"a\":1}\0").unwrap();
        assert_eq!(frame.command, "SEND");
        assert_eq!(frame.get("destination"), Some("/topic/x"));
        assert_eq!(frame.body, "{\"a\":1}");
    }

    #[test]
    fn header_split_on_first_colon_and_trimmed() {
        let frame = Frame::parse("SEND\n  destination : /a:b \n\n\0").unwrap();
        assert_eq!(frame.get("destination"), Some("/a:b"));
    }

    #[test]
    fn crlf_line_endings_tolerated() {
        let frame = Frame::parse("SUBSCRIBE\r\nid:sub-0\r\ndestination:/t\r\n\r\n\0").unwrap();
        assert_eq!(frame.command, "SUBSCRIBE");
        assert_eq!(frame.get("id"), Some("sub-0"));
        assert_eq!(frame.get("destination"), Some("/t"));
    }

    #[test]
    fn leading_heartbeats_skipped() {
        let frame = Frame::parse("\n\n\r\nDISCONNECT\n\n\0").unwrap();
        assert_eq!(frame.command, "DISCONNECT");
    }

    #[test]
    fn trailing_eol_after_nul_ignored() {
        let frame = Frame::parse("SEND\ndestination:/t\n\nhello\0\n\n").unwrap();
        assert_eq!(frame.body, "hello");
    }

    #[test]
    fn body_without_terminator_kept() {
        let frame = Frame::parse("SEND\ndestination:/t\n\nhello").unwrap();
        assert_eq!(frame.body, "hello");
    }

    #[test]
    fn multiline_body_preserved() {
        let frame = Frame::parse("SEND\ndestination:/t\n\nline1\nline2\n\0").unwrap();
        assert_eq!(frame.body, "line1\nline2\n");
    }

    #[test]
    fn malformed_inputs_rejected() {
        assert!(Frame::parse("").is_none());
        assert!(Frame::parse("\n").is_none());
        assert!(Frame::parse("\r\n\n").is_none());
        assert!(Frame::parse("CONNECT").is_none());
        assert!(Frame::parse("CONNECT\nhost:x\n").is_none());
        assert!(Frame::parse("SEND\nnot-a-header\n\nbody\0").is_none());
        assert!(Frame::parse("   \nhost:x\n\n\0").is_none());
        assert!(Frame::parse("SEND\n:value\n\n\0").is_none());
    }

    #[test]
    fn duplicate_header_last_wins() {
        let frame = Frame::parse("SEND\nx:1\nx:2\n\n\0").unwrap();
        assert_eq!(frame.get("x"), Some("2"));
    }

    #[test]
    fn to_wire_sorted_headers() {
        let wire = Frame::new(MESSAGE)
            .header("subscription", "sub-0")
            .header("destination", "/topic/a")
            .header("message-id", "m1")
            .body("{}")
            .to_wire();
        assert_eq!(
            wire,
            "MESSAGE\ndestination:/topic/a\nmessage-id:m1\nsubscription:sub-0\n\n{}\0"
        );
    }

    #[test]
    fn to_wire_empty_body() {
        assert_eq!(Frame::new(DISCONNECT).to_wire(), "DISCONNECT\n\n\0");
    }

    #[test]
    fn payload_plain_frame() {
        let frames = parse_payload("SUBSCRIBE\nid:0\ndestination:/t\n\n\0");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].command, SUBSCRIBE);
    }

    #[test]
    fn payload_sockjs_envelope_in_order() {
        let payload = serde_json::to_string(&vec![
            "CONNECT\naccept-version:1.2\n\n\0",
            "garbage",
            "SUBSCRIBE\nid:sub-0\ndestination:/topic/a\n\n\0",
        ])
        .unwrap();
        let frames = parse_payload(&payload);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].command, CONNECT);
        assert_eq!(frames[1].command, SUBSCRIBE);
    }

    #[test]
    fn payload_heartbeat_yields_nothing() {
        assert!(parse_payload("\n").is_empty());
        assert!(parse_payload("").is_empty());
    }

    #[test]
    fn payload_bracketed_non_json_parsed_as_frame() {
        assert!(parse_payload("[not json]").is_empty());
    }

    fn token() -> impl Strategy<Value = String> {
        "[A-Za-z0-9_./-]{1,16}"
    }

    fn header_value() -> impl Strategy<Value = String> {
        "[A-Za-z0-9_./:,-]{0,24}"
    }

    proptest! {
        #[test]
        fn roundtrip(
            command in "[A-Z]{1,12}",
            headers in proptest::collection::btree_map(token(), header_value(), 0..6),
            body in "[^\\x00]{0,64}",
        ) {
            let frame = Frame { command, headers, body };
            let parsed = Frame::parse(&frame.to_wire()).unwrap();
            prop_assert_eq!(parsed, frame);
        }
    }
}
