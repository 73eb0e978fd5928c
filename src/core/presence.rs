//! Presence state and the presence-socket frame codec
//!
//! Frames are JSON envelopes `{"event": <name>, "data": <payload>}`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::VecDeque;
use tracing::{debug, trace, warn};

/// Chat lines kept per session
pub const MESSAGE_CAPACITY: usize = 50;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub author: String,
    pub text: String,
}

impl ChatMessage {
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
        }
    }
}

/// Viewer count and recent chat for one event room
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PresenceState {
    pub viewer_count: u64,
    /// Ring buffer, oldest first
    pub messages: VecDeque<ChatMessage>,
    pub pinned: Option<String>,
    capacity: usize,
}

impl Default for PresenceState {
    fn default() -> Self {
        Self::new(MESSAGE_CAPACITY)
    }
}

impl PresenceState {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            viewer_count: 0,
            messages: VecDeque::with_capacity(capacity),
            pinned: None,
            capacity,
        }
    }

    /// Append a chat line, evicting the oldest when full
    pub fn push_message(&mut self, msg: ChatMessage) {
        if self.messages.len() >= self.capacity {
            self.messages.pop_front();
        }
        self.messages.push_back(msg);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Apply one decoded update. Last write wins for the viewer count.
    pub fn apply(&mut self, update: PresenceUpdate) {
        match update {
            PresenceUpdate::ViewerCount(count) => self.viewer_count = count,
            PresenceUpdate::Message(msg) => self.push_message(msg),
            PresenceUpdate::Pinned(text) => self.pinned = text,
        }
    }
}

/// A decoded server event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PresenceUpdate {
    ViewerCount(u64),
    Message(ChatMessage),
    Pinned(Option<String>),
}

/// Parse one presence frame
///
/// Returns None for unknown events and malformed frames.
pub fn parse_frame(msg: &str) -> Option<PresenceUpdate> {
    trace!(len = msg.len(), "Parsing presence frame");

    let json: Value = serde_json::from_str(msg)
        .map_err(|e| {
            warn!(error = %e, "Failed to parse presence frame");
        })
        .ok()?;

    let event = json["event"].as_str()?;
    let data = &json["data"];

    match event {
        "viewer-count" => {
            // Some servers send {"count": n}; accept both shapes
            let count = data.as_u64().or_else(|| data["count"].as_u64())?;
            trace!(count, "Viewer count");
            Some(PresenceUpdate::ViewerCount(count))
        }
        "new-message" => {
            let msg: ChatMessage = serde_json::from_value(data.clone())
                .map_err(|e| {
                    debug!(error = %e, "Malformed chat message");
                })
                .ok()?;
            Some(PresenceUpdate::Message(msg))
        }
        "pinned-message" => {
            let text = data["text"].as_str().or_else(|| data.as_str());
            Some(PresenceUpdate::Pinned(text.map(str::to_string)))
        }
        other => {
            trace!(event = other, "Ignoring presence event");
            None
        }
    }
}

pub fn join_frame(event_id: &str, username: &str) -> String {
    json!({
        "event": "join-event",
        "data": { "eventId": event_id, "username": username },
    })
    .to_string()
}

pub fn message_frame(event_id: &str, text: &str) -> String {
    json!({
        "event": "send-message",
        "data": { "eventId": event_id, "text": text },
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_keeps_last_fifty_in_order() {
        let mut state = PresenceState::default();
        for i in 0..60 {
            state.apply(PresenceUpdate::Message(ChatMessage::new("u", format!("m{i}"))));
            assert!(state.messages.len() <= MESSAGE_CAPACITY);
        }
        assert_eq!(state.messages.len(), 50);
        let texts: Vec<_> = state.messages.iter().map(|m| m.text.clone()).collect();
        let expected: Vec<_> = (10..60).map(|i| format!("m{i}")).collect();
        assert_eq!(texts, expected);
    }

    #[test]
    fn test_viewer_count_last_write_wins() {
        let mut state = PresenceState::default();
        state.apply(PresenceUpdate::ViewerCount(40));
        state.apply(PresenceUpdate::ViewerCount(12));
        assert_eq!(state.viewer_count, 12);
    }

    #[test]
    fn test_parse_viewer_count() {
        assert_eq!(
            parse_frame(r#"{"event":"viewer-count","data":17}"#),
            Some(PresenceUpdate::ViewerCount(17))
        );
        assert_eq!(
            parse_frame(r#"{"event":"viewer-count","data":{"count":3}}"#),
            Some(PresenceUpdate::ViewerCount(3))
        );
    }

    #[test]
    fn test_parse_new_message() {
        let frame = r#"{"event":"new-message","data":{"author":"Guest-1234","text":"hello"}}"#;
        assert_eq!(
            parse_frame(frame),
            Some(PresenceUpdate::Message(ChatMessage::new("Guest-1234", "hello")))
        );
    }

    #[test]
    fn test_parse_pinned_message() {
        let frame = r#"{"event":"pinned-message","data":{"text":"Q&A at 3pm"}}"#;
        assert_eq!(
            parse_frame(frame),
            Some(PresenceUpdate::Pinned(Some("Q&A at 3pm".into())))
        );
    }

    #[test]
    fn test_ignore_unknown_and_malformed() {
        assert!(parse_frame(r#"{"event":"typing","data":{}}"#).is_none());
        assert!(parse_frame("not json").is_none());
        assert!(parse_frame(r#"{"event":"new-message","data":{"author":"x"}}"#).is_none());
        assert!(parse_frame(r#"{"event":"viewer-count","data":-1}"#).is_none());
    }

    #[test]
    fn test_outgoing_frames() {
        let join: Value = serde_json::from_str(&join_frame("e1", "Guest-0001")).unwrap();
        assert_eq!(join["event"], "join-event");
        assert_eq!(join["data"]["eventId"], "e1");
        assert_eq!(join["data"]["username"], "Guest-0001");

        let send: Value = serde_json::from_str(&message_frame("e1", "hi")).unwrap();
        assert_eq!(send["event"], "send-message");
        assert_eq!(send["data"]["text"], "hi");
    }
}
