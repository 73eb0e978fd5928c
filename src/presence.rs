//! Viewer presence channel
//!
//! One socket per mounted session. Joins the event room on connect, then
//! forwards viewer counts and chat lines as [`PresenceUpdate`]s. Failures are
//! logged and never surfaced: the count simply stalls at its last value.

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use crate::core::presence::{join_frame, message_frame, parse_frame, PresenceUpdate};
use crate::websocket_native::NativeWsClient;
use crate::ws_state::WsState;

pub struct ViewerPresenceChannel {
    event_id: String,
    username: String,
    client: NativeWsClient,
    forwarder: JoinHandle<()>,
}

impl ViewerPresenceChannel {
    /// Open the socket and announce `join-event` for `event_id`
    pub fn connect(
        url: &str,
        event_id: &str,
        username: &str,
        updates: UnboundedSender<PresenceUpdate>,
    ) -> Self {
        info!(event_id, username, "Joining presence room");
        let (client, mut rx) = NativeWsClient::connect(url, vec![join_frame(event_id, username)]);

        let forwarder = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                let Some(update) = parse_frame(&frame) else {
                    continue;
                };
                trace!(?update, "Presence update");
                if updates.send(update).is_err() {
                    // Session gone
                    break;
                }
            }
            debug!("Presence stream ended");
        });

        Self {
            event_id: event_id.to_string(),
            username: username.to_string(),
            client,
            forwarder,
        }
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn state(&self) -> WsState {
        self.client.state()
    }

    /// Fire-and-forget chat message. No acknowledgment and no retry.
    pub fn send(&self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        trace!(event_id = %self.event_id, len = text.len(), "Sending chat message");
        self.client.send(message_frame(&self.event_id, text))
    }

    /// Close the socket. Consumes the channel so it can only happen once.
    pub fn disconnect(self) {
        info!(event_id = %self.event_id, "Leaving presence room");
        // Drop does the rest
    }
}

impl Drop for ViewerPresenceChannel {
    fn drop(&mut self) {
        self.client.close();
        self.forwarder.abort();
    }
}
