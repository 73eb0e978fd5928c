//! Peer client over the signaling WebSocket
//!
//! The viewer registers by connecting with `?id=<viewerId>`. Control-channel
//! messages and call setup are relayed by the signaling service between the
//! viewer and the broadcaster identity. Frames are JSON:
//! `{"type": <TYPE>, "src"?: <peer>, "dst"?: <peer>, "payload"?: {...}}`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::core::{ControlMessage, MediaStream, PeerEvent};
use crate::error::PeerError;
use crate::peer::{PeerClient, PeerClientFactory};
use crate::websocket_native::NativeWsClient;

#[derive(Debug, Deserialize)]
struct SignalFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    src: Option<String>,
    #[serde(default)]
    payload: Value,
}

/// Decode one signaling frame into a peer event
pub fn parse_signal(frame: &str, local_id: &str) -> Option<PeerEvent> {
    let frame: SignalFrame = serde_json::from_str(frame)
        .map_err(|e| {
            warn!(error = %e, "Failed to parse signaling frame");
        })
        .ok()?;
    let payload = &frame.payload;
    let text = |key: &str| payload[key].as_str().map(str::to_string);

    let event = match frame.kind.as_str() {
        "OPEN" => PeerEvent::Open {
            local_id: local_id.to_string(),
        },
        "ID-TAKEN" => PeerEvent::Error(PeerError::Other {
            kind: "unavailable-id".into(),
            message: format!("id {local_id} is taken"),
        }),
        "ERROR" => {
            let msg = text("msg").unwrap_or_default();
            match text("type") {
                Some(kind) => PeerEvent::Error(PeerError::from_kind(&kind, msg)),
                None => PeerEvent::Error(PeerError::Signaling(msg)),
            }
        }
        // Destination is not connected to the signaling service
        "EXPIRE" => PeerEvent::Error(PeerError::PeerUnavailable),
        "CONTROL" => match payload["type"].as_str()? {
            "open" => PeerEvent::ControlOpen,
            "ack" => PeerEvent::Control(ControlMessage::Ack),
            "not-ready" => PeerEvent::Control(ControlMessage::NotReady),
            "close" => PeerEvent::ControlClosed,
            "error" => PeerEvent::Error(PeerError::Channel(text("msg").unwrap_or_default())),
            other => {
                trace!(kind = other, "Ignoring control message");
                return None;
            }
        },
        "CALL" => PeerEvent::Call {
            call_id: text("callId")?,
        },
        "STREAM" => PeerEvent::Stream {
            call_id: text("callId")?,
            stream: MediaStream {
                id: text("streamId")?,
                video_tracks: payload["videoTracks"].as_u64().unwrap_or(0) as usize,
                audio_tracks: payload["audioTracks"].as_u64().unwrap_or(0) as usize,
            },
        },
        "HANGUP" => PeerEvent::StreamEnded {
            call_id: text("callId")?,
        },
        "LEAVE" => {
            debug!(src = ?frame.src, "Remote peer left");
            PeerEvent::RemoteLeft {
                peer_id: frame.src.unwrap_or_default(),
            }
        }
        "HEARTBEAT" => return None,
        other => {
            trace!(kind = other, "Ignoring signaling frame");
            return None;
        }
    };
    Some(event)
}

/// How long `close` waits for `LEAVE` to reach the service
const CLOSE_GRACE: Duration = Duration::from_secs(1);

fn register_url(base: &str, local_id: &str) -> String {
    let sep = if base.contains('?') { '&' } else { '?' };
    format!("{base}{sep}id={local_id}")
}

pub struct SignalingPeerClient {
    url: String,
    events: UnboundedSender<PeerEvent>,
    socket: Option<NativeWsClient>,
    forwarder: Option<JoinHandle<()>>,
    remote_id: Option<String>,
}

impl SignalingPeerClient {
    pub fn new(url: &str) -> (Self, UnboundedReceiver<PeerEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                url: url.to_string(),
                events,
                socket: None,
                forwarder: None,
                remote_id: None,
            },
            rx,
        )
    }

    fn send_frame(&self, frame: Value) -> Result<(), PeerError> {
        let socket = self.socket.as_ref().ok_or(PeerError::Disconnected)?;
        if socket.send(frame.to_string()) {
            Ok(())
        } else {
            Err(PeerError::Disconnected)
        }
    }

    fn remote(&self) -> Result<&str, PeerError> {
        self.remote_id
            .as_deref()
            .ok_or_else(|| PeerError::Channel("no control channel".into()))
    }
}

#[async_trait]
impl PeerClient for SignalingPeerClient {
    async fn register(&mut self, local_id: &str) -> Result<(), PeerError> {
        self.close().await;

        let url = register_url(&self.url, local_id);
        info!(local_id, "Registering with signaling service");
        let (socket, mut rx) = NativeWsClient::connect(&url, vec![]);

        let events = self.events.clone();
        let local_id = local_id.to_string();
        let forwarder = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                if let Some(event) = parse_signal(&frame, &local_id) {
                    if events.send(event).is_err() {
                        return;
                    }
                }
            }
            let _ = events.send(PeerEvent::Error(PeerError::Disconnected));
        });

        self.socket = Some(socket);
        self.forwarder = Some(forwarder);
        Ok(())
    }

    async fn open_control(&mut self, remote_id: &str) -> Result<(), PeerError> {
        debug!(remote_id, "Opening control channel");
        self.remote_id = Some(remote_id.to_string());
        self.send_frame(json!({
            "type": "CONTROL",
            "dst": remote_id,
            "payload": { "type": "open" },
        }))
    }

    async fn send_control(&mut self, msg: ControlMessage) -> Result<(), PeerError> {
        let payload = match msg {
            ControlMessage::RequestStream { viewer_id } => {
                json!({ "type": "request-stream", "viewerId": viewer_id })
            }
            ControlMessage::Ack => json!({ "type": "ack" }),
            ControlMessage::NotReady => json!({ "type": "not-ready" }),
        };
        let dst = self.remote()?.to_string();
        self.send_frame(json!({ "type": "CONTROL", "dst": dst, "payload": payload }))
    }

    async fn answer(&mut self, call_id: &str, local: MediaStream) -> Result<(), PeerError> {
        let dst = self.remote()?.to_string();
        self.send_frame(json!({
            "type": "ANSWER",
            "dst": dst,
            "payload": {
                "callId": call_id,
                "streamId": local.id,
                "videoTracks": local.video_tracks,
                "audioTracks": local.audio_tracks,
            },
        }))
    }

    async fn close(&mut self) {
        if let Some(remote) = self.remote_id.take() {
            let _ = self.send_frame(json!({ "type": "LEAVE", "dst": remote }));
        }
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        if let Some(socket) = self.socket.take() {
            socket.finish(CLOSE_GRACE).await;
        }
    }
}

impl Drop for SignalingPeerClient {
    fn drop(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }
}

/// Builds [`SignalingPeerClient`]s against one signaling endpoint
pub struct SignalingPeerFactory {
    url: String,
}

impl SignalingPeerFactory {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl PeerClientFactory for SignalingPeerFactory {
    fn create(&self) -> (Box<dyn PeerClient>, UnboundedReceiver<PeerEvent>) {
        let (client, rx) = SignalingPeerClient::new(&self.url);
        (Box::new(client), rx)
    }
}
