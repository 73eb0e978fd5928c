//! Direct stream negotiation state machine
//!
//! Pure state: peer events go in, [`Action`]s come out. The async driver in
//! `stream.rs` owns the peer client and the retry timer and executes the actions.

use std::time::Duration;
use tracing::{debug, info, trace, warn};

use crate::error::PeerError;

/// Fixed delay between reconnection attempts
pub const RETRY_DELAY: Duration = Duration::from_secs(6);

/// Deterministic identity of the event's broadcaster
pub fn broadcaster_id(event_id: &str) -> String {
    format!("event-{event_id}-admin")
}

/// Viewer identity; `suffix` is random so concurrent viewers never collide
pub fn viewer_id(event_id: &str, suffix: &str) -> String {
    format!("viewer-{event_id}-{suffix}")
}

/// Media stream descriptor as delivered by the peer layer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaStream {
    pub id: String,
    pub video_tracks: usize,
    pub audio_tracks: usize,
}

impl MediaStream {
    /// Empty stream used to answer the broadcaster's call
    pub fn placeholder() -> Self {
        Self {
            id: "placeholder".to_string(),
            video_tracks: 0,
            audio_tracks: 0,
        }
    }

    pub fn has_video(&self) -> bool {
        self.video_tracks > 0
    }
}

/// Stream as seen by the presentation layer
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DirectStreamState {
    pub stream: Option<MediaStream>,
    /// Monotonic: once set it stays set for the session
    pub has_ever_received: bool,
}

impl DirectStreamState {
    pub fn set_stream(&mut self, stream: MediaStream) {
        self.stream = Some(stream);
        self.has_ever_received = true;
    }

    pub fn clear_stream(&mut self) {
        self.stream = None;
    }
}

/// Messages on the control channel
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlMessage {
    RequestStream { viewer_id: String },
    Ack,
    NotReady,
}

/// Events raised by the peer client
#[derive(Clone, Debug, PartialEq)]
pub enum PeerEvent {
    /// Signaling service assigned our local identity
    Open { local_id: String },
    ControlOpen,
    Control(ControlMessage),
    ControlClosed,
    /// Broadcaster is calling us
    Call { call_id: String },
    Stream { call_id: String, stream: MediaStream },
    StreamEnded { call_id: String },
    /// A peer left the signaling service
    RemoteLeft { peer_id: String },
    Error(PeerError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NegotiatorState {
    Idle,
    Registering,
    Requesting,
    WaitingForMedia,
    Connected,
    Retrying,
    Terminated,
}

/// Side effects requested by the machine
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    Register { local_id: String },
    OpenControl { remote_id: String },
    SendControl(ControlMessage),
    Answer { call_id: String, placeholder: MediaStream },
    ScheduleRetry(Duration),
    CancelRetry,
    StreamChanged(DirectStreamState),
    Warn(String),
    Close,
}

pub struct Negotiator {
    state: NegotiatorState,
    local_id: String,
    remote_id: String,
    retry_delay: Duration,
    retry_pending: bool,
    direct: DirectStreamState,
    active_call: Option<String>,
}

impl Negotiator {
    pub fn new(event_id: &str, viewer_suffix: &str) -> Self {
        Self {
            state: NegotiatorState::Idle,
            local_id: viewer_id(event_id, viewer_suffix),
            remote_id: broadcaster_id(event_id),
            retry_delay: RETRY_DELAY,
            retry_pending: false,
            direct: DirectStreamState::default(),
            active_call: None,
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn state(&self) -> NegotiatorState {
        self.state
    }

    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    pub fn remote_id(&self) -> &str {
        &self.remote_id
    }

    pub fn direct(&self) -> &DirectStreamState {
        &self.direct
    }

    pub fn retry_pending(&self) -> bool {
        self.retry_pending
    }

    /// Idle -> Registering
    pub fn start(&mut self) -> Vec<Action> {
        if self.state != NegotiatorState::Idle {
            return Vec::new();
        }
        info!(local_id = %self.local_id, remote_id = %self.remote_id, "Registering viewer peer");
        self.state = NegotiatorState::Registering;
        vec![Action::Register {
            local_id: self.local_id.clone(),
        }]
    }

    pub fn handle(&mut self, event: PeerEvent) -> Vec<Action> {
        use NegotiatorState::*;

        if self.state == Terminated {
            trace!(?event, "Negotiator terminated, dropping event");
            return Vec::new();
        }

        match event {
            PeerEvent::Open { local_id } => {
                if self.state != Registering {
                    return Vec::new();
                }
                debug!(local_id = %local_id, "Local peer identity assigned");
                self.local_id = local_id;
                self.request()
            }
            PeerEvent::ControlOpen => {
                if self.state != Requesting {
                    return Vec::new();
                }
                debug!(remote_id = %self.remote_id, "Control channel open, requesting stream");
                self.state = WaitingForMedia;
                vec![Action::SendControl(ControlMessage::RequestStream {
                    viewer_id: self.local_id.clone(),
                })]
            }
            PeerEvent::Control(ControlMessage::NotReady) => {
                debug!("Broadcaster not ready");
                self.retry_if_negotiating()
            }
            PeerEvent::Control(msg) => {
                trace!(?msg, "Control message");
                Vec::new()
            }
            PeerEvent::ControlClosed => {
                debug!("Control channel closed");
                if self.state == Connected {
                    return self.drop_stream();
                }
                self.retry_if_negotiating()
            }
            PeerEvent::RemoteLeft { peer_id } => {
                if !peer_id.is_empty() && peer_id != self.remote_id {
                    return Vec::new();
                }
                info!(remote_id = %self.remote_id, "Broadcaster left");
                if self.state == Connected {
                    return self.drop_stream();
                }
                self.retry_if_negotiating()
            }
            PeerEvent::Call { call_id } => {
                // The broadcaster only sends media once we answer
                debug!(call_id = %call_id, "Answering broadcaster call with placeholder stream");
                self.active_call = Some(call_id.clone());
                vec![Action::Answer {
                    call_id,
                    placeholder: MediaStream::placeholder(),
                }]
            }
            PeerEvent::Stream { call_id, stream } => {
                if !stream.has_video() {
                    debug!(call_id = %call_id, stream_id = %stream.id, "Stream without video, ignoring");
                    return Vec::new();
                }
                info!(call_id = %call_id, stream_id = %stream.id, "Direct stream received");
                self.state = Connected;
                self.active_call = Some(call_id);
                let mut actions = Vec::new();
                if self.retry_pending {
                    self.retry_pending = false;
                    actions.push(Action::CancelRetry);
                }
                self.direct.set_stream(stream);
                actions.push(Action::StreamChanged(self.direct.clone()));
                actions
            }
            PeerEvent::StreamEnded { call_id } => {
                if self.active_call.as_deref() != Some(call_id.as_str()) {
                    return Vec::new();
                }
                info!(call_id = %call_id, "Direct stream ended");
                self.drop_stream()
            }
            PeerEvent::Error(e) => self.handle_error(e),
        }
    }

    fn handle_error(&mut self, e: PeerError) -> Vec<Action> {
        if e.is_retryable() {
            debug!(kind = e.kind(), "Retryable peer error");
            return self.retry_if_negotiating();
        }
        if matches!(e, PeerError::Disconnected) {
            debug!("Peer disconnected from signaling, ignoring");
            return Vec::new();
        }
        warn!(kind = e.kind(), error = %e, "Peer error");
        vec![Action::Warn(e.to_string())]
    }

    /// Retry delay elapsed: Retrying -> Requesting
    pub fn retry_elapsed(&mut self) -> Vec<Action> {
        if self.state == NegotiatorState::Terminated || !self.retry_pending {
            return Vec::new();
        }
        self.retry_pending = false;
        debug!(remote_id = %self.remote_id, "Retrying stream request");
        self.request()
    }

    /// Tear down. Cancels a pending retry and closes the peer client.
    pub fn shutdown(&mut self) -> Vec<Action> {
        if self.state == NegotiatorState::Terminated {
            return Vec::new();
        }
        info!(local_id = %self.local_id, "Shutting down negotiator");
        self.state = NegotiatorState::Terminated;
        let mut actions = Vec::new();
        if self.retry_pending {
            self.retry_pending = false;
            actions.push(Action::CancelRetry);
        }
        actions.push(Action::Close);
        actions
    }

    fn request(&mut self) -> Vec<Action> {
        self.state = NegotiatorState::Requesting;
        vec![Action::OpenControl {
            remote_id: self.remote_id.clone(),
        }]
    }

    /// Forget the current stream and go back to requesting after the delay
    fn drop_stream(&mut self) -> Vec<Action> {
        self.active_call = None;
        let mut actions = Vec::new();
        if self.direct.stream.is_some() {
            self.direct.clear_stream();
            actions.push(Action::StreamChanged(self.direct.clone()));
        }
        actions.extend(self.schedule_retry());
        actions
    }

    fn retry_if_negotiating(&mut self) -> Vec<Action> {
        use NegotiatorState::*;
        match self.state {
            Requesting | WaitingForMedia | Retrying => self.schedule_retry(),
            _ => Vec::new(),
        }
    }

    /// At most one retry timer in flight
    fn schedule_retry(&mut self) -> Vec<Action> {
        self.state = NegotiatorState::Retrying;
        if self.retry_pending {
            trace!("Retry already scheduled");
            return Vec::new();
        }
        self.retry_pending = true;
        debug!(delay_ms = self.retry_delay.as_millis() as u64, "Scheduling retry");
        vec![Action::ScheduleRetry(self.retry_delay)]
    }
}
