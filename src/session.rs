//! Live event session - the composition root
//!
//! Loads the event config once, then runs the status clock, the presence
//! channel and the direct stream negotiator side by side. Every update is
//! folded into one [`ViewState`] published on a watch channel. All state is
//! mutated from the single session task.

use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::core::{
    evaluate, select, Countdown, DirectStreamState, EventConfig, PresenceState, PresenceUpdate,
    Presentation, SessionStatus,
};
use crate::error::SessionError;
use crate::identity::guest_username;
use crate::peer::PeerClientFactory;
use crate::presence::ViewerPresenceChannel;
use crate::settings::Settings;
use crate::signaling::SignalingPeerFactory;
use crate::source::{ConfigSource, HttpConfigSource};
use crate::stream::{DirectStreamNegotiator, StreamUpdate};
use crate::time::now_local;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Loading,
    /// Terminal until a config is applied; carries the reason
    NoEvent(String),
    Ready,
}

/// Everything the page renders from
#[derive(Clone, Debug, PartialEq)]
pub struct ViewState {
    pub phase: SessionPhase,
    pub config: Option<EventConfig>,
    pub status: Option<SessionStatus>,
    pub countdown: Option<Countdown>,
    pub presence: PresenceState,
    pub direct: DirectStreamState,
    pub presentation: Option<Presentation>,
    /// Latest non-fatal peer advisory
    pub warning: Option<String>,
    pub username: String,
}

impl ViewState {
    fn new(username: String, message_capacity: usize) -> Self {
        Self {
            phase: SessionPhase::Loading,
            config: None,
            status: None,
            countdown: None,
            presence: PresenceState::new(message_capacity),
            direct: DirectStreamState::default(),
            presentation: None,
            warning: None,
            username,
        }
    }

    fn refresh_presentation(&mut self) {
        self.presentation = match (&self.phase, &self.config, self.status) {
            (SessionPhase::Ready, Some(config), Some(status)) => Some(select(
                self.direct.stream.as_ref(),
                self.direct.has_ever_received,
                status.is_live(),
                config.video_url(),
                config.stream.poster.as_deref(),
            )),
            _ => None,
        };
    }
}

enum Command {
    Send(String),
    ApplyConfig(EventConfig),
    Shutdown(oneshot::Sender<()>),
}

pub struct LiveEventSession {
    commands: UnboundedSender<Command>,
    view: watch::Receiver<ViewState>,
    task: JoinHandle<()>,
}

impl LiveEventSession {
    /// Session against the HTTP config service and the signaling WebSocket
    pub fn connect(settings: Settings) -> Self {
        let source = Arc::new(HttpConfigSource::new(settings.config_url.clone()));
        let peers = Arc::new(SignalingPeerFactory::new(settings.signaling_url.clone()));
        Self::start(settings, source, peers)
    }

    pub fn start(
        settings: Settings,
        source: Arc<dyn ConfigSource>,
        peers: Arc<dyn PeerClientFactory>,
    ) -> Self {
        let username = settings.username.clone().unwrap_or_else(guest_username);
        let initial = ViewState::new(username, settings.message_capacity);
        let (view_tx, view_rx) = watch::channel(initial.clone());
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let core = SessionCore {
            settings,
            peers,
            view: initial,
            view_tx,
            mounted: None,
            presence_rx: None,
            stream_rx: None,
        };
        let task = tokio::spawn(core.run(source, cmd_rx));

        Self {
            commands: cmd_tx,
            view: view_rx,
            task,
        }
    }

    pub fn view(&self) -> watch::Receiver<ViewState> {
        self.view.clone()
    }

    pub fn snapshot(&self) -> ViewState {
        self.view.borrow().clone()
    }

    /// Post a chat line. A no-op when chat is disabled for the event.
    pub fn send_message(&self, text: impl Into<String>) -> Result<(), SessionError> {
        self.commands
            .send(Command::Send(text.into()))
            .map_err(|_| SessionError::Closed)
    }

    /// Replace the config. A different id re-creates every live subscription.
    pub fn apply_config(&self, config: EventConfig) -> Result<(), SessionError> {
        self.commands
            .send(Command::ApplyConfig(config))
            .map_err(|_| SessionError::Closed)
    }

    /// Disconnect the socket, stop the negotiator and end the session task
    pub async fn shutdown(mut self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.commands.send(Command::Shutdown(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
        let task = &mut self.task;
        let _ = task.await;
    }
}

impl Drop for LiveEventSession {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Live subscriptions for one event id
struct Mounted {
    event_id: String,
    presence: ViewerPresenceChannel,
    negotiator: DirectStreamNegotiator,
}

struct SessionCore {
    settings: Settings,
    peers: Arc<dyn PeerClientFactory>,
    view: ViewState,
    view_tx: watch::Sender<ViewState>,
    mounted: Option<Mounted>,
    presence_rx: Option<UnboundedReceiver<PresenceUpdate>>,
    stream_rx: Option<UnboundedReceiver<StreamUpdate>>,
}

impl SessionCore {
    async fn run(mut self, source: Arc<dyn ConfigSource>, mut commands: UnboundedReceiver<Command>) {
        if !self.initial_load(source.as_ref(), &mut commands).await {
            info!("Session ended while loading");
            return;
        }

        let mut tick = interval(self.settings.tick());
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let step = tokio::select! {
                cmd = commands.recv() => Step::Command(cmd),
                _ = tick.tick() => Step::Tick,
                update = recv_opt(&mut self.presence_rx) => Step::Presence(update),
                update = recv_opt(&mut self.stream_rx) => Step::Stream(update),
            };

            match step {
                Step::Tick => self.tick(),
                Step::Presence(Some(update)) => {
                    trace!(?update, "Presence");
                    self.view.presence.apply(update);
                }
                Step::Presence(None) => {
                    // Socket gone; counts stay frozen at the last value
                    debug!("Presence updates ended");
                    self.presence_rx = None;
                }
                Step::Stream(Some(StreamUpdate::Direct(direct))) => {
                    // has_ever_received never goes back to false
                    let ever = self.view.direct.has_ever_received || direct.has_ever_received;
                    self.view.direct = direct;
                    self.view.direct.has_ever_received = ever;
                }
                Step::Stream(Some(StreamUpdate::Warning(msg))) => {
                    self.view.warning = Some(msg);
                }
                Step::Stream(None) => self.stream_rx = None,
                Step::Command(Some(Command::Send(text))) => self.send(&text),
                Step::Command(Some(Command::ApplyConfig(config))) => self.load(config).await,
                Step::Command(Some(Command::Shutdown(ack))) => {
                    self.unmount().await;
                    let _ = ack.send(());
                    break;
                }
                Step::Command(None) => {
                    self.unmount().await;
                    break;
                }
            }
            self.publish();
        }

        info!("Session ended");
    }

    /// Fetch the config while still answering commands. Returns false when the
    /// session was shut down before a config arrived.
    async fn initial_load(
        &mut self,
        source: &dyn ConfigSource,
        commands: &mut UnboundedReceiver<Command>,
    ) -> bool {
        let fetch = source.fetch();
        tokio::pin!(fetch);

        loop {
            tokio::select! {
                result = &mut fetch => {
                    match result {
                        Ok(config) => self.load(config).await,
                        Err(e) => {
                            warn!(error = %e, "No event available");
                            self.view.phase = SessionPhase::NoEvent(e.to_string());
                            self.publish();
                        }
                    }
                    return true;
                }
                cmd = commands.recv() => match cmd {
                    Some(Command::Send(_)) => debug!("Config not loaded, dropping message"),
                    Some(Command::ApplyConfig(config)) => {
                        self.load(config).await;
                        return true;
                    }
                    Some(Command::Shutdown(ack)) => {
                        let _ = ack.send(());
                        return false;
                    }
                    None => return false,
                },
            }
        }
    }

    /// Install a config, re-keying subscriptions when the id changed
    async fn load(&mut self, config: EventConfig) {
        let same_event = self
            .mounted
            .as_ref()
            .is_some_and(|m| m.event_id == config.id);

        if !same_event {
            self.unmount().await;
            self.view.presence = PresenceState::new(self.settings.message_capacity);
            self.view.direct = DirectStreamState::default();
            self.view.warning = None;
            self.mount(&config);
        }

        if self.view.presence.pinned.is_none() || !same_event {
            self.view.presence.pinned = config.chat.pinned.clone();
        }
        self.view.config = Some(config);
        self.view.phase = SessionPhase::Ready;
        self.tick();
        self.publish();
    }

    fn mount(&mut self, config: &EventConfig) {
        info!(event_id = %config.id, "Mounting live event");

        let (presence_tx, presence_rx) = mpsc::unbounded_channel();
        let presence = ViewerPresenceChannel::connect(
            &self.settings.presence_url,
            &config.id,
            &self.view.username,
            presence_tx,
        );

        let (stream_tx, stream_rx) = mpsc::unbounded_channel();
        let negotiator = DirectStreamNegotiator::spawn(
            &config.id,
            self.peers.as_ref(),
            self.settings.retry_delay(),
            stream_tx,
        );

        self.mounted = Some(Mounted {
            event_id: config.id.clone(),
            presence,
            negotiator,
        });
        self.presence_rx = Some(presence_rx);
        self.stream_rx = Some(stream_rx);
    }

    async fn unmount(&mut self) {
        // Queued updates belong to the old event
        self.presence_rx = None;
        self.stream_rx = None;
        let Some(mounted) = self.mounted.take() else {
            return;
        };
        info!(event_id = %mounted.event_id, "Unmounting live event");
        mounted.presence.disconnect();
        mounted.negotiator.shutdown().await;
    }

    fn tick(&mut self) {
        let Some(config) = self.view.config.as_ref() else {
            return;
        };
        let reading = evaluate(config, now_local());
        if self.view.status != Some(reading.status) {
            info!(event_id = %config.id, status = %reading.status, "Event status");
        }
        self.view.status = Some(reading.status);
        self.view.countdown = reading.countdown;
    }

    fn send(&mut self, text: &str) {
        let chat_enabled = self.view.config.as_ref().is_some_and(|c| c.chat.enabled);
        if !chat_enabled {
            debug!("Chat disabled, dropping message");
            return;
        }
        match self.mounted.as_ref() {
            Some(m) => {
                m.presence.send(text);
            }
            None => debug!("No presence channel, dropping message"),
        }
    }

    fn publish(&mut self) {
        self.view.refresh_presentation();
        let view = &self.view;
        self.view_tx.send_if_modified(|current| {
            if *current == *view {
                false
            } else {
                *current = view.clone();
                true
            }
        });
    }
}

enum Step {
    Command(Option<Command>),
    Tick,
    Presence(Option<PresenceUpdate>),
    Stream(Option<StreamUpdate>),
}

async fn recv_opt<T>(rx: &mut Option<UnboundedReceiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ConfigStatus, ControlMessage, MediaStream, PeerEvent};
    use crate::error::{ConfigError, PeerError};
    use crate::peer::PeerClient;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;
    use tokio::time::timeout;

    struct StaticSource(Option<EventConfig>);

    #[async_trait]
    impl ConfigSource for StaticSource {
        async fn fetch(&self) -> Result<EventConfig, ConfigError> {
            self.0.clone().ok_or(ConfigError::Empty)
        }
    }

    /// Config service that never answers
    struct StalledSource;

    #[async_trait]
    impl ConfigSource for StalledSource {
        async fn fetch(&self) -> Result<EventConfig, ConfigError> {
            std::future::pending().await
        }
    }

    /// Broadcaster never online
    struct OfflinePeer {
        log: Arc<Mutex<Vec<String>>>,
        events: UnboundedSender<PeerEvent>,
    }

    #[async_trait]
    impl PeerClient for OfflinePeer {
        async fn register(&mut self, local_id: &str) -> Result<(), PeerError> {
            self.log.lock().push(format!("register:{local_id}"));
            let _ = self.events.send(PeerEvent::Open {
                local_id: local_id.to_string(),
            });
            Ok(())
        }
        async fn open_control(&mut self, _remote_id: &str) -> Result<(), PeerError> {
            Err(PeerError::PeerUnavailable)
        }
        async fn send_control(&mut self, _msg: ControlMessage) -> Result<(), PeerError> {
            Ok(())
        }
        async fn answer(&mut self, _call_id: &str, _local: MediaStream) -> Result<(), PeerError> {
            Ok(())
        }
        async fn close(&mut self) {
            self.log.lock().push("close".into());
        }
    }

    #[derive(Default)]
    struct OfflineFactory {
        log: Arc<Mutex<Vec<String>>>,
    }

    impl PeerClientFactory for OfflineFactory {
        fn create(&self) -> (Box<dyn PeerClient>, UnboundedReceiver<PeerEvent>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                Box::new(OfflinePeer {
                    log: self.log.clone(),
                    events: tx,
                }),
                rx,
            )
        }
    }

    fn settings() -> Settings {
        Settings {
            presence_url: "ws://127.0.0.1:9/".into(),
            username: Some("Tester".into()),
            ..Settings::default()
        }
    }

    fn live_config(id: &str, url: &str) -> EventConfig {
        let mut config = EventConfig::new(id);
        config.status = ConfigStatus::Live;
        config.stream.url = Some(url.into());
        config
    }

    async fn wait_for(
        session: &LiveEventSession,
        cond: impl FnMut(&ViewState) -> bool,
    ) -> ViewState {
        let mut rx = session.view();
        let state = timeout(Duration::from_secs(5), rx.wait_for(cond))
            .await
            .expect("timed out waiting for view state")
            .expect("session dropped");
        state.clone()
    }

    #[tokio::test]
    async fn test_no_event_when_config_missing() {
        let session = LiveEventSession::start(
            settings(),
            Arc::new(StaticSource(None)),
            Arc::new(OfflineFactory::default()),
        );
        let state = wait_for(&session, |v| matches!(v.phase, SessionPhase::NoEvent(_))).await;
        assert!(state.presentation.is_none());
        assert!(state.status.is_none());
        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_live_event_shows_connecting_until_stream() {
        let session = LiveEventSession::start(
            settings(),
            Arc::new(StaticSource(Some(live_config("e1", "https://x.daily.co/room")))),
            Arc::new(OfflineFactory::default()),
        );
        let state = wait_for(&session, |v| v.phase == SessionPhase::Ready).await;
        assert_eq!(state.status, Some(SessionStatus::Live));
        assert_eq!(state.presentation, Some(Presentation::Connecting));
        assert_eq!(state.username, "Tester");
        // peer-unavailable is retried, never surfaced
        assert!(state.warning.is_none());
        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_ended_event_falls_back_to_embedded_room() {
        let mut config = live_config("e1", "https://x.daily.co/room");
        config.status = ConfigStatus::Ended;
        let session = LiveEventSession::start(
            settings(),
            Arc::new(StaticSource(Some(config))),
            Arc::new(OfflineFactory::default()),
        );
        let state = wait_for(&session, |v| v.phase == SessionPhase::Ready).await;
        assert_eq!(state.status, Some(SessionStatus::Ended));
        assert_eq!(
            state.presentation,
            Some(Presentation::EmbeddedRoom {
                url: "https://x.daily.co/room".into()
            })
        );
        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_rekey_recreates_subscriptions() {
        let factory = Arc::new(OfflineFactory::default());
        let log = factory.log.clone();
        let session = LiveEventSession::start(
            settings(),
            Arc::new(StaticSource(Some(live_config("e1", "https://cdn/v.mp4")))),
            factory,
        );
        wait_for(&session, |v| v.phase == SessionPhase::Ready).await;

        // Same id: config replaced, nothing re-created
        let mut same = live_config("e1", "https://cdn/v.mp4");
        same.title = Some("Renamed".into());
        session.apply_config(same).unwrap();
        wait_for(&session, |v| {
            v.config.as_ref().and_then(|c| c.title.as_deref()) == Some("Renamed")
        })
        .await;

        session.apply_config(live_config("e2", "https://cdn/v.mp4")).unwrap();
        wait_for(&session, |v| v.config.as_ref().map(|c| c.id.as_str()) == Some("e2")).await;

        let entries = log.lock().clone();
        let registers: Vec<_> = entries.iter().filter(|e| e.starts_with("register:")).collect();
        assert_eq!(registers.len(), 2);
        assert!(registers[0].starts_with("register:viewer-e1-"));
        assert!(registers[1].starts_with("register:viewer-e2-"));
        assert_eq!(entries.iter().filter(|e| *e == "close").count(), 1);

        session.shutdown().await;
        assert_eq!(log.lock().iter().filter(|e| *e == "close").count(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_while_config_fetch_stalls() {
        let session = LiveEventSession::start(
            settings(),
            Arc::new(StalledSource),
            Arc::new(OfflineFactory::default()),
        );
        assert_eq!(session.snapshot().phase, SessionPhase::Loading);
        timeout(Duration::from_secs(5), session.shutdown())
            .await
            .expect("shutdown hung on config fetch");
    }

    #[tokio::test]
    async fn test_applied_config_wins_over_stalled_fetch() {
        let session = LiveEventSession::start(
            settings(),
            Arc::new(StalledSource),
            Arc::new(OfflineFactory::default()),
        );
        session.apply_config(live_config("e3", "https://cdn/v.mp4")).unwrap();
        let state = wait_for(&session, |v| v.phase == SessionPhase::Ready).await;
        assert_eq!(state.config.map(|c| c.id), Some("e3".to_string()));
        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_commands_after_shutdown_fail() {
        let session = LiveEventSession::start(
            settings(),
            Arc::new(StaticSource(Some(live_config("e1", "https://cdn/v.mp4")))),
            Arc::new(OfflineFactory::default()),
        );
        wait_for(&session, |v| v.phase == SessionPhase::Ready).await;
        let commands = session.commands.clone();
        session.shutdown().await;
        assert!(commands.send(Command::Send("late".into())).is_err());
    }

    #[test]
    fn test_presentation_requires_ready_phase() {
        let mut view = ViewState::new("u".into(), 50);
        view.config = Some(live_config("e1", "https://cdn/v.mp4"));
        view.status = Some(SessionStatus::Live);
        view.refresh_presentation();
        assert!(view.presentation.is_none());

        view.phase = SessionPhase::Ready;
        view.refresh_presentation();
        assert_eq!(view.presentation, Some(Presentation::Connecting));

        view.direct.set_stream(MediaStream {
            id: "s".into(),
            video_tracks: 1,
            audio_tracks: 0,
        });
        view.refresh_presentation();
        assert_eq!(
            view.presentation,
            Some(Presentation::PeerVideo {
                stream_id: "s".into()
            })
        );

        view.direct.clear_stream();
        view.refresh_presentation();
        assert_eq!(
            view.presentation,
            Some(Presentation::GenericPlayer {
                url: Some("https://cdn/v.mp4".into()),
                poster: None
            })
        );
    }
}
