//! Native WebSocket client shared by the presence channel and the signaling client
//!
//! Uses tokio-tungstenite in a background task, with channel-based message passing
//! in both directions.

use crate::ws_state::WsState;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// Native WebSocket client that runs in a background task
pub struct NativeWsClient {
    /// Sender for outgoing text frames; taken by [`NativeWsClient::finish`]
    tx: Option<UnboundedSender<String>>,
    /// Shared connection state
    pub state: Arc<Mutex<WsState>>,
    task: JoinHandle<()>,
}

impl NativeWsClient {
    /// Connect to a WebSocket endpoint
    ///
    /// Spawns a background task on the current tokio runtime. `greeting` frames are
    /// written right after the handshake, before anything queued with [`send`].
    /// Incoming text frames are delivered through the returned receiver, which is
    /// closed when the socket ends.
    ///
    /// [`send`]: NativeWsClient::send
    pub fn connect(url: &str, greeting: Vec<String>) -> (Self, UnboundedReceiver<String>) {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let state = Arc::new(Mutex::new(WsState::Connecting));

        let url = url.to_string();
        let state_clone = state.clone();
        let task = tokio::spawn(async move {
            Self::run_websocket(&url, greeting, in_tx, out_rx, state_clone).await;
        });

        (
            Self {
                tx: Some(out_tx),
                state,
                task,
            },
            in_rx,
        )
    }

    /// Queue a text frame. Fire-and-forget: returns false once the socket task is gone.
    pub fn send(&self, text: String) -> bool {
        self.tx.as_ref().is_some_and(|tx| tx.send(text).is_ok())
    }

    pub fn state(&self) -> WsState {
        self.state.lock().clone()
    }

    /// Stop the socket task. Safe to call more than once.
    pub fn close(&self) {
        if !self.task.is_finished() {
            debug!("Closing WebSocket task");
            self.task.abort();
        }
        let mut state = self.state.lock();
        if !state.is_closed() {
            *state = WsState::Disconnected;
        }
    }

    /// Flush queued frames, send a Close frame and wait up to `grace` for the
    /// socket task to exit. Aborts it if the socket is still stuck after that.
    pub async fn finish(mut self, grace: Duration) {
        // Closing the outgoing queue tells the task to drain and say goodbye
        self.tx = None;
        match tokio::time::timeout(grace, &mut self.task).await {
            Ok(_) => debug!("WebSocket task finished"),
            Err(_) => {
                debug!(grace_ms = grace.as_millis() as u64, "WebSocket close timed out");
                self.task.abort();
            }
        }
        let mut state = self.state.lock();
        if !state.is_closed() {
            *state = WsState::Disconnected;
        }
    }

    async fn run_websocket(
        url: &str,
        greeting: Vec<String>,
        tx: UnboundedSender<String>,
        mut outgoing: UnboundedReceiver<String>,
        state: Arc<Mutex<WsState>>,
    ) {
        use futures_util::{SinkExt, StreamExt};
        use tokio_tungstenite::{connect_async, tungstenite::Message};

        info!(url, "Connecting to WebSocket");

        let ws_stream = match connect_async(url).await {
            Ok((stream, _)) => {
                info!(url, "WebSocket connected");
                *state.lock() = WsState::Connected;
                stream
            }
            Err(e) => {
                error!(url, error = %e, "Failed to connect");
                *state.lock() = WsState::Error(e.to_string());
                return;
            }
        };

        let (mut write, mut read) = ws_stream.split();

        for frame in greeting {
            trace!(frame = %frame, "Sending greeting frame");
            if let Err(e) = write.send(Message::Text(frame.into())).await {
                error!(error = %e, "Failed to send greeting frame");
                *state.lock() = WsState::Error(e.to_string());
                return;
            }
        }

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if tx.send(text.to_string()).is_err() {
                                // Receiver dropped, exit
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) => {
                            warn!(url, "WebSocket closed by server");
                            break;
                        }
                        Some(Err(e)) => {
                            error!(url, error = %e, "WebSocket error");
                            *state.lock() = WsState::Error(e.to_string());
                            return;
                        }
                        None => break,
                        _ => {}
                    }
                }
                frame = outgoing.recv() => {
                    let Some(frame) = frame else {
                        // Client handle finished or dropped
                        debug!(url, "Closing WebSocket");
                        if let Err(e) = write.send(Message::Close(None)).await {
                            trace!(error = %e, "Failed to send close frame");
                        }
                        break;
                    };
                    trace!(len = frame.len(), "Sending frame");
                    if let Err(e) = write.send(Message::Text(frame.into())).await {
                        // Lost frames on a broken socket are accepted
                        warn!(error = %e, "Failed to send frame");
                    }
                }
            }
        }

        warn!(url, "WebSocket stream ended");
        *state.lock() = WsState::Disconnected;
    }
}

impl Drop for NativeWsClient {
    fn drop(&mut self) {
        self.task.abort();
    }
}
