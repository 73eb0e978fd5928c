//! Peer client seam
//!
//! The negotiator owns exactly one [`PeerClient`] for its lifetime. Events flow
//! back on the receiver handed out by the factory, so command calls and event
//! delivery never contend for the same borrow.

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::core::{ControlMessage, MediaStream, PeerEvent};
use crate::error::PeerError;

#[async_trait]
pub trait PeerClient: Send {
    /// Register `local_id` with the signaling service. Completion is reported
    /// as [`PeerEvent::Open`].
    async fn register(&mut self, local_id: &str) -> Result<(), PeerError>;

    /// Open the control channel to `remote_id`, replacing any previous one.
    /// Reported as [`PeerEvent::ControlOpen`] or an error event.
    async fn open_control(&mut self, remote_id: &str) -> Result<(), PeerError>;

    async fn send_control(&mut self, msg: ControlMessage) -> Result<(), PeerError>;

    /// Accept an incoming call, offering `local` as our side of the media.
    async fn answer(&mut self, call_id: &str, local: MediaStream) -> Result<(), PeerError>;

    /// Close every connection and the signaling session
    async fn close(&mut self);
}

/// Creates one peer client per negotiation, with its event stream
pub trait PeerClientFactory: Send + Sync {
    fn create(&self) -> (Box<dyn PeerClient>, UnboundedReceiver<PeerEvent>);
}
