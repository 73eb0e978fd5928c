//! Shared socket connection state
//!
//! Used by both the presence channel and the signaling client.

/// Socket connection state
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WsState {
    Connecting,
    Connected,
    Disconnected,
    Error(String),
}

impl WsState {
    pub fn is_connected(&self) -> bool {
        matches!(self, WsState::Connected)
    }

    /// Terminal states: the pump task has exited and will not reconnect.
    pub fn is_closed(&self) -> bool {
        matches!(self, WsState::Disconnected | WsState::Error(_))
    }
}
