//! Live event viewer - session controller for webcast events
//!
//! Loads an event config and keeps one merged view of:
//! - Status clock: UPCOMING / LIVE / ENDED plus countdown
//! - Presence: live viewer count and chat over a socket
//! - Direct stream: peer-to-peer link to the event broadcaster, with retry
//! - Presentation: which player is authoritative right now

pub mod core;
pub mod error;
pub mod identity;
pub mod peer;
pub mod presence;
pub mod session;
pub mod settings;
pub mod signaling;
pub mod source;
pub mod stream;
pub mod time;
pub mod websocket_native;
pub mod ws_state;

pub use crate::core::{EventConfig, Presentation, SessionStatus};
pub use error::{ConfigError, PeerError, SessionError};
pub use session::{LiveEventSession, SessionPhase, ViewState};
pub use settings::Settings;
