//! Platform-agnostic core module - pure session state, no I/O

pub mod clock;
pub mod config;
pub mod negotiator;
pub mod playback;
pub mod presence;
pub mod selector;

pub use clock::{evaluate, ClockReading, Countdown, Schedule, SessionStatus};
pub use config::{ChatSection, ConfigStatus, EventConfig, StreamSection};
pub use negotiator::{
    broadcaster_id, viewer_id, Action, ControlMessage, DirectStreamState, MediaStream,
    Negotiator, NegotiatorState, PeerEvent, RETRY_DELAY,
};
pub use playback::{PlaybackAttempt, PlaybackDecision, PlaybackFailure};
pub use presence::{parse_frame, ChatMessage, PresenceState, PresenceUpdate, MESSAGE_CAPACITY};
pub use selector::{select, Presentation};
