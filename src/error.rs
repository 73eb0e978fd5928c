//! Error types for the live event session

use thiserror::Error;

/// Failure to obtain the event configuration. Fatal to the page.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("config service returned status {0}")]
    Status(u16),
    #[error("no event scheduled")]
    Empty,
    #[error("invalid config document: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Errors raised by the peer layer
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PeerError {
    /// Broadcaster is not connected to the signaling service
    #[error("broadcaster is not online")]
    PeerUnavailable,
    #[error("disconnected from signaling service")]
    Disconnected,
    #[error("broadcaster is not ready")]
    NotReady,
    #[error("control channel error: {0}")]
    Channel(String),
    #[error("signaling error: {0}")]
    Signaling(String),
    #[error("{kind}: {message}")]
    Other { kind: String, message: String },
}

impl PeerError {
    /// Wire tag, as reported by the signaling service
    pub fn kind(&self) -> &str {
        match self {
            PeerError::PeerUnavailable => "peer-unavailable",
            PeerError::Disconnected => "disconnected",
            PeerError::NotReady => "not-ready",
            PeerError::Channel(_) => "channel",
            PeerError::Signaling(_) => "server-error",
            PeerError::Other { kind, .. } => kind,
        }
    }

    /// Map a signaling error tag to a typed error
    pub fn from_kind(kind: &str, message: impl Into<String>) -> Self {
        match kind {
            "peer-unavailable" => PeerError::PeerUnavailable,
            "disconnected" => PeerError::Disconnected,
            "not-ready" => PeerError::NotReady,
            "channel" => PeerError::Channel(message.into()),
            "server-error" | "socket-error" | "network" => PeerError::Signaling(message.into()),
            other => PeerError::Other {
                kind: other.to_string(),
                message: message.into(),
            },
        }
    }

    /// Recovered by the retry loop and never surfaced
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PeerError::PeerUnavailable | PeerError::NotReady | PeerError::Channel(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session is closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip_for_known_tags() {
        for kind in ["peer-unavailable", "disconnected", "not-ready"] {
            assert_eq!(PeerError::from_kind(kind, "").kind(), kind);
        }
    }

    #[test]
    fn test_retry_classification() {
        assert!(PeerError::PeerUnavailable.is_retryable());
        assert!(PeerError::NotReady.is_retryable());
        assert!(PeerError::Channel("reset".into()).is_retryable());
        assert!(!PeerError::Disconnected.is_retryable());
        assert!(!PeerError::Signaling("boom".into()).is_retryable());
        assert!(!PeerError::from_kind("invalid-id", "bad").is_retryable());
    }

    #[test]
    fn test_unknown_kind_keeps_tag() {
        let e = PeerError::from_kind("ssl-unavailable", "no tls");
        assert_eq!(e.kind(), "ssl-unavailable");
        assert_eq!(e.to_string(), "ssl-unavailable: no tls");
    }
}
