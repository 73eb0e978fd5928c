//! Runtime settings
//!
//! Defaults suit a local development stack; every field can be overridden
//! from the environment.

use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

use crate::core::{MESSAGE_CAPACITY, RETRY_DELAY};

pub const DEFAULT_CONFIG_URL: &str = "http://127.0.0.1:8080/api/live-event";
pub const DEFAULT_PRESENCE_URL: &str = "ws://127.0.0.1:8080/live";
pub const DEFAULT_SIGNALING_URL: &str = "ws://127.0.0.1:9000/peerjs";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Config service endpoint (GET, JSON)
    pub config_url: String,
    /// Presence/chat socket
    pub presence_url: String,
    /// Signaling socket for peer discovery
    pub signaling_url: String,
    /// Chat display name; a guest name is generated when absent
    pub username: Option<String>,
    pub retry_delay_ms: u64,
    pub tick_ms: u64,
    pub message_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_url: DEFAULT_CONFIG_URL.to_string(),
            presence_url: DEFAULT_PRESENCE_URL.to_string(),
            signaling_url: DEFAULT_SIGNALING_URL.to_string(),
            username: None,
            retry_delay_ms: RETRY_DELAY.as_millis() as u64,
            tick_ms: 1000,
            message_capacity: MESSAGE_CAPACITY,
        }
    }
}

impl Settings {
    /// Defaults overlaid with `LIVE_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut s = Self::default();
        if let Some(v) = lookup("LIVE_CONFIG_URL") {
            s.config_url = v;
        }
        if let Some(v) = lookup("LIVE_PRESENCE_WS") {
            s.presence_url = v;
        }
        if let Some(v) = lookup("LIVE_SIGNALING_WS") {
            s.signaling_url = v;
        }
        if let Some(v) = lookup("LIVE_USERNAME").filter(|v| !v.trim().is_empty()) {
            s.username = Some(v);
        }
        if let Some(v) = lookup("LIVE_RETRY_DELAY_MS") {
            match v.parse() {
                Ok(ms) => s.retry_delay_ms = ms,
                Err(e) => warn!(value = %v, error = %e, "Ignoring invalid LIVE_RETRY_DELAY_MS"),
            }
        }
        s
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.retry_delay(), Duration::from_secs(6));
        assert_eq!(s.tick(), Duration::from_secs(1));
        assert_eq!(s.message_capacity, 50);
        assert!(s.username.is_none());
    }

    #[test]
    fn test_env_overlay() {
        let env: HashMap<&str, &str> = [
            ("LIVE_CONFIG_URL", "https://example.org/api/live"),
            ("LIVE_USERNAME", "Ana"),
            ("LIVE_RETRY_DELAY_MS", "250"),
        ]
        .into_iter()
        .collect();
        let s = Settings::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(s.config_url, "https://example.org/api/live");
        assert_eq!(s.username.as_deref(), Some("Ana"));
        assert_eq!(s.retry_delay(), Duration::from_millis(250));
        assert_eq!(s.presence_url, DEFAULT_PRESENCE_URL);
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let s = Settings::from_lookup(|k| match k {
            "LIVE_RETRY_DELAY_MS" => Some("soon".into()),
            "LIVE_USERNAME" => Some("  ".into()),
            _ => None,
        });
        assert_eq!(s.retry_delay_ms, 6000);
        assert!(s.username.is_none());
    }

    #[test]
    fn test_deserialize_partial() {
        let s: Settings = serde_json::from_str(r#"{"tick_ms": 500}"#).unwrap();
        assert_eq!(s.tick(), Duration::from_millis(500));
        assert_eq!(s.signaling_url, DEFAULT_SIGNALING_URL);
    }
}
