//! Event configuration as served by the config service
//!
//! Fetched once per session and read-only afterwards. Presentation-only sections
//! (agenda, speakers, analytics) are carried through untouched.

use serde::{Deserialize, Serialize};

/// Server-reported event status. `Scheduled` defers to the wall clock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigStatus {
    #[default]
    Scheduled,
    Live,
    Ended,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamSection {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub poster: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub pinned: Option<String>,
}

impl Default for ChatSection {
    fn default() -> Self {
        Self {
            enabled: true,
            pinned: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgendaItem {
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub title: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Speaker {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSection {
    #[serde(default)]
    pub estimated_viewers: Option<u64>,
}

/// One live event, keyed by `id` for the whole session
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventConfig {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: ConfigStatus,
    /// Calendar date, `YYYY-MM-DD`
    #[serde(default)]
    pub date: Option<String>,
    /// `HH:MM` or `HH:MM:SS`; defaults to midnight
    #[serde(default)]
    pub start_time: Option<String>,
    /// `HH:MM` or `HH:MM:SS`; defaults to 23:59
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub stream: StreamSection,
    #[serde(default)]
    pub chat: ChatSection,
    #[serde(default)]
    pub agenda: Vec<AgendaItem>,
    #[serde(default)]
    pub speakers: Vec<Speaker>,
    #[serde(default)]
    pub analytics: AnalyticsSection,
}

impl EventConfig {
    /// Minimal config, mostly for tests and tooling
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            status: ConfigStatus::Scheduled,
            date: None,
            start_time: None,
            end_time: None,
            stream: StreamSection::default(),
            chat: ChatSection::default(),
            agenda: Vec::new(),
            speakers: Vec::new(),
            analytics: AnalyticsSection::default(),
        }
    }

    pub fn video_url(&self) -> Option<&str> {
        self.stream.url.as_deref().filter(|u| !u.is_empty())
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            "id": "summit-2026",
            "title": "Innovation Summit",
            "status": "live",
            "date": "2026-10-19",
            "startTime": "09:00",
            "endTime": "17:30",
            "stream": { "url": "https://techpark.daily.co/summit", "poster": "/img/poster.jpg" },
            "chat": { "enabled": true, "pinned": "Welcome!" },
            "agenda": [{ "time": "09:00", "title": "Opening" }],
            "speakers": [{ "name": "A. Speaker" }],
            "analytics": { "estimatedViewers": 1200 }
        }"#;

        let config: EventConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.id, "summit-2026");
        assert_eq!(config.status, ConfigStatus::Live);
        assert_eq!(config.start_time.as_deref(), Some("09:00"));
        assert_eq!(config.video_url(), Some("https://techpark.daily.co/summit"));
        assert_eq!(config.chat.pinned.as_deref(), Some("Welcome!"));
        assert_eq!(config.analytics.estimated_viewers, Some(1200));
        assert_eq!(config.agenda.len(), 1);
    }

    #[test]
    fn test_parse_minimal_config_uses_defaults() {
        let config: EventConfig = serde_json::from_str(r#"{"id": "e1"}"#).unwrap();
        assert_eq!(config.status, ConfigStatus::Scheduled);
        assert!(config.chat.enabled);
        assert!(config.video_url().is_none());
        assert!(config.speakers.is_empty());
    }

    #[test]
    fn test_empty_video_url_is_absent() {
        let mut config = EventConfig::new("e1");
        config.stream.url = Some(String::new());
        assert!(config.video_url().is_none());
    }
}
