//! Config service client

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::core::EventConfig;
use crate::error::ConfigError;

/// Where the session loads its event from. Called once per session.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn fetch(&self) -> Result<EventConfig, ConfigError>;
}

/// Upper bound on one config request, connect included
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpConfigSource {
    url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpConfigSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
            timeout: FETCH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ConfigSource for HttpConfigSource {
    async fn fetch(&self) -> Result<EventConfig, ConfigError> {
        info!(url = %self.url, "Fetching event config");
        let resp = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::NO_CONTENT || status == reqwest::StatusCode::NOT_FOUND {
            return Err(ConfigError::Empty);
        }
        if !status.is_success() {
            warn!(status = status.as_u16(), "Config service error");
            return Err(ConfigError::Status(status.as_u16()));
        }

        let body = resp.text().await?;
        let config = parse_config(&body)?;
        debug!(event_id = %config.id, status = ?config.status, "Event config loaded");
        Ok(config)
    }
}

/// Decode a config body. Empty bodies, `null` and `{}` mean no event.
pub fn parse_config(body: &str) -> Result<EventConfig, ConfigError> {
    let body = body.trim();
    if body.is_empty() || body == "null" || body == "{}" {
        return Err(ConfigError::Empty);
    }
    let config: EventConfig = serde_json::from_str(body)?;
    if config.id.is_empty() {
        return Err(ConfigError::Empty);
    }
    Ok(config)
}
