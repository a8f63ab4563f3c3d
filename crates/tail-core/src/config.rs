use std::time::Duration;

use crate::{error::CoreError, locator::LocatorConfig};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Root of the scheduler's HTTP API.
    pub base_url: String,
    /// Raw WebSocket endpoint of the event bus.
    pub bus_url: String,
    /// Discovery poll period (default: 1 second).
    pub poll_interval_ms: u64,
    /// Discovery window measured from `open` (default: 30 seconds).
    pub discovery_timeout_ms: u64,
    /// Pause before redialing the bus after a failure (default: 5 seconds).
    pub reconnect_delay_ms: u64,
    /// Per-request HTTP timeout (default: 10 seconds).
    pub request_timeout_ms: u64,
    /// Anti-forgery token sent with manual execution requests.
    pub csrf_token: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            bus_url: "ws://localhost:8080/ws/websocket".to_string(),
            poll_interval_ms: 1_000,
            discovery_timeout_ms: 30_000,
            reconnect_delay_ms: 5_000,
            request_timeout_ms: 10_000,
            csrf_token: None,
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if !has_scheme(&self.base_url, &["http://", "https://"]) {
            return Err(CoreError::InvalidConfig(format!(
                "base_url must be http(s): {}",
                self.base_url
            )));
        }
        if !has_scheme(&self.bus_url, &["ws://", "wss://"]) {
            return Err(CoreError::InvalidConfig(format!(
                "bus_url must be ws(s): {}",
                self.bus_url
            )));
        }
        if self.poll_interval_ms == 0 || self.reconnect_delay_ms == 0 || self.request_timeout_ms == 0 {
            return Err(CoreError::InvalidConfig("intervals must be non-zero".into()));
        }
        if self.discovery_timeout_ms < self.poll_interval_ms {
            return Err(CoreError::InvalidConfig(
                "discovery_timeout_ms must cover at least one poll".into(),
            ));
        }
        Ok(())
    }

    pub fn locator(&self) -> LocatorConfig {
        LocatorConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            timeout: Duration::from_millis(self.discovery_timeout_ms),
        }
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn has_scheme(url: &str, schemes: &[&str]) -> bool {
    schemes
        .iter()
        .any(|s| url.len() > s.len() && url.to_ascii_lowercase().starts_with(s))
}
