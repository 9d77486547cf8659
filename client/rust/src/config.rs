/// Client configuration: server location, room, timeouts, and reconnection policy.

use crate::error::{ClientError, Result};
use std::time::Duration;
use url::Url;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:3001";
pub const DEFAULT_ROOM: &str = "general";

/// Bounded exponential backoff for the realtime connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy {
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(32000),
            max_attempts: 12,
        }
    }
}

impl ReconnectPolicy {
    /// Delay to wait before the given (zero-based) attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// HTTP base of the chat server, e.g. `http://192.168.1.5:3001`
    pub server_url: String,
    pub room: String,
    pub request_timeout: Duration,
    pub reconnect: ReconnectPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            server_url: DEFAULT_SERVER_URL.to_string(),
            room: DEFAULT_ROOM.to_string(),
            request_timeout: Duration::from_secs(30),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(server_url: impl Into<String>) -> Self {
        ClientConfig {
            server_url: server_url.into(),
            ..Default::default()
        }
    }

    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = room.into();
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Server base without a trailing slash
    pub fn base_url(&self) -> &str {
        self.server_url.trim_end_matches('/')
    }

    /// Base of the REST endpoints
    pub fn api_url(&self) -> String {
        format!("{}/api", self.base_url())
    }

    /// Websocket endpoint derived from the HTTP base
    pub fn ws_url(&self) -> Result<String> {
        let mut url = Url::parse(self.base_url())?;
        let scheme = match url.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => {
                return Err(ClientError::Config(format!(
                    "Unsupported server scheme: {}",
                    other
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| ClientError::Config(format!("Cannot derive websocket URL from {}", url)))?;
        url.set_path("/ws");
        Ok(url.to_string())
    }
}
