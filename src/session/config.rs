use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::transport::{endpoint_for, ConnectError};

/// Configuration for a voice session controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Backend base URL (e.g., "http://localhost:8000")
    pub backend_url: String,

    /// User identifier, appended to the endpoint path
    pub user_id: String,

    /// Reconnection attempts after an unclean close before giving up
    /// Default: 5
    pub max_reconnect_attempts: u32,

    /// Fixed delay between reconnection attempts
    /// Default: 2 seconds
    pub reconnect_delay: Duration,

    /// Upper bound on a single channel open
    /// Default: 10 seconds
    pub connect_timeout: Duration,

    /// Send `ping` on this interval while connected (None = disabled)
    pub heartbeat_interval: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:8000".to_string(),
            user_id: format!("user-{}", uuid::Uuid::new_v4()),
            max_reconnect_attempts: 5,
            reconnect_delay: Duration::from_millis(2000),
            connect_timeout: Duration::from_secs(10),
            heartbeat_interval: None,
        }
    }
}

impl SessionConfig {
    /// WebSocket endpoint for this user
    pub fn endpoint(&self) -> Result<String, ConnectError> {
        endpoint_for(&self.backend_url, &self.user_id)
    }
}
