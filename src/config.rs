use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

use crate::assistant::AssistantConfig;
use crate::audio::CaptureConfig;
use crate::session::SessionConfig;

/// Config file looked up when no explicit path is given
pub const DEFAULT_CONFIG_PATH: &str = "config/shoplist-voice";

/// Prefix for environment overrides, e.g. `SHOPLIST_VOICE__VOICE__USER_ID`
pub const ENV_PREFIX: &str = "SHOPLIST_VOICE";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub voice: VoiceConfig,
    pub capture: CaptureConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub backend_url: String,
    pub user_id: String,
    pub debug: bool,
    pub max_reconnect_attempts: u32,
    pub reconnect_delay_ms: u64,
    pub connect_timeout_ms: u64,
    /// 0 disables the heartbeat
    pub heartbeat_interval_ms: u64,
    pub sync_interval_ms: u64,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        let session = SessionConfig::default();
        Self {
            backend_url: session.backend_url,
            user_id: session.user_id,
            debug: false,
            max_reconnect_attempts: session.max_reconnect_attempts,
            reconnect_delay_ms: session.reconnect_delay.as_millis() as u64,
            connect_timeout_ms: session.connect_timeout.as_millis() as u64,
            heartbeat_interval_ms: 0,
            sync_interval_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8765,
        }
    }
}

impl Config {
    /// Load layered configuration: the file at `path` (required) or the
    /// default path (optional), then `SHOPLIST_VOICE__*` environment
    /// variables.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let file = match path {
            Some(path) => config::File::with_name(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_PATH).required(false),
        };

        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to load configuration")?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }

    pub fn session_config(&self) -> SessionConfig {
        let voice = &self.voice;
        SessionConfig {
            backend_url: voice.backend_url.clone(),
            user_id: voice.user_id.clone(),
            max_reconnect_attempts: voice.max_reconnect_attempts,
            reconnect_delay: Duration::from_millis(voice.reconnect_delay_ms),
            connect_timeout: Duration::from_millis(voice.connect_timeout_ms),
            heartbeat_interval: match voice.heartbeat_interval_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
        }
    }

    pub fn assistant_config(&self) -> AssistantConfig {
        AssistantConfig {
            capture: self.capture.clone(),
            sync_interval: Duration::from_millis(self.voice.sync_interval_ms),
        }
    }

    /// Default tracing filter directive
    pub fn log_level(&self) -> &'static str {
        if self.voice.debug {
            "debug"
        } else {
            "info"
        }
    }
}
