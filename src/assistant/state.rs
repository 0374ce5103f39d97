use serde::Serialize;
use std::time::Duration;

use crate::audio::CaptureConfig;
use crate::protocol::{SessionStatus, ShoppingListSnapshot};

/// Last transcript line seen by the assistant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transcript {
    pub text: String,
    pub is_user: bool,
}

/// Externally observable view of the voice assistant
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssistantState {
    pub status: SessionStatus,
    pub is_connected: bool,
    pub is_recording: bool,
    pub chunks_sent: u64,
    pub shopping_list: Option<ShoppingListSnapshot>,
    pub last_transcript: Option<Transcript>,
    /// User-facing message for the most recent error
    pub last_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub capture: CaptureConfig,
    /// Period of the connection-state guard; zero disables it
    pub sync_interval: Duration,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            sync_interval: Duration::from_secs(10),
        }
    }
}
