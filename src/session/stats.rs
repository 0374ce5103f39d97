use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::protocol::SessionStatus;

/// Point-in-time view of a voice session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Session state machine position
    pub status: SessionStatus,

    /// Whether the transport is believed open
    pub connected: bool,

    /// Reconnection attempts since the last successful open
    pub reconnect_attempt: u32,

    /// Audio chunks forwarded in this session
    pub chunks_sent: u64,

    /// When the session first opened a channel
    pub started_at: Option<DateTime<Utc>>,

    /// Seconds since `started_at`
    pub duration_secs: f64,

    /// Items in the current shopping list snapshot
    pub shopping_list_items: usize,
}
