use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::shopping_list::{ProductDetection, ShoppingListSnapshot};

/// Session state as tracked by the controller and reported by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Connecting,
    Listening,
    Processing,
    Error,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Listening => "listening",
            SessionStatus::Processing => "processing",
            SessionStatus::Error => "error",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Frame sent from the client to the voice backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    StartSession,
    StopSession,
    AudioChunk {
        /// Base64-encoded PCM bytes
        audio_data: String,
        /// Capture time, epoch milliseconds
        timestamp: i64,
    },
    Ping,
    TestAudio {
        text: String,
    },
}

impl OutboundMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundMessage::StartSession => "start_session",
            OutboundMessage::StopSession => "stop_session",
            OutboundMessage::AudioChunk { .. } => "audio_chunk",
            OutboundMessage::Ping => "ping",
            OutboundMessage::TestAudio { .. } => "test_audio",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Frame received from the voice backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    SessionStarted {
        #[serde(default)]
        user_id: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
    SessionStopped {
        #[serde(default)]
        message: Option<String>,
    },
    ShoppingListUpdated {
        shopping_list: ShoppingListSnapshot,
    },
    /// Per-product events from older backends
    ProductDetected {
        product: ProductDetection,
    },
    Transcript {
        text: String,
        #[serde(rename = "isUser", default)]
        is_user: bool,
    },
    Status {
        status: SessionStatus,
        #[serde(default)]
        message: Option<String>,
    },
    Error {
        message: String,
    },
    AudioReceived {
        #[serde(default)]
        timestamp: Option<serde_json::Value>,
        #[serde(default)]
        chunk_size: Option<u64>,
    },
    Pong {
        #[serde(default)]
        timestamp: Option<serde_json::Value>,
    },
    #[serde(other)]
    Unknown,
}

/// Why an inbound frame could not be routed
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame is not valid JSON: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("frame has no \"type\" field")]
    MissingType,

    #[error("unknown message type \"{0}\"")]
    UnknownType(String),

    #[error("invalid \"{kind}\" frame: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Parse a text frame from the backend
pub fn parse_inbound(text: &str) -> Result<InboundMessage, ProtocolError> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(ProtocolError::Malformed)?;

    let kind = value
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or(ProtocolError::MissingType)?
        .to_string();

    match serde_json::from_value::<InboundMessage>(value) {
        Ok(InboundMessage::Unknown) => Err(ProtocolError::UnknownType(kind)),
        Ok(message) => Ok(message),
        Err(source) => Err(ProtocolError::InvalidPayload { kind, source }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_frames_carry_only_type() {
        assert_eq!(
            OutboundMessage::StartSession.to_json().unwrap(),
            r#"{"type":"start_session"}"#
        );
        assert_eq!(OutboundMessage::Ping.to_json().unwrap(), r#"{"type":"ping"}"#);
    }

    #[test]
    fn test_status_parses_lowercase() {
        let msg = parse_inbound(r#"{"type":"status","status":"processing"}"#).unwrap();
        assert_eq!(
            msg,
            InboundMessage::Status {
                status: SessionStatus::Processing,
                message: None
            }
        );
    }

    #[test]
    fn test_unknown_type_is_reported_by_name() {
        let err = parse_inbound(r#"{"type":"karaoke","lyrics":"la"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownType(ref k) if k == "karaoke"));
    }

    #[test]
    fn test_missing_type() {
        assert!(matches!(
            parse_inbound(r#"{"status":"idle"}"#),
            Err(ProtocolError::MissingType)
        ));
        assert!(matches!(parse_inbound("not json"), Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn test_bad_payload_keeps_kind() {
        let err = parse_inbound(r#"{"type":"status","status":"dancing"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPayload { ref kind, .. } if kind == "status"));
    }
}
