use thiserror::Error;

use crate::transport::ConnectError;

/// Errors surfaced by the session controller.
///
/// Dropped sends and malformed inbound frames are only logged and never
/// show up here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// The backend sent an explicit `error` frame
    #[error("{0}")]
    Remote(String),

    #[error("could not reconnect after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    /// `stop_session` ran while a connect was still in flight
    #[error("session was stopped while connecting")]
    Cancelled,

    #[error("audio capture failed: {0}")]
    Capture(String),
}

impl SessionError {
    /// No further automatic recovery will happen
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionError::ReconnectExhausted { .. })
    }

    /// Message suitable for showing to the user
    pub fn user_message(&self) -> String {
        match self {
            SessionError::ReconnectExhausted { .. } => {
                "Could not connect to the voice service, try again later".to_string()
            }
            SessionError::Connect(_) => "Voice service is unreachable right now".to_string(),
            SessionError::Remote(message) => message.clone(),
            other => other.to_string(),
        }
    }
}
