use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Close code for an orderly, caller-initiated shutdown
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code reported when the connection dropped without a close handshake
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// A single message on the channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

/// Connection lifecycle as reported by the underlying transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReadyState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl ReadyState {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            2 => ReadyState::Closing,
            _ => ReadyState::Closed,
        }
    }
}

/// Event delivered by a channel to its single consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Message(Frame),
    Closed {
        code: u16,
        reason: String,
        was_clean: bool,
    },
    Error(String),
}

/// Failure to establish a channel
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("failed to connect to {endpoint}: {reason}")]
    Failed { endpoint: String, reason: String },

    #[error("connecting to {endpoint} timed out after {timeout_ms}ms")]
    Timeout { endpoint: String, timeout_ms: u64 },
}

/// Bidirectional message channel to a remote endpoint.
///
/// `send` is best effort: frames offered while the channel is not open are
/// dropped (and logged) by the implementation, never reported to the caller.
pub trait Channel: Send + Sync {
    fn send(&self, frame: Frame);

    /// Start a graceful shutdown; later `send` calls become no-ops
    fn close(&self, code: u16, reason: &str);

    fn ready_state(&self) -> ReadyState;

    fn is_open(&self) -> bool {
        self.ready_state() == ReadyState::Open
    }
}

/// An opened channel together with its event stream.
///
/// The event receiver can be taken exactly once, via [`ChannelHandle::into_parts`].
pub struct ChannelHandle {
    channel: Arc<dyn Channel>,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
}

impl ChannelHandle {
    pub fn new(channel: Arc<dyn Channel>, events: mpsc::UnboundedReceiver<ChannelEvent>) -> Self {
        Self { channel, events }
    }

    pub fn channel(&self) -> &Arc<dyn Channel> {
        &self.channel
    }

    pub fn into_parts(self) -> (Arc<dyn Channel>, mpsc::UnboundedReceiver<ChannelEvent>) {
        (self.channel, self.events)
    }
}

/// Opens channels. Implemented by the WebSocket transport and by test fakes.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, endpoint: &str) -> Result<ChannelHandle, ConnectError>;
}
