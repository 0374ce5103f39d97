pub mod assistant;
pub mod audio;
pub mod config;
pub mod http;
pub mod protocol;
pub mod session;
pub mod transport;

pub use assistant::{AssistantConfig, AssistantState, Transcript, VoiceAssistant};
pub use audio::{
    AudioBridge, AudioCapture, AudioError, AudioFile, AudioPayload, CaptureChunk, CaptureConfig,
    FileCapture, SampleEncoding,
};
pub use config::Config;
pub use http::{create_router, AppState};
pub use protocol::{
    InboundMessage, OutboundMessage, ProductDetection, SessionStatus, ShoppingListItem,
    ShoppingListSnapshot,
};
pub use session::{SessionCallbacks, SessionConfig, SessionController, SessionError, SessionStats};
pub use transport::{Connector, WebSocketConnector};
