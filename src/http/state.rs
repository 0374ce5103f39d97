use crate::assistant::VoiceAssistant;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub assistant: VoiceAssistant,
}

impl AppState {
    pub fn new(assistant: VoiceAssistant) -> Self {
        Self { assistant }
    }
}
