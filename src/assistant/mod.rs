//! Consumer-facing voice assistant
//!
//! A narrow start/stop/toggle surface over the session controller, with a
//! single observable state for UI code.

mod facade;
mod state;

pub use facade::VoiceAssistant;
pub use state::{AssistantConfig, AssistantState, Transcript};
