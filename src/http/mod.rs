//! HTTP API for local control of the voice assistant
//!
//! The endpoints a UI shell uses to drive the assistant:
//! - GET /health - Health check
//! - GET /voice/status - Current assistant state
//! - POST /voice/start, /voice/stop, /voice/toggle - Listening control
//! - GET /voice/shopping-list - Latest shopping list snapshot
//! - DELETE /voice/shopping-list - Hand over and clear the snapshot
//! - POST /voice/test - Send a text phrase instead of audio

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
