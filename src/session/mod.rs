//! Voice session management
//!
//! This module provides the `SessionController` abstraction that manages:
//! - Channel lifecycle (open, start/stop session, close)
//! - Reconnection after unclean closes, with a bounded attempt budget
//! - Routing of inbound frames to registered callbacks
//! - The authoritative "is the session usable" state

mod callbacks;
mod config;
mod controller;
mod error;
mod stats;

pub use callbacks::{
    ConnectionHandler, ErrorHandler, ProductHandler, SessionCallbacks, ShoppingListHandler,
    StatusHandler, TranscriptHandler,
};
pub use config::SessionConfig;
pub use controller::SessionController;
pub use error::SessionError;
pub use stats::SessionStats;
pub use crate::protocol::SessionStatus;
