//! Wire protocol spoken with the voice backend
//!
//! JSON text frames, one WebSocket per user session, discriminated by a
//! `type` field.

pub mod messages;
pub mod shopping_list;

pub use messages::{parse_inbound, InboundMessage, OutboundMessage, ProtocolError, SessionStatus};
pub use shopping_list::{ProductAction, ProductDetection, ShoppingListItem, ShoppingListSnapshot};
