//! Transport channel: connect, send, receive-dispatch and close.
//!
//! No business semantics live here. The session controller is the only
//! owner of a channel.

pub mod channel;
pub mod endpoint;
pub mod websocket;

pub use channel::{
    Channel, ChannelEvent, ChannelHandle, ConnectError, Connector, Frame, ReadyState,
    ABNORMAL_CLOSURE, NORMAL_CLOSURE,
};
pub use endpoint::endpoint_for;
pub use websocket::{WebSocketChannel, WebSocketConnector};
