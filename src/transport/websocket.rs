use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::channel::{
    Channel, ChannelEvent, ChannelHandle, ConnectError, Connector, Frame, ReadyState,
    ABNORMAL_CLOSURE,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Close code used when the peer sent a close frame without a status
const NO_STATUS_RECEIVED: u16 = 1005;

/// Work queued for the writer task
enum Outgoing {
    Frame(Frame),
    Close { code: u16, reason: String },
}

/// Opens WebSocket channels with `tokio-tungstenite`
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self, endpoint: &str) -> Result<ChannelHandle, ConnectError> {
        info!("Connecting to voice backend at {}", endpoint);

        let request = endpoint
            .into_client_request()
            .map_err(|e| ConnectError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        let (ws_stream, _response) =
            tokio_tungstenite::connect_async(request)
                .await
                .map_err(|e| ConnectError::Failed {
                    endpoint: endpoint.to_string(),
                    reason: e.to_string(),
                })?;

        info!("Connected to voice backend successfully");

        let (sink, source) = ws_stream.split();
        let state = Arc::new(AtomicU8::new(ReadyState::Open as u8));
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        tokio::spawn(writer_loop(
            sink,
            outgoing_rx,
            Arc::clone(&state),
            event_tx.clone(),
        ));
        tokio::spawn(reader_loop(source, event_tx, Arc::clone(&state)));

        let channel = WebSocketChannel {
            endpoint: endpoint.to_string(),
            outgoing: outgoing_tx,
            state,
        };

        Ok(ChannelHandle::new(Arc::new(channel), event_rx))
    }
}

/// Client side of one WebSocket connection
pub struct WebSocketChannel {
    endpoint: String,
    outgoing: mpsc::UnboundedSender<Outgoing>,
    state: Arc<AtomicU8>,
}

impl WebSocketChannel {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Channel for WebSocketChannel {
    fn send(&self, frame: Frame) {
        let state = self.ready_state();
        if state != ReadyState::Open {
            debug!("Dropping frame for {}: channel is {:?}", self.endpoint, state);
            return;
        }

        if self.outgoing.send(Outgoing::Frame(frame)).is_err() {
            debug!("Dropping frame for {}: writer has stopped", self.endpoint);
        }
    }

    fn close(&self, code: u16, reason: &str) {
        let was_open = self
            .state
            .compare_exchange(
                ReadyState::Open as u8,
                ReadyState::Closing as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();

        if !was_open {
            debug!("Close requested on {} but channel is not open", self.endpoint);
            return;
        }

        info!("Closing channel to {} (code={}, reason={})", self.endpoint, code, reason);

        let close = Outgoing::Close {
            code,
            reason: reason.to_string(),
        };
        if self.outgoing.send(close).is_err() {
            self.state.store(ReadyState::Closed as u8, Ordering::SeqCst);
        }
    }

    fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.state.load(Ordering::SeqCst))
    }
}

async fn writer_loop(
    mut sink: WsSink,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
    state: Arc<AtomicU8>,
    events: mpsc::UnboundedSender<ChannelEvent>,
) {
    while let Some(item) = outgoing.recv().await {
        let (message, closing) = match item {
            Outgoing::Frame(Frame::Text(text)) => (Message::Text(text), false),
            Outgoing::Frame(Frame::Binary(bytes)) => (Message::Binary(bytes), false),
            Outgoing::Close { code, reason } => (
                Message::Close(Some(CloseFrame {
                    code: CloseCode::from(code),
                    reason: reason.into(),
                })),
                true,
            ),
        };

        if let Err(e) = sink.send(message).await {
            warn!("WebSocket write failed: {}", e);
            let _ = events.send(ChannelEvent::Error(e.to_string()));
            break;
        }

        if closing {
            break;
        }
    }

    // The reader task reports the final close once the peer answers (or drops)
    if ReadyState::from_u8(state.load(Ordering::SeqCst)) == ReadyState::Open {
        state.store(ReadyState::Closing as u8, Ordering::SeqCst);
    }
    debug!("WebSocket writer task stopped");
}

async fn reader_loop(
    mut source: WsSource,
    events: mpsc::UnboundedSender<ChannelEvent>,
    state: Arc<AtomicU8>,
) {
    let mut close_frame: Option<(u16, String)> = None;

    while let Some(message) = source.next().await {
        match message {
            Ok(Message::Text(text)) => {
                let _ = events.send(ChannelEvent::Message(Frame::Text(text)));
            }
            Ok(Message::Binary(bytes)) => {
                let _ = events.send(ChannelEvent::Message(Frame::Binary(bytes)));
            }
            Ok(Message::Close(frame)) => {
                let (code, reason) = frame
                    .map(|f| (u16::from(f.code), f.reason.into_owned()))
                    .unwrap_or((NO_STATUS_RECEIVED, String::new()));
                debug!("Received close frame (code={})", code);
                close_frame = Some((code, reason));
            }
            Ok(_) => {}
            Err(e) => {
                if close_frame.is_none() {
                    warn!("WebSocket read failed: {}", e);
                    let _ = events.send(ChannelEvent::Error(e.to_string()));
                }
                break;
            }
        }
    }

    state.store(ReadyState::Closed as u8, Ordering::SeqCst);

    let event = match close_frame {
        Some((code, reason)) => ChannelEvent::Closed {
            code,
            reason,
            was_clean: true,
        },
        None => ChannelEvent::Closed {
            code: ABNORMAL_CLOSURE,
            reason: "connection lost".to_string(),
            was_clean: false,
        },
    };
    let _ = events.send(event);

    debug!("WebSocket reader task stopped");
}
