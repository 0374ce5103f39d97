use super::callbacks::SessionCallbacks;
use super::config::SessionConfig;
use super::error::SessionError;
use super::stats::SessionStats;
use crate::protocol::{
    parse_inbound, InboundMessage, OutboundMessage, ProtocolError, SessionStatus,
    ShoppingListSnapshot,
};
use crate::transport::{
    Channel, ChannelEvent, ConnectError, Connector, Frame, WebSocketConnector, ABNORMAL_CLOSURE,
    NORMAL_CLOSURE,
};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Owns one voice session: the channel, the reconnection policy, inbound
/// routing and the authoritative connection state.
///
/// Cloning is cheap and every clone drives the same session. Must be used
/// from within a tokio runtime.
#[derive(Clone)]
pub struct SessionController {
    shared: Arc<Shared>,
}

struct Shared {
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    session: Mutex<Session>,
    callbacks: RwLock<SessionCallbacks>,
    /// Serializes channel opens
    connect_gate: tokio::sync::Mutex<()>,
}

/// Mutable session entity. Never held across an `.await`.
#[derive(Default)]
struct Session {
    channel: Option<Arc<dyn Channel>>,
    /// Bumped whenever a channel is installed or the session is stopped;
    /// events from older channels are ignored.
    generation: u64,
    /// Bumped on stop; in-flight connects and timers from an older epoch
    /// must not revive the session.
    epoch: u64,
    connected: bool,
    status: SessionStatus,
    reconnect_attempt: u32,
    chunks_sent: u64,
    started_at: Option<DateTime<Utc>>,
    reader: Option<JoinHandle<()>>,
    reconnect_timer: Option<ReconnectTimer>,
    next_timer_id: u64,
    shopping_list: Option<ShoppingListSnapshot>,
}

struct ReconnectTimer {
    id: u64,
    handle: JoinHandle<()>,
}

impl Session {
    fn is_active(&self) -> bool {
        self.connected && self.channel.as_ref().is_some_and(|c| c.is_open())
    }

    fn active_channel(&self) -> Option<Arc<dyn Channel>> {
        if self.is_active() {
            self.channel.clone()
        } else {
            None
        }
    }
}

impl SessionController {
    /// Create a controller that opens channels through `connector`
    pub fn new(config: SessionConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                connector,
                session: Mutex::new(Session::default()),
                callbacks: RwLock::new(SessionCallbacks::default()),
                connect_gate: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Create a controller backed by the WebSocket transport
    pub fn with_websocket(config: SessionConfig) -> Self {
        Self::new(config, Arc::new(WebSocketConnector::new()))
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    pub fn endpoint(&self) -> Result<String, ConnectError> {
        self.shared.config.endpoint()
    }

    /// Merge handlers into the registered set
    pub fn set_callbacks(&self, callbacks: SessionCallbacks) {
        let mut current = self
            .shared
            .callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        current.merge(callbacks);
    }

    /// Open the channel (if needed) and send `start_session`.
    ///
    /// Only a fresh start can fail. While a reconnection is scheduled the
    /// call returns immediately and the scheduled attempt carries on.
    pub async fn start_session(&self) -> Result<(), SessionError> {
        {
            let mut session = self.shared.session();
            if session.reconnect_timer.is_some() {
                debug!(
                    "Reconnect attempt {} already scheduled, not starting another",
                    session.reconnect_attempt
                );
                return Ok(());
            }
            session.reconnect_attempt = 0;
        }

        match self.shared.connect().await {
            Ok(()) => Ok(()),
            Err(SessionError::Cancelled) => Err(SessionError::Cancelled),
            Err(err) => {
                warn!("Failed to start voice session: {}", err);
                self.shared.update_status(SessionStatus::Error);
                Err(err)
            }
        }
    }

    /// Stop the session: cancel any pending reconnect, send `stop_session`
    /// when connected, close the channel and reset to idle.
    ///
    /// Runs to completion without awaiting; the pending retry is cancelled
    /// and the channel closed by the time it returns.
    pub async fn stop_session(&self) {
        let (channel, was_connected, cancelled_timer) = {
            let mut session = self.shared.session();
            session.epoch += 1;
            session.generation += 1;

            let cancelled_timer = match session.reconnect_timer.take() {
                Some(timer) => {
                    timer.handle.abort();
                    true
                }
                None => false,
            };
            if let Some(reader) = session.reader.take() {
                reader.abort();
            }

            let was_connected = session.connected;
            let channel = session.channel.take();

            session.connected = false;
            session.status = SessionStatus::Idle;
            session.reconnect_attempt = 0;
            session.chunks_sent = 0;
            session.started_at = None;

            (channel, was_connected, cancelled_timer)
        };

        if cancelled_timer {
            info!("Cancelled pending reconnect");
        }

        if let Some(channel) = channel {
            if was_connected && channel.is_open() {
                match OutboundMessage::StopSession.to_json() {
                    Ok(json) => channel.send(Frame::Text(json)),
                    Err(e) => {
                        error!("Failed to encode stop_session frame: {}", e);
                    }
                }
            }
            channel.close(NORMAL_CLOSURE, "session stopped");
        }

        info!("Voice session stopped");

        if was_connected {
            self.shared.emit_connection_status(false);
        }
        self.shared.emit_status(SessionStatus::Idle);
    }

    /// Forward one base64 audio chunk. Dropped (and logged) unless the
    /// session is active; never buffered or retried.
    pub fn send_audio_chunk(&self, audio_base64: impl Into<String>, timestamp_ms: i64) -> bool {
        let target = {
            let mut session = self.shared.session();
            match session.active_channel() {
                Some(channel) => {
                    session.chunks_sent += 1;
                    Some((channel, session.chunks_sent))
                }
                None => None,
            }
        };

        let Some((channel, sequence)) = target else {
            debug!("Dropping audio chunk: session not active");
            return false;
        };

        let message = OutboundMessage::AudioChunk {
            audio_data: audio_base64.into(),
            timestamp: timestamp_ms,
        };
        match message.to_json() {
            Ok(json) => channel.send(Frame::Text(json)),
            Err(e) => {
                error!("Failed to encode audio chunk: {}", e);
                return false;
            }
        }

        if sequence == 1 || sequence % 50 == 0 {
            debug!("Sent audio chunk #{}", sequence);
        }

        true
    }

    pub fn send_ping(&self) -> bool {
        self.shared.send(OutboundMessage::Ping)
    }

    /// Ask the backend to treat `text` as if it had been spoken
    pub fn send_test_audio(&self, text: impl Into<String>) -> bool {
        self.shared.send(OutboundMessage::TestAudio { text: text.into() })
    }

    /// Connected flag set and the channel reports open
    pub fn is_session_active(&self) -> bool {
        self.shared.session().is_active()
    }

    /// Connected flag only, regardless of the channel's own state
    pub fn is_connected(&self) -> bool {
        self.shared.session().connected
    }

    pub fn status(&self) -> SessionStatus {
        self.shared.session().status
    }

    pub fn reconnect_attempt(&self) -> u32 {
        self.shared.session().reconnect_attempt
    }

    pub fn is_reconnect_pending(&self) -> bool {
        self.shared.session().reconnect_timer.is_some()
    }

    pub fn chunks_sent(&self) -> u64 {
        self.shared.session().chunks_sent
    }

    /// Latest shopping list snapshot, if any
    pub fn shopping_list(&self) -> Option<ShoppingListSnapshot> {
        self.shared.session().shopping_list.clone()
    }

    /// Remove and return the snapshot (e.g. to persist it)
    pub fn take_shopping_list(&self) -> Option<ShoppingListSnapshot> {
        self.shared.session().shopping_list.take()
    }

    pub fn clear_shopping_list(&self) {
        self.shared.session().shopping_list = None;
    }

    pub fn stats(&self) -> SessionStats {
        let session = self.shared.session();
        let duration_secs = session
            .started_at
            .map(|started| {
                Utc::now().signed_duration_since(started).num_milliseconds() as f64 / 1000.0
            })
            .unwrap_or(0.0);

        SessionStats {
            status: session.status,
            connected: session.connected,
            reconnect_attempt: session.reconnect_attempt,
            chunks_sent: session.chunks_sent,
            started_at: session.started_at,
            duration_secs,
            shopping_list_items: session.shopping_list.as_ref().map_or(0, |l| l.len()),
        }
    }
}

impl Shared {
    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn callbacks(&self) -> SessionCallbacks {
        self.callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn connect(self: &Arc<Self>) -> Result<(), SessionError> {
        let _gate = self.connect_gate.lock().await;

        let epoch = {
            let session = self.session();
            if session.is_active() {
                drop(session);
                info!("Voice channel already open, restarting session");
                self.send(OutboundMessage::StartSession);
                return Ok(());
            }
            session.epoch
        };

        let endpoint = self.config.endpoint()?;
        self.update_status(SessionStatus::Connecting);

        let timeout = self.config.connect_timeout;
        let handle = match tokio::time::timeout(timeout, self.connector.open(&endpoint)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ConnectError::Timeout {
                    endpoint,
                    timeout_ms: timeout.as_millis() as u64,
                }
                .into())
            }
        };
        let (channel, events) = handle.into_parts();

        {
            let mut session = self.session();
            if session.epoch != epoch {
                drop(session);
                info!("Session stopped while connecting, closing new channel");
                channel.close(NORMAL_CLOSURE, "session stopped");
                return Err(SessionError::Cancelled);
            }

            if let Some(old) = session.channel.take() {
                old.close(NORMAL_CLOSURE, "channel replaced");
            }
            if let Some(reader) = session.reader.take() {
                reader.abort();
            }

            session.generation += 1;
            session.channel = Some(Arc::clone(&channel));
            session.connected = true;
            session.reconnect_attempt = 0;
            session.started_at.get_or_insert_with(Utc::now);

            session.reader = Some(tokio::spawn(run_reader(
                Arc::downgrade(self),
                session.generation,
                events,
                self.config.heartbeat_interval,
            )));
        }

        info!("Voice channel open: {}", endpoint);
        self.emit_connection_status(true);
        self.send(OutboundMessage::StartSession);

        Ok(())
    }

    /// Best-effort control frame send
    fn send(&self, message: OutboundMessage) -> bool {
        let Some(channel) = self.session().active_channel() else {
            debug!("Dropping {} frame: session not active", message.kind());
            return false;
        };

        match message.to_json() {
            Ok(json) => {
                channel.send(Frame::Text(json));
                true
            }
            Err(e) => {
                error!("Failed to encode {} frame: {}", message.kind(), e);
                false
            }
        }
    }

    fn handle_close(self: &Arc<Self>, generation: u64, code: u16, reason: &str) {
        {
            let mut session = self.session();
            if session.generation != generation {
                debug!("Ignoring close (code={}) from a stale channel", code);
                return;
            }
            session.connected = false;
            session.reader = None;
        }

        self.emit_connection_status(false);

        if code == NORMAL_CLOSURE {
            info!("Voice channel closed cleanly");
            self.update_status(SessionStatus::Idle);
            return;
        }

        warn!(
            "Voice channel closed unexpectedly (code={}, reason={})",
            code, reason
        );
        self.reconnect_or_give_up();
    }

    /// Schedule the next reconnect, or give up once the budget is spent
    fn reconnect_or_give_up(self: &Arc<Self>) {
        let max_attempts = self.config.max_reconnect_attempts;
        let delay = self.config.reconnect_delay;

        let scheduled = {
            let mut session = self.session();
            if session.reconnect_attempt >= max_attempts {
                None
            } else {
                session.reconnect_attempt += 1;
                session.next_timer_id += 1;

                let id = session.next_timer_id;
                let epoch = session.epoch;
                let weak = Arc::downgrade(self);
                let handle = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Some(shared) = weak.upgrade() {
                        shared.retry(id, epoch).await;
                    }
                });

                // Only the running timer task can be replaced here; dropping
                // its handle does not cancel it.
                session.reconnect_timer = Some(ReconnectTimer { id, handle });
                Some(session.reconnect_attempt)
            }
        };

        match scheduled {
            Some(attempt) => {
                info!(
                    "Scheduling reconnect attempt {}/{} in {}ms",
                    attempt,
                    max_attempts,
                    delay.as_millis()
                );
                self.update_status(SessionStatus::Connecting);
            }
            None => self.give_up(),
        }
    }

    async fn retry(self: &Arc<Self>, id: u64, epoch: u64) {
        {
            let session = self.session();
            if session.epoch != epoch {
                return;
            }
            info!(
                "Reconnect attempt {}/{}",
                session.reconnect_attempt, self.config.max_reconnect_attempts
            );
        }

        match self.connect().await {
            Ok(()) => {
                let mut session = self.session();
                if session.reconnect_timer.as_ref().is_some_and(|t| t.id == id) {
                    session.reconnect_timer = None;
                }
            }
            Err(SessionError::Cancelled) => {
                debug!("Reconnect cancelled by stop");
            }
            Err(err) => {
                warn!("Reconnect attempt failed: {}", err);
                if self.session().epoch == epoch {
                    self.reconnect_or_give_up();
                }
            }
        }
    }

    fn give_up(self: &Arc<Self>) {
        let attempts = {
            let mut session = self.session();
            session.reconnect_timer = None;
            session.connected = false;
            session.chunks_sent = 0;
            session.started_at = None;
            session.reconnect_attempt
        };

        error!(
            "Giving up on the voice channel after {} reconnect attempts",
            attempts
        );
        self.emit_error(&SessionError::ReconnectExhausted { attempts });
        self.set_status(SessionStatus::Error);
    }

    fn route_frame(&self, frame: Frame) {
        let text = match frame {
            Frame::Text(text) => text,
            Frame::Binary(bytes) => {
                debug!("Ignoring {}-byte binary frame", bytes.len());
                return;
            }
        };

        match parse_inbound(&text) {
            Ok(message) => self.dispatch(message),
            Err(ProtocolError::UnknownType(kind)) => {
                warn!("Ignoring unknown message type: {}", kind);
            }
            Err(e) => {
                warn!("Ignoring malformed frame: {}", e);
            }
        }
    }

    fn dispatch(&self, message: InboundMessage) {
        match message {
            InboundMessage::SessionStarted { .. } => {
                info!("Voice session started");
                self.session().connected = true;
                self.update_status(SessionStatus::Listening);
            }
            InboundMessage::SessionStopped { .. } => {
                info!("Voice session stopped by backend");
                self.update_status(SessionStatus::Idle);
            }
            InboundMessage::ShoppingListUpdated { shopping_list } => {
                info!(
                    "Shopping list updated: {} items (confidence={:.2})",
                    shopping_list.len(),
                    shopping_list.confidence
                );
                self.session().shopping_list = Some(shopping_list.clone());
                if let Some(handler) = self.callbacks().on_shopping_list_updated {
                    handler(&shopping_list);
                }
            }
            InboundMessage::ProductDetected { product } => {
                debug!("Product detected: {} ({:?})", product.name, product.action);
                if let Some(handler) = self.callbacks().on_product_detected {
                    handler(&product);
                }
            }
            InboundMessage::Transcript { text, is_user } => {
                debug!(
                    "Transcript ({}): {}",
                    if is_user { "user" } else { "assistant" },
                    text
                );
                if let Some(handler) = self.callbacks().on_transcript_received {
                    handler(&text, is_user);
                }
            }
            InboundMessage::Status { status, message } => {
                debug!(
                    "Backend status: {} {}",
                    status,
                    message.as_deref().unwrap_or_default()
                );
                self.set_status(status);
            }
            InboundMessage::Error { message } => {
                error!("Voice backend error: {}", message);
                self.emit_error(&SessionError::Remote(message));
                self.set_status(SessionStatus::Error);
            }
            InboundMessage::AudioReceived { chunk_size, .. } => {
                debug!("Backend acknowledged audio ({:?} chars)", chunk_size);
            }
            InboundMessage::Pong { .. } => {
                debug!("Pong received");
            }
            InboundMessage::Unknown => {
                warn!("Ignoring unknown message");
            }
        }
    }

    /// Set the status and notify, even if unchanged
    fn set_status(&self, status: SessionStatus) {
        self.session().status = status;
        self.emit_status(status);
    }

    /// Set the status and notify only on change
    fn update_status(&self, status: SessionStatus) {
        let changed = {
            let mut session = self.session();
            let changed = session.status != status;
            session.status = status;
            changed
        };
        if changed {
            self.emit_status(status);
        }
    }

    fn emit_status(&self, status: SessionStatus) {
        debug!("Session status -> {}", status);
        if let Some(handler) = self.callbacks().on_status_change {
            handler(status);
        }
    }

    fn emit_error(&self, err: &SessionError) {
        if let Some(handler) = self.callbacks().on_error {
            handler(err);
        }
    }

    fn emit_connection_status(&self, connected: bool) {
        if let Some(handler) = self.callbacks().on_connection_status {
            handler(connected);
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let session = self.session.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(timer) = session.reconnect_timer.take() {
            timer.handle.abort();
        }
        if let Some(reader) = session.reader.take() {
            reader.abort();
        }
        if let Some(channel) = session.channel.take() {
            channel.close(NORMAL_CLOSURE, "controller dropped");
        }
    }
}

/// Consume channel events for one channel generation, and send heartbeats
async fn run_reader(
    weak: Weak<Shared>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<ChannelEvent>,
    heartbeat: Option<Duration>,
) {
    let mut heartbeat = heartbeat.filter(|p| !p.is_zero()).map(|period| {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });

    loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = next_tick(&mut heartbeat) => {
                match weak.upgrade() {
                    Some(shared) => {
                        shared.send(OutboundMessage::Ping);
                    }
                    None => break,
                }
                continue;
            }
        };

        let Some(shared) = weak.upgrade() else {
            break;
        };

        match event {
            Some(ChannelEvent::Message(frame)) => shared.route_frame(frame),
            Some(ChannelEvent::Error(reason)) => {
                warn!("Voice channel error: {}", reason);
            }
            Some(ChannelEvent::Closed { code, reason, .. }) => {
                shared.handle_close(generation, code, &reason);
                break;
            }
            None => {
                shared.handle_close(generation, ABNORMAL_CLOSURE, "channel event stream ended");
                break;
            }
        }
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
