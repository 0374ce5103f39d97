// Shared fakes for integration tests
//
// FakeConnector hands out in-memory channels. Each opened channel comes with
// a FakeLink that plays the server side: push frames, close, inspect sends.

#![allow(dead_code)]

use shoplist_voice::audio::{AudioCapture, CaptureChunk, CaptureConfig};
use shoplist_voice::protocol::SessionStatus;
use shoplist_voice::session::{SessionCallbacks, SessionConfig, SessionError};
use shoplist_voice::transport::{
    Channel, ChannelEvent, ChannelHandle, ConnectError, Connector, Frame, ReadyState,
};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

/// Let spawned tasks run without advancing the clock
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Advance the paused clock and let timers fire
pub async fn advance(duration: Duration) {
    tokio::time::advance(duration).await;
    settle().await;
}

pub fn test_config() -> SessionConfig {
    SessionConfig {
        backend_url: "http://voice.test:8000".to_string(),
        user_id: "user-1".to_string(),
        ..Default::default()
    }
}

// ============================================================================
// Transport fakes
// ============================================================================

pub struct FakeChannel {
    state: AtomicU8,
    sent: Mutex<Vec<Frame>>,
    closes: Mutex<Vec<(u16, String)>>,
}

impl FakeChannel {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(ReadyState::Open as u8),
            sent: Mutex::new(Vec::new()),
            closes: Mutex::new(Vec::new()),
        }
    }

    pub fn set_state(&self, state: ReadyState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// Every frame handed to `send`, whatever the ready state was
    pub fn sent(&self) -> Vec<Frame> {
        self.sent.lock().unwrap().clone()
    }

    pub fn closes(&self) -> Vec<(u16, String)> {
        self.closes.lock().unwrap().clone()
    }
}

impl Channel for FakeChannel {
    fn send(&self, frame: Frame) {
        self.sent.lock().unwrap().push(frame);
    }

    fn close(&self, code: u16, reason: &str) {
        self.closes.lock().unwrap().push((code, reason.to_string()));
        self.set_state(ReadyState::Closed);
    }

    fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.state.load(Ordering::SeqCst))
    }
}

/// Server side of one fake channel
#[derive(Clone)]
pub struct FakeLink {
    pub channel: Arc<FakeChannel>,
    events: mpsc::UnboundedSender<ChannelEvent>,
}

impl FakeLink {
    pub fn server_sends(&self, text: &str) {
        let _ = self
            .events
            .send(ChannelEvent::Message(Frame::Text(text.to_string())));
    }

    pub fn server_sends_json(&self, value: serde_json::Value) {
        self.server_sends(&value.to_string());
    }

    /// Deliver a close event without touching the ready state
    pub fn emit_close(&self, code: u16) {
        let _ = self.events.send(ChannelEvent::Closed {
            code,
            reason: String::new(),
            was_clean: code == 1000,
        });
    }

    /// Connection lost: channel goes to closed, then 1006 is reported
    pub fn drop_connection(&self) {
        self.channel.set_state(ReadyState::Closed);
        let _ = self.events.send(ChannelEvent::Error("connection reset".to_string()));
        self.emit_close(1006);
    }

    pub fn sent_json(&self) -> Vec<serde_json::Value> {
        self.channel
            .sent()
            .into_iter()
            .filter_map(|frame| match frame {
                Frame::Text(text) => serde_json::from_str(&text).ok(),
                Frame::Binary(_) => None,
            })
            .collect()
    }

    pub fn sent_types(&self) -> Vec<String> {
        self.sent_json()
            .iter()
            .filter_map(|v| v["type"].as_str().map(str::to_string))
            .collect()
    }

    pub fn count_sent(&self, kind: &str) -> usize {
        self.sent_types().iter().filter(|t| t.as_str() == kind).count()
    }
}

#[derive(Default)]
pub struct FakeConnector {
    opens: AtomicUsize,
    failing: AtomicBool,
    hanging: AtomicBool,
    release: Notify,
    endpoints: Mutex<Vec<String>>,
    links: Mutex<Vec<FakeLink>>,
}

impl FakeConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Refuse every open from now on
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Block opens until `release` is called
    pub fn set_hanging(&self, hanging: bool) {
        self.hanging.store(hanging, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.hanging.store(false, Ordering::SeqCst);
        self.release.notify_waiters();
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn endpoints(&self) -> Vec<String> {
        self.endpoints.lock().unwrap().clone()
    }

    pub fn link(&self, index: usize) -> FakeLink {
        self.links.lock().unwrap()[index].clone()
    }

    pub fn last_link(&self) -> FakeLink {
        self.links
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no channel opened yet")
    }

    pub fn link_count(&self) -> usize {
        self.links.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Connector for FakeConnector {
    async fn open(&self, endpoint: &str) -> Result<ChannelHandle, ConnectError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.endpoints.lock().unwrap().push(endpoint.to_string());

        if self.hanging.load(Ordering::SeqCst) {
            self.release.notified().await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(ConnectError::Failed {
                endpoint: endpoint.to_string(),
                reason: "connection refused".to_string(),
            });
        }

        let channel = Arc::new(FakeChannel::new());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        self.links.lock().unwrap().push(FakeLink {
            channel: Arc::clone(&channel),
            events: events_tx,
        });

        Ok(ChannelHandle::new(channel, events_rx))
    }
}

// ============================================================================
// Callback recorder
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Status(SessionStatus),
    Error(SessionError),
    Connection(bool),
    Transcript(String, bool),
    List(Vec<String>),
    Product(String),
}

#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<Event>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callbacks(&self) -> SessionCallbacks {
        let (a, b, c, d, e, f) = (
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
        );
        SessionCallbacks::new()
            .on_status_change(move |status| a.push(Event::Status(status)))
            .on_error(move |err| b.push(Event::Error(err.clone())))
            .on_connection_status(move |connected| c.push(Event::Connection(connected)))
            .on_transcript_received(move |text, is_user| {
                d.push(Event::Transcript(text.to_string(), is_user))
            })
            .on_shopping_list_updated(move |list| {
                e.push(Event::List(
                    list.item_names().into_iter().map(str::to_string).collect(),
                ))
            })
            .on_product_detected(move |product| f.push(Event::Product(product.name.clone())))
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    pub fn all(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<SessionError> {
        self.all()
            .into_iter()
            .filter_map(|e| match e {
                Event::Error(err) => Some(err),
                _ => None,
            })
            .collect()
    }

    pub fn statuses(&self) -> Vec<SessionStatus> {
        self.all()
            .into_iter()
            .filter_map(|e| match e {
                Event::Status(status) => Some(status),
                _ => None,
            })
            .collect()
    }

    pub fn lists(&self) -> Vec<Vec<String>> {
        self.all()
            .into_iter()
            .filter_map(|e| match e {
                Event::List(names) => Some(names),
                _ => None,
            })
            .collect()
    }
}

// ============================================================================
// Capture fake
// ============================================================================

/// Capture backend driven by the test through a `CaptureFeed`
pub struct ManualCapture {
    feed: CaptureFeed,
    fail_start: bool,
    ended_on_start: bool,
}

#[derive(Clone, Default)]
pub struct CaptureFeed {
    sender: Arc<Mutex<Option<mpsc::Sender<CaptureChunk>>>>,
    capturing: Arc<AtomicBool>,
    starts: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
}

impl ManualCapture {
    pub fn new() -> (Self, CaptureFeed) {
        let feed = CaptureFeed::default();
        (
            Self {
                feed: feed.clone(),
                fail_start: false,
                ended_on_start: false,
            },
            feed,
        )
    }

    pub fn failing() -> (Self, CaptureFeed) {
        let (mut capture, feed) = Self::new();
        capture.fail_start = true;
        (capture, feed)
    }

    /// Starts fine but hands back a stream that has already ended
    pub fn ended() -> (Self, CaptureFeed) {
        let (mut capture, feed) = Self::new();
        capture.ended_on_start = true;
        (capture, feed)
    }
}

impl CaptureFeed {
    /// Deliver a chunk as if the microphone produced it
    pub fn push(&self, chunk: CaptureChunk) -> bool {
        match self.sender.lock().unwrap().as_ref() {
            Some(sender) => sender.try_send(chunk).is_ok(),
            None => false,
        }
    }

    /// End the capture stream, as a finished file would
    pub fn finish(&self) {
        self.sender.lock().unwrap().take();
        self.capturing.store(false, Ordering::SeqCst);
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AudioCapture for ManualCapture {
    async fn start(&mut self, _config: &CaptureConfig) -> anyhow::Result<mpsc::Receiver<CaptureChunk>> {
        self.feed.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            anyhow::bail!("microphone unavailable");
        }
        let (tx, rx) = mpsc::channel(64);
        if self.ended_on_start {
            drop(tx);
            return Ok(rx);
        }
        *self.feed.sender.lock().unwrap() = Some(tx);
        self.feed.capturing.store(true, Ordering::SeqCst);
        Ok(rx)
    }

    async fn stop(&mut self) -> anyhow::Result<()> {
        self.feed.stops.fetch_add(1, Ordering::SeqCst);
        self.feed.finish();
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.feed.is_capturing()
    }

    fn name(&self) -> &str {
        "manual"
    }
}
