use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::state::{AssistantConfig, AssistantState, Transcript};
use crate::audio::{AudioBridge, AudioCapture};
use crate::protocol::{SessionStatus, ShoppingListSnapshot};
use crate::session::{SessionCallbacks, SessionController, SessionError};

/// Start/stop/toggle surface given to application code.
///
/// Never returns errors: failures end up in `AssistantState::last_error`
/// and `status == Error`. The view is derived from controller events, with
/// a periodic guard that corrects connection drift.
#[derive(Clone)]
pub struct VoiceAssistant {
    inner: Arc<Inner>,
}

struct Inner {
    controller: SessionController,
    bridge: AudioBridge,
    capture: tokio::sync::Mutex<Box<dyn AudioCapture>>,
    config: AssistantConfig,
    state: Arc<watch::Sender<AssistantState>>,
    pump: Mutex<Option<JoinHandle<()>>>,
    sync_task: Mutex<Option<JoinHandle<()>>>,
}

impl VoiceAssistant {
    /// Wire the assistant to `controller`. `callbacks` are invoked after the
    /// view has been updated.
    pub fn new(
        controller: SessionController,
        capture: Box<dyn AudioCapture>,
        config: AssistantConfig,
        callbacks: SessionCallbacks,
    ) -> Self {
        let (state, _) = watch::channel(AssistantState::default());
        let state = Arc::new(state);

        controller.set_callbacks(view_callbacks(Arc::clone(&state), callbacks));

        let inner = Arc::new(Inner {
            bridge: AudioBridge::new(controller.clone()),
            controller,
            capture: tokio::sync::Mutex::new(capture),
            config,
            state,
            pump: Mutex::new(None),
            sync_task: Mutex::new(None),
        });

        if !inner.config.sync_interval.is_zero() {
            let task = spawn_sync(Arc::downgrade(&inner), inner.config.sync_interval);
            *lock(&inner.sync_task) = Some(task);
        }

        Self { inner }
    }

    pub fn controller(&self) -> &SessionController {
        &self.inner.controller
    }

    pub fn bridge(&self) -> &AudioBridge {
        &self.inner.bridge
    }

    /// Current view
    pub fn state(&self) -> AssistantState {
        self.inner.state.borrow().clone()
    }

    /// Receive every view change
    pub fn subscribe(&self) -> watch::Receiver<AssistantState> {
        self.inner.state.subscribe()
    }

    pub fn is_recording(&self) -> bool {
        self.inner.state.borrow().is_recording
    }

    /// Start a session if none is active, then start capture.
    ///
    /// Capture starts without waiting for `session_started`.
    pub async fn start_listening(&self) {
        if self.is_recording() {
            debug!("Already listening");
            return;
        }

        let controller = &self.inner.controller;
        if !controller.is_session_active() {
            if let Err(err) = controller.start_session().await {
                error!("Could not start voice session: {}", err);
                self.inner.record_error(&err);
                return;
            }
        }

        let mut capture = self.inner.capture.lock().await;
        let chunks = match capture.start(&self.inner.config.capture).await {
            Ok(chunks) => chunks,
            Err(e) => {
                error!("Failed to start {} capture: {:#}", capture.name(), e);
                self.inner
                    .record_error(&SessionError::Capture(format!("{:#}", e)));
                return;
            }
        };
        info!("Listening ({} capture)", capture.name());
        drop(capture);

        // Publish before the pump exists; a stream that already ended must
        // be able to clear the flag afterwards.
        let active = controller.is_session_active();
        let status = if active {
            SessionStatus::Listening
        } else {
            controller.status()
        };
        self.inner.state.send_modify(|s| {
            s.is_recording = true;
            s.is_connected = active;
            s.status = status;
            s.last_error = None;
        });

        let bridge = self.inner.bridge.clone();
        let state = Arc::clone(&self.inner.state);
        let pump = tokio::spawn(async move {
            bridge.run(chunks).await;
            state.send_modify(|s| s.is_recording = false);
        });
        if let Some(previous) = lock(&self.inner.pump).replace(pump) {
            previous.abort();
        }
    }

    /// Stop capture only; the session stays up
    pub async fn stop_listening(&self) {
        {
            let mut capture = self.inner.capture.lock().await;
            if let Err(e) = capture.stop().await {
                warn!("Failed to stop {} capture: {:#}", capture.name(), e);
            }
        }
        if let Some(pump) = lock(&self.inner.pump).take() {
            pump.abort();
        }

        self.inner.state.send_modify(|s| {
            s.is_recording = false;
            s.status = SessionStatus::Idle;
        });
        info!("Stopped listening");
    }

    pub async fn toggle_listening(&self) {
        if self.is_recording() {
            self.stop_listening().await;
        } else {
            self.start_listening().await;
        }
    }

    /// Stop capture and the session
    pub async fn end_session(&self) {
        self.stop_listening().await;
        self.inner.controller.stop_session().await;
        self.inner.state.send_modify(|s| {
            s.is_connected = false;
            s.chunks_sent = 0;
            s.status = SessionStatus::Idle;
        });
    }

    /// Correct drift between the view and the controller. Returns whether
    /// the connection flag had to be fixed.
    ///
    /// `Listening` is only kept while the session is active; otherwise the
    /// controller's status replaces it.
    pub fn sync_connection_state(&self) -> bool {
        self.inner.sync_connection_state()
    }

    /// Hand the snapshot over to the caller and clear it
    pub fn take_shopping_list(&self) -> Option<ShoppingListSnapshot> {
        let snapshot = self.inner.controller.take_shopping_list();
        self.inner.state.send_modify(|s| s.shopping_list = None);
        snapshot
    }

    pub fn discard_shopping_list(&self) {
        self.inner.controller.clear_shopping_list();
        self.inner.state.send_modify(|s| s.shopping_list = None);
    }

    /// Have the backend process `text` as if it had been spoken
    pub fn send_test_phrase(&self, text: &str) -> bool {
        let sent = self.inner.controller.send_test_audio(text);
        if !sent {
            warn!("Test phrase not sent: session not active");
        }
        sent
    }
}

impl Inner {
    fn record_error(&self, err: &SessionError) {
        let message = err.user_message();
        self.state.send_modify(|s| {
            s.status = SessionStatus::Error;
            s.is_recording = false;
            s.last_error = Some(message);
        });
    }

    fn sync_connection_state(&self) -> bool {
        let active = self.controller.is_session_active();
        let controller_status = self.controller.status();
        let chunks_sent = self.controller.chunks_sent();
        // A capture start in progress holds the lock; leave the flag alone then
        let capturing = self.capture.try_lock().ok().map(|c| c.is_capturing());

        let mut corrected = false;
        self.state.send_if_modified(|s| {
            let mut modified = false;
            if s.is_connected != active {
                warn!(
                    "Connection state drift: view={} controller={}, correcting",
                    s.is_connected, active
                );
                s.is_connected = active;
                corrected = true;
                modified = true;
            }
            if s.status == SessionStatus::Listening && !active {
                s.status = controller_status;
                modified = true;
            } else if s.status == SessionStatus::Connecting && active && s.is_recording {
                s.status = SessionStatus::Listening;
                modified = true;
            }
            if s.chunks_sent != chunks_sent {
                s.chunks_sent = chunks_sent;
                modified = true;
            }
            if let Some(capturing) = capturing {
                if s.is_recording != capturing {
                    s.is_recording = capturing;
                    modified = true;
                }
            }
            modified
        });
        corrected
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.sync_task).take() {
            task.abort();
        }
        if let Some(pump) = lock(&self.pump).take() {
            pump.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn spawn_sync(inner: Weak<Inner>, period: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        loop {
            ticker.tick().await;
            let Some(inner) = inner.upgrade() else {
                break;
            };
            inner.sync_connection_state();
        }
    })
}

/// Controller callbacks that update the view, then call the caller's
fn view_callbacks(
    state: Arc<watch::Sender<AssistantState>>,
    user: SessionCallbacks,
) -> SessionCallbacks {
    let mut callbacks = SessionCallbacks::new();

    let view = Arc::clone(&state);
    let next = user.on_shopping_list_updated.clone();
    callbacks = callbacks.on_shopping_list_updated(move |list| {
        view.send_modify(|s| s.shopping_list = Some(list.clone()));
        if let Some(handler) = &next {
            handler(list);
        }
    });

    callbacks.on_product_detected = user.on_product_detected.clone();

    let view = Arc::clone(&state);
    let next = user.on_transcript_received.clone();
    callbacks = callbacks.on_transcript_received(move |text, is_user| {
        view.send_modify(|s| {
            s.last_transcript = Some(Transcript {
                text: text.to_string(),
                is_user,
            })
        });
        if let Some(handler) = &next {
            handler(text, is_user);
        }
    });

    let view = Arc::clone(&state);
    let next = user.on_error.clone();
    callbacks = callbacks.on_error(move |err| {
        let message = err.user_message();
        view.send_modify(|s| {
            s.status = SessionStatus::Error;
            s.last_error = Some(message);
        });
        if let Some(handler) = &next {
            handler(err);
        }
    });

    let view = Arc::clone(&state);
    let next = user.on_status_change.clone();
    callbacks = callbacks.on_status_change(move |status| {
        view.send_modify(|s| s.status = status);
        if let Some(handler) = &next {
            handler(status);
        }
    });

    let view = state;
    let next = user.on_connection_status;
    callbacks.on_connection_status(move |connected| {
        view.send_modify(|s| {
            s.is_connected = connected;
            if connected && s.is_recording && s.status == SessionStatus::Connecting {
                s.status = SessionStatus::Listening;
            }
        });
        if let Some(handler) = &next {
            handler(connected);
        }
    })
}
