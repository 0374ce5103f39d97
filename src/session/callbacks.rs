use std::fmt;
use std::sync::Arc;

use super::error::SessionError;
use crate::protocol::{ProductDetection, SessionStatus, ShoppingListSnapshot};

pub type ShoppingListHandler = Arc<dyn Fn(&ShoppingListSnapshot) + Send + Sync>;
pub type ProductHandler = Arc<dyn Fn(&ProductDetection) + Send + Sync>;
pub type TranscriptHandler = Arc<dyn Fn(&str, bool) + Send + Sync>;
pub type ErrorHandler = Arc<dyn Fn(&SessionError) + Send + Sync>;
pub type StatusHandler = Arc<dyn Fn(SessionStatus) + Send + Sync>;
pub type ConnectionHandler = Arc<dyn Fn(bool) + Send + Sync>;

/// Named event handlers, one subscriber per event.
///
/// Passing a partial set to `SessionController::set_callbacks` replaces only
/// the handlers that are set; the merge happens under a single lock.
#[derive(Clone, Default)]
pub struct SessionCallbacks {
    pub on_shopping_list_updated: Option<ShoppingListHandler>,
    pub on_product_detected: Option<ProductHandler>,
    /// Called with `(text, is_user)`
    pub on_transcript_received: Option<TranscriptHandler>,
    pub on_error: Option<ErrorHandler>,
    pub on_status_change: Option<StatusHandler>,
    pub on_connection_status: Option<ConnectionHandler>,
}

impl SessionCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_shopping_list_updated(
        mut self,
        handler: impl Fn(&ShoppingListSnapshot) + Send + Sync + 'static,
    ) -> Self {
        self.on_shopping_list_updated = Some(Arc::new(handler));
        self
    }

    pub fn on_product_detected(
        mut self,
        handler: impl Fn(&ProductDetection) + Send + Sync + 'static,
    ) -> Self {
        self.on_product_detected = Some(Arc::new(handler));
        self
    }

    pub fn on_transcript_received(
        mut self,
        handler: impl Fn(&str, bool) + Send + Sync + 'static,
    ) -> Self {
        self.on_transcript_received = Some(Arc::new(handler));
        self
    }

    pub fn on_error(mut self, handler: impl Fn(&SessionError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(handler));
        self
    }

    pub fn on_status_change(
        mut self,
        handler: impl Fn(SessionStatus) + Send + Sync + 'static,
    ) -> Self {
        self.on_status_change = Some(Arc::new(handler));
        self
    }

    pub fn on_connection_status(mut self, handler: impl Fn(bool) + Send + Sync + 'static) -> Self {
        self.on_connection_status = Some(Arc::new(handler));
        self
    }

    /// Take every handler that `other` sets, keep the rest
    pub fn merge(&mut self, other: SessionCallbacks) {
        if other.on_shopping_list_updated.is_some() {
            self.on_shopping_list_updated = other.on_shopping_list_updated;
        }
        if other.on_product_detected.is_some() {
            self.on_product_detected = other.on_product_detected;
        }
        if other.on_transcript_received.is_some() {
            self.on_transcript_received = other.on_transcript_received;
        }
        if other.on_error.is_some() {
            self.on_error = other.on_error;
        }
        if other.on_status_change.is_some() {
            self.on_status_change = other.on_status_change;
        }
        if other.on_connection_status.is_some() {
            self.on_connection_status = other.on_connection_status;
        }
    }
}

impl fmt::Debug for SessionCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCallbacks")
            .field("on_shopping_list_updated", &self.on_shopping_list_updated.is_some())
            .field("on_product_detected", &self.on_product_detected.is_some())
            .field("on_transcript_received", &self.on_transcript_received.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_status_change", &self.on_status_change.is_some())
            .field("on_connection_status", &self.on_connection_status.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_merge_keeps_unset_handlers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut callbacks = SessionCallbacks::new()
            .on_error(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .on_status_change(|_| {});

        callbacks.merge(SessionCallbacks::new().on_connection_status(|_| {}));

        assert!(callbacks.on_error.is_some());
        assert!(callbacks.on_status_change.is_some());
        assert!(callbacks.on_connection_status.is_some());
        assert!(callbacks.on_transcript_received.is_none());

        if let Some(on_error) = &callbacks.on_error {
            on_error(&SessionError::Remote("x".to_string()));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_merge_replaces_set_handlers() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let (a, b) = (Arc::clone(&first), Arc::clone(&second));

        let mut callbacks = SessionCallbacks::new().on_connection_status(move |_| {
            a.fetch_add(1, Ordering::SeqCst);
        });
        callbacks.merge(SessionCallbacks::new().on_connection_status(move |_| {
            b.fetch_add(1, Ordering::SeqCst);
        }));

        if let Some(handler) = &callbacks.on_connection_status {
            handler(true);
        }
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }
}
