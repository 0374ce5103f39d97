use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::capture::CaptureChunk;
use crate::session::SessionController;

/// Forwards captured chunks to the session controller.
///
/// Holds nothing beyond the chunk being forwarded; chunks that arrive while
/// the session is down are dropped.
#[derive(Clone)]
pub struct AudioBridge {
    controller: SessionController,
    counters: Arc<Counters>,
}

#[derive(Default)]
struct Counters {
    received: AtomicU64,
    dropped: AtomicU64,
}

impl AudioBridge {
    pub fn new(controller: SessionController) -> Self {
        Self {
            controller,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Encode and forward one chunk. Returns whether it reached the channel.
    pub fn handle_chunk(&self, chunk: CaptureChunk) -> bool {
        let received = self.counters.received.fetch_add(1, Ordering::Relaxed) + 1;

        let encoded = match chunk.payload.to_base64() {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!("Rejecting {} audio chunk #{}: {}", chunk.payload.kind(), received, e);
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        };

        if !self.controller.send_audio_chunk(encoded, chunk.timestamp_ms) {
            let dropped = self.counters.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            if dropped == 1 || dropped % 50 == 0 {
                debug!("Dropped {} audio chunks while disconnected", dropped);
            }
            return false;
        }

        true
    }

    /// Pump chunks until the capture side closes its channel
    pub async fn run(&self, mut chunks: mpsc::Receiver<CaptureChunk>) {
        while let Some(chunk) = chunks.recv().await {
            self.handle_chunk(chunk);
        }

        info!(
            "Audio bridge finished: {} chunks received, {} dropped",
            self.chunks_received(),
            self.chunks_dropped()
        );
    }

    pub fn chunks_received(&self) -> u64 {
        self.counters.received.load(Ordering::Relaxed)
    }

    pub fn chunks_dropped(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }
}
