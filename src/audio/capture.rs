use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::payload::AudioPayload;

/// Sample encoding delivered by a capture backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleEncoding {
    /// 16-bit signed little-endian PCM
    #[default]
    Pcm16,
}

/// Configuration for a capture backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Target sample rate in Hz
    pub sample_rate: u32,
    /// Target channel count (1 = mono)
    pub channels: u16,
    pub encoding: SampleEncoding,
    /// How much audio each chunk carries
    pub chunk_interval_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000, // 16kHz for speech recognition
            channels: 1,        // Mono
            encoding: SampleEncoding::Pcm16,
            chunk_interval_ms: 250,
        }
    }
}

impl CaptureConfig {
    /// Samples (across all channels) in one chunk
    pub fn samples_per_chunk(&self) -> usize {
        let per_second = self.sample_rate as u64 * self.channels.max(1) as u64;
        ((per_second * self.chunk_interval_ms.max(1)) / 1000).max(1) as usize
    }
}

/// One chunk of captured audio
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureChunk {
    pub payload: AudioPayload,
    /// Epoch milliseconds when the chunk was produced
    pub timestamp_ms: i64,
}

/// Audio capture backend trait
///
/// Implementations:
/// - File: replay a WAV file (CLI demos, tests)
/// - Platform microphones live outside this crate and plug in here
#[async_trait::async_trait]
pub trait AudioCapture: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive audio chunks. The
    /// receiver ends when capture stops.
    async fn start(&mut self, config: &CaptureConfig) -> Result<mpsc::Receiver<CaptureChunk>>;

    /// Stop capturing audio
    async fn stop(&mut self) -> Result<()>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}
