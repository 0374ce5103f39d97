use anyhow::{Context, Result};
use chrono::Utc;
use hound::{SampleFormat, WavReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::capture::{AudioCapture, CaptureChunk, CaptureConfig};
use super::payload::AudioPayload;

pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;

        let spec = reader.spec();
        if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
            anyhow::bail!(
                "Unsupported WAV format: {:?} {}-bit (expected 16-bit PCM)",
                spec.sample_format,
                spec.bits_per_sample
            );
        }

        if spec.sample_rate == 0 || spec.channels == 0 {
            anyhow::bail!(
                "Invalid WAV header: {} Hz, {} channels",
                spec.sample_rate,
                spec.channels
            );
        }

        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Convert to the requested rate and channel count.
    ///
    /// Channels are averaged down to mono first; the rate change picks the
    /// nearest source frame, so no filtering is applied.
    pub fn convert(&self, sample_rate: u32, channels: u16) -> Result<Vec<i16>> {
        if sample_rate == 0 || channels == 0 {
            anyhow::bail!("Invalid target format: {}Hz {}ch", sample_rate, channels);
        }
        if self.sample_rate == sample_rate && self.channels == channels {
            return Ok(self.samples.clone());
        }

        let mono = downmix(&self.samples, self.channels);
        let resampled = resample_nearest(&mono, self.sample_rate, sample_rate);

        if channels == 1 {
            return Ok(resampled);
        }
        Ok(resampled
            .iter()
            .flat_map(|s| std::iter::repeat(*s).take(channels as usize))
            .collect())
    }
}

fn downmix(samples: &[i16], channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels as usize)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|s| *s as i32).sum();
            (sum / frame.len() as i32) as i16
        })
        .collect()
}

fn resample_nearest(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }
    if from_rate == 0 {
        return Vec::new();
    }
    let out_len = (samples.len() as u64 * to_rate as u64 / from_rate as u64) as usize;
    (0..out_len)
        .map(|i| {
            let src = (i as u64 * from_rate as u64 / to_rate as u64) as usize;
            samples[src.min(samples.len() - 1)]
        })
        .collect()
}

/// Capture backend that replays a WAV file as PCM chunks
pub struct FileCapture {
    path: PathBuf,
    paced: bool,
    capturing: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl FileCapture {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            paced: true,
            capturing: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    /// Emit chunks in real time (default) or as fast as the receiver drains
    pub fn paced(mut self, paced: bool) -> Self {
        self.paced = paced;
        self
    }
}

#[async_trait::async_trait]
impl AudioCapture for FileCapture {
    async fn start(&mut self, config: &CaptureConfig) -> Result<mpsc::Receiver<CaptureChunk>> {
        if self.is_capturing() {
            anyhow::bail!("File capture already running");
        }

        let file = AudioFile::open(&self.path)?;
        let samples = file.convert(config.sample_rate, config.channels)?;
        let per_chunk = config.samples_per_chunk();
        let interval = Duration::from_millis(config.chunk_interval_ms.max(1));
        let paced = self.paced;

        let chunks: Vec<Vec<i16>> = samples.chunks(per_chunk).map(|c| c.to_vec()).collect();
        info!(
            "Replaying {} as {} chunks of {}ms",
            file.path,
            chunks.len(),
            config.chunk_interval_ms
        );

        let (tx, rx) = mpsc::channel(32);
        let capturing = Arc::clone(&self.capturing);
        capturing.store(true, Ordering::SeqCst);

        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            for (index, chunk) in chunks.into_iter().enumerate() {
                if paced {
                    ticker.tick().await;
                }
                if !capturing.load(Ordering::SeqCst) {
                    break;
                }
                let chunk = CaptureChunk {
                    payload: AudioPayload::from_samples(&chunk),
                    timestamp_ms: Utc::now().timestamp_millis(),
                };
                if tx.send(chunk).await.is_err() {
                    debug!("Capture receiver dropped after {} chunks", index);
                    break;
                }
            }
            capturing.store(false, Ordering::SeqCst);
        }));

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.capturing.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
        info!("File capture stopped");
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "file"
    }
}
