pub mod bridge;
pub mod capture;
pub mod file;
pub mod payload;

pub use bridge::AudioBridge;
pub use capture::{AudioCapture, CaptureChunk, CaptureConfig, SampleEncoding};
pub use file::{AudioFile, FileCapture};
pub use payload::{AudioError, AudioPayload};
