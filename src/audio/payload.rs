use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

/// Audio payload as handed over by a capture backend.
///
/// Decoded once at the bridge edge into the base64 text the wire expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioPayload {
    /// Already base64-encoded PCM
    Base64(String),
    /// Byte buffer where only the first `len` bytes are valid
    Buffer { data: Vec<u8>, len: usize },
    /// Raw PCM bytes
    Bytes(Vec<u8>),
    /// Anything a backend could not represent; always rejected
    Unsupported { kind: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AudioError {
    #[error("audio payload is empty")]
    Empty,

    #[error("buffer length {len} exceeds its {capacity} bytes")]
    LengthOutOfRange { len: usize, capacity: usize },

    #[error("payload is not valid base64: {0}")]
    InvalidBase64(String),

    #[error("unsupported audio payload: {kind}")]
    Unsupported { kind: String },
}

impl AudioPayload {
    /// Interleaved i16 samples as little-endian PCM bytes
    pub fn from_samples(samples: &[i16]) -> Self {
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for sample in samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        AudioPayload::Bytes(bytes)
    }

    pub fn kind(&self) -> &str {
        match self {
            AudioPayload::Base64(_) => "base64",
            AudioPayload::Buffer { .. } => "buffer",
            AudioPayload::Bytes(_) => "bytes",
            AudioPayload::Unsupported { kind } => kind,
        }
    }

    /// Encode for the `audio_data` field of an `audio_chunk` frame
    pub fn to_base64(&self) -> Result<String, AudioError> {
        match self {
            AudioPayload::Base64(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return Err(AudioError::Empty);
                }
                STANDARD
                    .decode(text)
                    .map_err(|e| AudioError::InvalidBase64(e.to_string()))?;
                Ok(text.to_string())
            }
            AudioPayload::Buffer { data, len } => {
                if *len > data.len() {
                    return Err(AudioError::LengthOutOfRange {
                        len: *len,
                        capacity: data.len(),
                    });
                }
                if *len == 0 {
                    return Err(AudioError::Empty);
                }
                Ok(STANDARD.encode(&data[..*len]))
            }
            AudioPayload::Bytes(bytes) => {
                if bytes.is_empty() {
                    return Err(AudioError::Empty);
                }
                Ok(STANDARD.encode(bytes))
            }
            AudioPayload::Unsupported { kind } => Err(AudioError::Unsupported { kind: kind.clone() }),
        }
    }
}
