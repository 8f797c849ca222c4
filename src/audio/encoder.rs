use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// MIME tag for outbound microphone audio
pub const CAPTURE_MIME: &str = "audio/pcm;rate=16000";

/// Base64 audio payload plus its encoding tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireBlob {
    /// Base64-encoded PCM bytes
    pub data: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

impl WireBlob {
    /// Wrap raw little-endian PCM16 bytes
    pub fn pcm(bytes: &[u8], sample_rate: u32) -> Self {
        Self {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            mime_type: pcm_mime(sample_rate),
        }
    }

    /// Sample rate declared by the MIME tag, if any
    pub fn sample_rate(&self) -> Option<u32> {
        self.mime_type
            .split(';')
            .filter_map(|param| param.trim().strip_prefix("rate="))
            .find_map(|rate| rate.parse().ok())
    }

    pub fn decode_bytes(&self) -> Result<Vec<u8>, DecodeError> {
        decode_base64(&self.data)
    }
}

pub fn pcm_mime(sample_rate: u32) -> String {
    format!("audio/pcm;rate={}", sample_rate)
}

pub fn decode_base64(data: &str) -> Result<Vec<u8>, DecodeError> {
    base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| DecodeError::Base64(e.to_string()))
}

/// Convert a float sample to 16-bit PCM: clamp to [-1, 1], scale by 32767, truncate
pub fn sample_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0) as i16
}

/// Turns capture blocks into wire blobs
#[derive(Debug, Clone, Copy)]
pub struct CaptureEncoder {
    sample_rate: u32,
}

impl Default for CaptureEncoder {
    fn default() -> Self {
        Self::new(16000)
    }
}

impl CaptureEncoder {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    pub fn encode(&self, samples: &[f32]) -> WireBlob {
        let pcm_bytes: Vec<u8> = samples
            .iter()
            .flat_map(|&s| sample_to_i16(s).to_le_bytes())
            .collect();

        WireBlob::pcm(&pcm_bytes, self.sample_rate)
    }
}
