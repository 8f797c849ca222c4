use crate::error::DecodeError;

/// Decoded audio ready for playback
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Interleaved samples in [-1, 1)
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioBuffer {
    /// Playback duration in seconds
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }
}

/// Inbound audio decoder
///
/// Decodes run concurrently; callers must not assume they complete in
/// submission order.
#[async_trait::async_trait]
pub trait FrameDecoder: Send + Sync {
    async fn decode(&self, bytes: Vec<u8>) -> Result<AudioBuffer, DecodeError>;
}

/// Little-endian PCM16 decoder for synthesized speech (24kHz mono by default)
#[derive(Debug, Clone, Copy)]
pub struct Pcm16Decoder {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for Pcm16Decoder {
    fn default() -> Self {
        Self {
            sample_rate: 24000,
            channels: 1,
        }
    }
}

#[async_trait::async_trait]
impl FrameDecoder for Pcm16Decoder {
    async fn decode(&self, bytes: Vec<u8>) -> Result<AudioBuffer, DecodeError> {
        let Self {
            sample_rate,
            channels,
        } = *self;

        tokio::task::spawn_blocking(move || decode_pcm16(&bytes, sample_rate, channels))
            .await
            .map_err(|e| DecodeError::Task(e.to_string()))?
    }
}

pub fn decode_pcm16(bytes: &[u8], sample_rate: u32, channels: u16) -> Result<AudioBuffer, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    if bytes.len() % 2 != 0 {
        return Err(DecodeError::OddLength(bytes.len()));
    }

    let samples = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect();

    Ok(AudioBuffer {
        samples,
        sample_rate,
        channels,
    })
}
