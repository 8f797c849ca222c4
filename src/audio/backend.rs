use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::capture::FileCapture;
use super::sink::{OutputSink, WavSink};

/// Audio sample data (mono or interleaved, normalized to [-1, 1])
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Samples as floats
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Duration of this frame in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / (self.sample_rate as f64 * self.channels as f64)
    }
}

/// Configuration for microphone capture
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Capture sample rate (the realtime service expects 16kHz)
    pub sample_rate: u32,
    /// Channel count (1 = mono)
    pub channels: u16,
    /// Samples per capture block
    pub block_size: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000, // 16kHz for the realtime service
            channels: 1,        // Mono
            block_size: 4096,   // ~256ms blocks
        }
    }
}

impl CaptureConfig {
    /// Wall-clock duration of a single block
    pub fn block_duration(&self) -> std::time::Duration {
        let secs = self.block_size as f64 / self.sample_rate.max(1) as f64;
        std::time::Duration::from_secs_f64(secs)
    }
}

/// Audio capture backend trait
///
/// A backend owns the input device. While disabled (muted) it keeps the
/// device open but produces no frames.
#[async_trait::async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Acquire the device and start capturing
    ///
    /// Returns a channel receiver that will receive fixed-size blocks
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Release the device. Safe to call when not capturing.
    async fn stop(&mut self) -> Result<()>;

    /// Enable or disable frame production without releasing the device
    fn set_enabled(&self, enabled: bool);

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Device layer used by a voice session
///
/// Every session start opens a fresh capture backend and output sink.
pub trait AudioDevices: Send + Sync {
    fn open_capture(&self, config: &CaptureConfig) -> Result<Box<dyn CaptureBackend>>;

    fn open_output(&self, sample_rate: u32) -> Result<Arc<dyn OutputSink>>;
}

/// Capture source type
#[derive(Debug, Clone)]
pub enum CaptureSource {
    /// Live microphone input
    Microphone,
    /// Replay a WAV file as if it were a microphone
    File(PathBuf),
}

/// File-backed device layer
///
/// Capture replays a WAV file; playback is rendered to a WAV file on close.
#[derive(Debug, Clone)]
pub struct FileDevices {
    pub source: CaptureSource,
    pub output_path: Option<PathBuf>,
    /// Pace capture blocks in real time (disable for batch runs)
    pub realtime: bool,
}

impl AudioDevices for FileDevices {
    fn open_capture(&self, config: &CaptureConfig) -> Result<Box<dyn CaptureBackend>> {
        match &self.source {
            CaptureSource::Microphone => {
                anyhow::bail!("No microphone backend is available on this platform")
            }
            CaptureSource::File(path) => Ok(Box::new(FileCapture::new(
                path.clone(),
                config.clone(),
                self.realtime,
            ))),
        }
    }

    fn open_output(&self, sample_rate: u32) -> Result<Arc<dyn OutputSink>> {
        Ok(Arc::new(WavSink::new(sample_rate, self.output_path.clone())))
    }
}
