use serde::{Deserialize, Serialize};

use crate::audio::CaptureConfig;
use crate::channel::LiveConnectConfig;

pub const DEFAULT_LIVE_MODEL: &str = "gemini-2.5-flash-native-audio-preview-09-2025";

/// Configuration for a voice session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveSessionConfig {
    /// Identifier used in logs (e.g., "voice-7c0e...")
    pub session_id: String,

    /// Realtime model the channel connects to
    pub model: String,

    /// Microphone capture format and block size
    #[serde(skip)]
    pub capture: CaptureConfig,

    /// Sample rate of synthesized speech (the service sends 24kHz)
    pub playback_sample_rate: u32,

    /// Options sent when the channel connects
    pub connect: LiveConnectConfig,
}

impl Default for LiveSessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("voice-{}", uuid::Uuid::new_v4()),
            model: DEFAULT_LIVE_MODEL.to_string(),
            capture: CaptureConfig::default(),
            playback_sample_rate: 24000,
            connect: LiveConnectConfig::default(),
        }
    }
}
