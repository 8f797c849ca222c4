use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::audio::CaptureConfig;
use crate::chat::gemini::GEMINI_API_BASE;
use crate::channel::gemini::GEMINI_LIVE_WS_URL;
use crate::session::{LiveSessionConfig, DEFAULT_LIVE_MODEL};

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub gemini: GeminiConfig,
    pub audio: AudioConfig,
    pub history: HistoryConfig,
    pub chat: ChatConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct GeminiConfig {
    /// Falls back to `GEMINI_API_KEY` when empty
    pub api_key: String,
    pub chat_model: String,
    pub live_model: String,
    pub base_url: String,
    pub live_url: String,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    pub capture_sample_rate: u32,
    pub playback_sample_rate: u32,
    pub block_size: usize,
}

#[derive(Debug, Deserialize)]
pub struct HistoryConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct ChatConfig {
    /// Simulated latency of the local mock models
    pub mock_delay_ms: u64,
}

impl Config {
    /// Defaults, then `<path>.toml` if present, then `NEXZI__*` environment variables
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("service.name", "nexzi-chat")?
            .set_default("service.http.bind", "127.0.0.1")?
            .set_default("service.http.port", 8787_i64)?
            .set_default("gemini.api_key", "")?
            .set_default("gemini.chat_model", "gemini-2.5-flash")?
            .set_default("gemini.live_model", DEFAULT_LIVE_MODEL)?
            .set_default("gemini.base_url", GEMINI_API_BASE)?
            .set_default("gemini.live_url", GEMINI_LIVE_WS_URL)?
            .set_default("audio.capture_sample_rate", 16000_i64)?
            .set_default("audio.playback_sample_rate", 24000_i64)?
            .set_default("audio.block_size", 4096_i64)?
            .set_default("history.path", "data/chat-histories.json")?
            .set_default("chat.mock_delay_ms", 1000_i64)?
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("NEXZI").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let mut cfg: Config = settings
            .try_deserialize()
            .context("Invalid configuration")?;

        if cfg.gemini.api_key.is_empty() {
            cfg.gemini.api_key = std::env::var("GEMINI_API_KEY").unwrap_or_default();
        }

        Ok(cfg)
    }

    pub fn mock_delay(&self) -> Duration {
        Duration::from_millis(self.chat.mock_delay_ms)
    }

    /// Voice session settings derived from the audio and gemini sections
    pub fn live_session(&self) -> LiveSessionConfig {
        LiveSessionConfig {
            model: self.gemini.live_model.clone(),
            capture: CaptureConfig {
                sample_rate: self.audio.capture_sample_rate,
                channels: 1,
                block_size: self.audio.block_size,
            },
            playback_sample_rate: self.audio.playback_sample_rate,
            ..LiveSessionConfig::default()
        }
    }
}
