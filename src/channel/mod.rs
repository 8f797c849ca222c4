//! Realtime speech channel
//!
//! The session pipeline only relies on the contract defined here:
//! - `RealtimeConnector::connect` returns immediately with a handle
//! - the handle's event stream yields `Open` once audio may be sent,
//!   then any number of `Message`s, and finally `Error` or `Closed`
//! - `send_realtime_input` never blocks; delivery failures are not reported

pub mod gemini;
pub mod messages;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::audio::WireBlob;

pub use gemini::GeminiLiveConnector;

/// One message from the realtime service, already demultiplexed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerEvent {
    /// Fragment of the user's speech-to-text
    pub input_transcript: Option<String>,
    /// Fragment of the synthesized speech text
    pub output_transcript: Option<String>,
    pub turn_complete: bool,
    /// Base64 PCM16 synthesized audio
    pub audio: Option<String>,
}

/// Lifecycle and data events delivered by a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Open,
    Message(ServerEvent),
    Error(String),
    Closed,
}

/// Output modality requested from the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modality {
    Audio,
}

/// Session options sent when connecting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveConnectConfig {
    pub response_modalities: Vec<Modality>,
    /// Ask the service to transcribe the user's speech
    pub input_transcription: bool,
    /// Ask the service to transcribe its own speech
    pub output_transcription: bool,
}

impl Default for LiveConnectConfig {
    fn default() -> Self {
        Self {
            response_modalities: vec![Modality::Audio],
            input_transcription: true,
            output_transcription: true,
        }
    }
}

/// Outbound half of an open channel
pub trait RealtimeChannel: Send + Sync {
    /// Queue an audio blob for delivery (fire-and-forget)
    fn send_realtime_input(&self, blob: WireBlob);

    /// Close the channel. Closing twice is a no-op.
    fn close(&self);
}

/// A connected (or connecting) channel plus its event stream
pub struct ChannelHandle {
    pub channel: Arc<dyn RealtimeChannel>,
    pub events: mpsc::Receiver<ChannelEvent>,
}

#[async_trait::async_trait]
pub trait RealtimeConnector: Send + Sync {
    async fn connect(&self, model: &str, config: &LiveConnectConfig) -> Result<ChannelHandle>;
}
