pub mod audio;
pub mod channel;
pub mod chat;
pub mod config;
pub mod error;
pub mod http;
pub mod session;

pub use audio::{
    AudioBuffer, AudioDevices, AudioFile, AudioFrame, CaptureBackend, CaptureConfig,
    CaptureEncoder, CaptureSource, FileDevices, OutputSink, Pcm16Decoder, WavSink, WireBlob,
};
pub use channel::{ChannelEvent, GeminiLiveConnector, RealtimeConnector, ServerEvent};
pub use chat::{ChatMessage, ChatService, GeminiClient, HistoryStore, Model, ModelRouter};
pub use config::Config;
pub use error::{DecodeError, SessionError};
pub use http::{create_router, AppState};
pub use session::{
    DeferredCommit, LiveSessionConfig, PerTurnCommit, SessionState, SessionStats, TurnSink,
    VoiceSession,
};
