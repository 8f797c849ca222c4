//! Voice session management
//!
//! This module provides the `VoiceSession` abstraction that manages:
//! - Microphone capture and encoding for the realtime channel
//! - Transcript accumulation into finalized turns
//! - Gapless playback scheduling of synthesized speech
//! - Session state and resource lifetime

mod commit;
mod config;
mod playback;
mod session;
mod state;
mod stats;
mod transcript;

pub use commit::{DeferredCommit, PerTurnCommit, TurnSink};
pub use config::{LiveSessionConfig, DEFAULT_LIVE_MODEL};
pub use playback::{PlaybackQueue, PlaybackScheduler};
pub use session::VoiceSession;
pub use state::{transition, SessionEvent, SessionState};
pub use stats::SessionStats;
pub use transcript::{TranscriptAccumulator, Turn};
