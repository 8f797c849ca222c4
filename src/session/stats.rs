use chrono::{DateTime, Utc};
use serde::Serialize;

use super::state::SessionState;

/// Snapshot of a voice session
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub state: SessionState,

    /// When the current session was started, if any
    pub started_at: Option<DateTime<Utc>>,

    /// Capture blocks sent to the channel
    pub frames_sent: u64,

    /// Synthesized frames handed to the output device
    pub frames_scheduled: u64,

    /// Synthesized frames dropped (output not running or undecodable)
    pub frames_dropped: u64,

    /// Turns passed to the turn sink
    pub turns_committed: u64,

    /// Playback sources currently playing or waiting to play
    pub active_sources: usize,

    /// Output clock time at which the next frame would start
    pub playback_cursor: f64,
}
