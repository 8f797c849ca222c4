use thiserror::Error;

/// Errors that end a voice session and surface to the caller
#[derive(Debug, Error)]
pub enum SessionError {
    /// Microphone or output device could not be acquired
    #[error("audio device unavailable: {0}")]
    Device(String),

    /// The realtime channel failed to connect or reported an error
    #[error("realtime channel failed: {0}")]
    Channel(String),
}

/// Per-frame decode failures; the frame is dropped and the session continues
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid base64 audio payload: {0}")]
    Base64(String),

    #[error("PCM payload has odd byte length {0}")]
    OddLength(usize),

    #[error("empty audio payload")]
    Empty,

    #[error("decoder task failed: {0}")]
    Task(String),
}
