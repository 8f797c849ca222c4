pub mod backend;
pub mod capture;
pub mod decoder;
pub mod encoder;
pub mod file;
pub mod mixer;
pub mod sink;

pub use backend::{AudioDevices, AudioFrame, CaptureBackend, CaptureConfig, CaptureSource, FileDevices};
pub use capture::FileCapture;
pub use decoder::{AudioBuffer, FrameDecoder, Pcm16Decoder};
pub use encoder::{decode_base64, CaptureEncoder, WireBlob, CAPTURE_MIME};
pub use file::AudioFile;
pub use mixer::{Placement, TimelineMixer};
pub use sink::{EndedSender, OutputSink, SinkState, SourceId, WavSink};
