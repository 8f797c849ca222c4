// Integration tests for the file-backed audio devices
//
// These tests verify that a WAV file replays as fixed-size capture blocks and
// that the device layer hands out working capture and output devices.

use anyhow::Result;
use nexzi_chat::audio::{
    AudioDevices, AudioFrame, CaptureBackend, CaptureConfig, CaptureSource, FileCapture,
    FileDevices, SinkState,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_tone(path: &Path, sample_rate: u32, frames: usize) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for _ in 0..frames {
        writer.write_sample(8192i16)?;
    }
    writer.finalize()?;
    Ok(())
}

fn small_blocks() -> CaptureConfig {
    CaptureConfig {
        sample_rate: 16000,
        channels: 1,
        block_size: 1000,
    }
}

async fn drain(rx: &mut tokio::sync::mpsc::Receiver<AudioFrame>) -> Vec<AudioFrame> {
    let mut frames = Vec::new();
    while let Some(frame) = rx.recv().await {
        frames.push(frame);
    }
    frames
}

#[test]
fn test_capture_config_default() {
    let config = CaptureConfig::default();

    assert_eq!(config.sample_rate, 16000, "Default should be 16kHz");
    assert_eq!(config.channels, 1, "Default should be mono");
    assert_eq!(config.block_size, 4096);
    assert_eq!(config.block_duration().as_millis(), 256);
}

#[test]
fn test_audio_frame_duration() {
    let frame = AudioFrame {
        samples: vec![0.0; 3200],
        sample_rate: 16000,
        channels: 2,
        timestamp_ms: 0,
    };

    assert!((frame.duration_secs() - 0.1).abs() < 1e-9);
}

#[tokio::test]
async fn test_file_capture_emits_fixed_blocks() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("mic.wav");
    write_tone(&path, 16000, 2500)?;

    let mut capture = FileCapture::new(path, small_blocks(), false);
    let mut rx = capture.start().await?;
    let frames = drain(&mut rx).await;

    // 2500 samples in 1000-sample blocks, last block zero-padded
    assert_eq!(frames.len(), 3);
    assert!(frames.iter().all(|f| f.samples.len() == 1000));
    assert_eq!(frames[2].samples[499], 0.25);
    assert_eq!(frames[2].samples[500], 0.0);
    assert_eq!(frames[1].timestamp_ms, 62);

    capture.stop().await?;
    assert!(!capture.is_capturing());
    Ok(())
}

#[tokio::test]
async fn test_file_capture_resamples_to_capture_rate() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("mic48k.wav");
    write_tone(&path, 48000, 6000)?;

    let mut capture = FileCapture::new(path, small_blocks(), false);
    let mut rx = capture.start().await?;
    let frames = drain(&mut rx).await;

    // 6000 samples at 48kHz become 2000 at 16kHz
    assert_eq!(frames.len(), 2);
    assert!(frames.iter().all(|f| f.sample_rate == 16000));
    Ok(())
}

#[tokio::test]
async fn test_disabled_capture_produces_nothing() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("muted.wav");
    write_tone(&path, 16000, 5000)?;

    let mut capture = FileCapture::new(path, small_blocks(), false);
    capture.set_enabled(false);
    let mut rx = capture.start().await?;

    assert!(drain(&mut rx).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_file_capture_missing_file() {
    let mut capture = FileCapture::new(
        PathBuf::from("/nonexistent/mic.wav"),
        CaptureConfig::default(),
        false,
    );

    assert!(capture.start().await.is_err());
    assert!(!capture.is_capturing());
}

#[tokio::test]
async fn test_file_devices() -> Result<()> {
    let dir = TempDir::new()?;
    let input = dir.path().join("in.wav");
    let output = dir.path().join("out.wav");
    write_tone(&input, 16000, 100)?;

    let devices = FileDevices {
        source: CaptureSource::File(input),
        output_path: Some(output.clone()),
        realtime: false,
    };

    let capture = devices.open_capture(&CaptureConfig::default())?;
    assert_eq!(capture.name(), "file");

    let sink = devices.open_output(24000)?;
    assert_eq!(sink.sample_rate(), 24000);
    assert_eq!(sink.state(), SinkState::Running);
    sink.close()?;

    // Nothing was scheduled: an empty but valid WAV
    let reader = hound::WavReader::open(&output)?;
    assert_eq!(reader.spec().sample_rate, 24000);
    assert_eq!(reader.len(), 0);
    Ok(())
}

#[tokio::test]
async fn test_realtime_capture_never_waits_on_consumer() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("long.wav");
    // 200 blocks of 1ms, nobody reading
    write_tone(&path, 16000, 3200)?;

    let config = CaptureConfig {
        sample_rate: 16000,
        channels: 1,
        block_size: 16,
    };
    let mut capture = FileCapture::new(path, config, true);
    let mut rx = capture.start().await?;

    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    assert!(!capture.is_capturing());

    // Only what fit in the queue survives; later blocks were dropped
    let frames = drain(&mut rx).await;
    assert_eq!(frames.len(), 32);
    assert_eq!(frames[0].timestamp_ms, 0);
    assert_eq!(frames[31].timestamp_ms, 31);
    Ok(())
}

#[test]
fn test_microphone_unavailable() {
    let devices = FileDevices {
        source: CaptureSource::Microphone,
        output_path: None,
        realtime: false,
    };

    assert!(devices.open_capture(&CaptureConfig::default()).is_err());
}
