// File-backed capture backend
//
// Replays a WAV file as fixed-size mono blocks, paced at the block duration
// so the stream behaves like a live microphone. In realtime mode the task
// never waits on the consumer: a block that finds the queue full is dropped.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::backend::{AudioFrame, CaptureBackend, CaptureConfig};
use super::file::AudioFile;

pub struct FileCapture {
    path: PathBuf,
    config: CaptureConfig,
    realtime: bool,
    enabled: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl FileCapture {
    pub fn new(path: PathBuf, config: CaptureConfig, realtime: bool) -> Self {
        Self {
            path,
            config,
            realtime,
            enabled: Arc::new(AtomicBool::new(true)),
            task: None,
        }
    }
}

#[async_trait::async_trait]
impl CaptureBackend for FileCapture {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.task.is_some() {
            bail!("Already capturing");
        }

        let path = self.path.clone();
        let target_rate = self.config.sample_rate;
        let samples = tokio::task::spawn_blocking(move || {
            AudioFile::open(&path).map(|audio| audio.to_mono(target_rate))
        })
        .await
        .context("Capture file loader panicked")?
        .with_context(|| format!("Failed to open capture file {}", self.path.display()))?;

        info!(
            "File capture started: {} ({} samples at {}Hz, {} per block)",
            self.path.display(),
            samples.len(),
            target_rate,
            self.config.block_size
        );

        let (tx, rx) = mpsc::channel(32);
        let enabled = Arc::clone(&self.enabled);
        let block_size = self.config.block_size.max(1);
        let block_duration = self.config.block_duration();
        let realtime = self.realtime;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(block_duration);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let block_ms = block_duration.as_millis() as u64;
            let mut overruns = 0u64;

            for (index, block) in samples.chunks(block_size).enumerate() {
                if realtime {
                    ticker.tick().await;
                }

                // Muted device: time passes, nothing is produced
                if !enabled.load(Ordering::SeqCst) {
                    continue;
                }

                let mut samples = block.to_vec();
                samples.resize(block_size, 0.0);

                let frame = AudioFrame {
                    samples,
                    sample_rate: target_rate,
                    channels: 1,
                    timestamp_ms: index as u64 * block_ms,
                };

                if realtime {
                    match tx.try_send(frame) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => overruns += 1,
                        Err(TrySendError::Closed(_)) => break,
                    }
                } else if tx.send(frame).await.is_err() {
                    break;
                }
            }

            if overruns > 0 {
                debug!("File capture dropped {} blocks on a full queue", overruns);
            }
            debug!("File capture reached end of input");
        });

        self.task = Some(task);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("File capture stopped: {}", self.path.display());
        }
        Ok(())
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn is_capturing(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    fn name(&self) -> &str {
        "file"
    }
}

impl Drop for FileCapture {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
