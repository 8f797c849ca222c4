use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::decoder::AudioBuffer;
use super::encoder::sample_to_i16;
use super::mixer::{Placement, TimelineMixer};

/// Identity of a started playback source
pub type SourceId = u64;

/// Notified with a source id once that source has finished or been stopped
pub type EndedSender = mpsc::UnboundedSender<SourceId>;

/// Output device state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    Running,
    Suspended,
    Closed,
}

/// Audio output device with a monotonic playback clock
pub trait OutputSink: Send + Sync {
    fn sample_rate(&self) -> u32;

    fn state(&self) -> SinkState;

    /// Seconds since the device was opened
    fn current_time(&self) -> f64;

    /// Schedule `buffer` to start at `start_at` seconds on the device clock
    fn start_source(
        &self,
        buffer: Arc<AudioBuffer>,
        start_at: f64,
        ended: EndedSender,
    ) -> Result<SourceId>;

    /// Stop a source early. Unknown or finished ids are ignored.
    fn stop_source(&self, id: SourceId);

    /// Close the device. Closing twice is a no-op.
    fn close(&self) -> Result<()>;
}

struct PlayingSource {
    placement_index: usize,
    timer: JoinHandle<()>,
    ended: EndedSender,
}

/// Output sink that renders the scheduled timeline to a WAV file on close
///
/// Playback timing follows the tokio clock, so end-of-playback
/// notifications fire when a real device would have finished the buffer.
pub struct WavSink {
    sample_rate: u32,
    origin: Instant,
    output_path: Option<PathBuf>,
    state: Mutex<SinkState>,
    placements: Mutex<Vec<Placement>>,
    playing: Arc<Mutex<HashMap<SourceId, PlayingSource>>>,
    next_id: AtomicU64,
}

impl WavSink {
    pub fn new(sample_rate: u32, output_path: Option<PathBuf>) -> Self {
        info!(
            "Output sink opened: {}Hz mono{}",
            sample_rate,
            output_path
                .as_ref()
                .map(|p| format!(", rendering to {}", p.display()))
                .unwrap_or_default()
        );

        Self {
            sample_rate,
            origin: Instant::now(),
            output_path,
            state: Mutex::new(SinkState::Running),
            placements: Mutex::new(Vec::new()),
            playing: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn suspend(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == SinkState::Running {
            *state = SinkState::Suspended;
        }
    }

    pub fn resume(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == SinkState::Suspended {
            *state = SinkState::Running;
        }
    }

    /// Mixed timeline of everything scheduled so far
    pub fn render(&self) -> Vec<f32> {
        let placements = self.placements.lock().unwrap_or_else(PoisonError::into_inner);
        TimelineMixer::new(self.sample_rate).render(&placements)
    }

    fn seconds_to_frame(&self, seconds: f64) -> usize {
        (seconds.max(0.0) * self.sample_rate as f64).round() as usize
    }

    fn write_wav(&self, path: &PathBuf, timeline: &[f32]) -> Result<()> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer = hound::WavWriter::create(path, spec)
            .with_context(|| format!("Failed to create WAV file: {:?}", path))?;

        for &sample in timeline {
            writer
                .write_sample(sample_to_i16(sample))
                .context("Failed to write sample to WAV")?;
        }

        writer.finalize().context("Failed to finalize WAV file")?;

        info!(
            "Playback rendered to {} ({:.1}s)",
            path.display(),
            timeline.len() as f64 / self.sample_rate.max(1) as f64
        );

        Ok(())
    }
}

impl OutputSink for WavSink {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn state(&self) -> SinkState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_time(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }

    fn start_source(
        &self,
        buffer: Arc<AudioBuffer>,
        start_at: f64,
        ended: EndedSender,
    ) -> Result<SourceId> {
        if self.state() != SinkState::Running {
            bail!("Output sink is not running");
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let duration = buffer.duration();
        let start_frame = self.seconds_to_frame(start_at);

        let placement_index = {
            let mut placements = self.placements.lock().unwrap_or_else(PoisonError::into_inner);
            placements.push(Placement {
                start_frame,
                buffer,
                stop_frame: None,
            });
            placements.len() - 1
        };

        let finish_at = self.origin + std::time::Duration::from_secs_f64((start_at + duration).max(0.0));
        let playing = Arc::clone(&self.playing);
        let timer_ended = ended.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep_until(finish_at).await;
            playing
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&id);
            let _ = timer_ended.send(id);
        });

        self.playing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                id,
                PlayingSource {
                    placement_index,
                    timer,
                    ended,
                },
            );

        debug!("Source {} scheduled at {:.3}s ({:.3}s long)", id, start_at, duration);

        Ok(id)
    }

    fn stop_source(&self, id: SourceId) {
        let source = self
            .playing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);

        if let Some(source) = source {
            source.timer.abort();
            let stop_frame = self.seconds_to_frame(self.current_time());
            if let Some(placement) = self
                .placements
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get_mut(source.placement_index)
            {
                placement.stop_frame = Some(stop_frame);
            }
            let _ = source.ended.send(id);
        }
    }

    fn close(&self) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state == SinkState::Closed {
                return Ok(());
            }
            *state = SinkState::Closed;
        }

        let remaining: Vec<SourceId> = self
            .playing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        for id in remaining {
            self.stop_source(id);
        }

        info!("Output sink closed");

        if let Some(path) = &self.output_path {
            let timeline = self.render();
            self.write_wav(path, &timeline)?;
        }

        Ok(())
    }
}

impl Drop for WavSink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close output sink on drop: {}", e);
        }
    }
}
