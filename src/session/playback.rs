//! Gapless playback of synthesized speech
//!
//! Inbound frames are decoded concurrently by a `PlaybackQueue`, which
//! yields decoded buffers strictly in arrival order. Each buffer is then
//! committed to the `PlaybackScheduler`, which chains it directly after the
//! previous one on the output clock:
//!
//! ```text
//! start_at        = max(next_start_time, clock_now)
//! next_start_time = start_at + duration
//! ```
//!
//! so irregular arrival never produces gaps or overlaps, and late frames are
//! never scheduled in the past.

use futures::future::BoxFuture;
use futures::stream::{FuturesOrdered, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::audio::{AudioBuffer, FrameDecoder, OutputSink, SinkState, SourceId};
use crate::error::DecodeError;

pub struct PlaybackScheduler {
    sink: Arc<dyn OutputSink>,
    ended_tx: mpsc::UnboundedSender<SourceId>,
    next_start_time: f64,
    active: HashSet<SourceId>,
}

impl PlaybackScheduler {
    /// New scheduler with its cursor at 0
    ///
    /// The returned receiver yields ids of sources that finished playing;
    /// feed them back through [`PlaybackScheduler::source_ended`].
    pub fn new(sink: Arc<dyn OutputSink>) -> (Self, mpsc::UnboundedReceiver<SourceId>) {
        let (ended_tx, ended_rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            sink,
            ended_tx,
            next_start_time: 0.0,
            active: HashSet::new(),
        };
        (scheduler, ended_rx)
    }

    pub fn is_running(&self) -> bool {
        self.sink.state() == SinkState::Running
    }

    /// Chain `buffer` after everything already scheduled
    ///
    /// Returns the start time, or `None` if the frame was dropped because
    /// the output device is not running.
    pub fn schedule(&mut self, buffer: AudioBuffer) -> Option<f64> {
        if !self.is_running() {
            debug!("Output not running, dropping decoded frame");
            return None;
        }

        let buffer = Arc::new(buffer);
        let start_at = self.next_start_time.max(self.sink.current_time());

        let id = match self
            .sink
            .start_source(Arc::clone(&buffer), start_at, self.ended_tx.clone())
        {
            Ok(id) => id,
            Err(e) => {
                warn!("Failed to start playback source: {}", e);
                return None;
            }
        };

        self.next_start_time = start_at + buffer.duration();
        self.active.insert(id);

        Some(start_at)
    }

    /// Remove a finished source from the active set
    pub fn source_ended(&mut self, id: SourceId) {
        self.active.remove(&id);
    }

    /// Stop and forget every active source
    pub fn stop_all(&mut self) {
        for id in self.active.drain() {
            self.sink.stop_source(id);
        }
    }

    pub fn next_start_time(&self) -> f64 {
        self.next_start_time
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

/// Decodes inbound frames concurrently and yields them in arrival order
pub struct PlaybackQueue {
    decoder: Arc<dyn FrameDecoder>,
    pending: FuturesOrdered<BoxFuture<'static, Result<AudioBuffer, DecodeError>>>,
}

impl PlaybackQueue {
    pub fn new(decoder: Arc<dyn FrameDecoder>) -> Self {
        Self {
            decoder,
            pending: FuturesOrdered::new(),
        }
    }

    pub fn push(&mut self, bytes: Vec<u8>) {
        let decoder = Arc::clone(&self.decoder);
        self.pending
            .push_back(Box::pin(async move { decoder.decode(bytes).await }));
    }

    /// Next decode result in arrival order; `None` when nothing is pending
    pub async fn next_decoded(&mut self) -> Option<Result<AudioBuffer, DecodeError>> {
        self.pending.next().await
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
