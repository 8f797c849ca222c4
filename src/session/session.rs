use super::commit::TurnSink;
use super::config::LiveSessionConfig;
use super::playback::{PlaybackQueue, PlaybackScheduler};
use super::state::{transition, SessionEvent, SessionState};
use super::stats::SessionStats;
use super::transcript::TranscriptAccumulator;
use crate::audio::{
    decode_base64, AudioBuffer, AudioDevices, AudioFrame, CaptureBackend, CaptureEncoder,
    FrameDecoder, OutputSink, SinkState, SourceId,
};
use crate::channel::{ChannelEvent, RealtimeChannel, RealtimeConnector, ServerEvent};
use crate::error::{DecodeError, SessionError};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Aborts the wrapped task when dropped
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[derive(Default)]
struct Counters {
    frames_sent: AtomicU64,
    frames_scheduled: AtomicU64,
    frames_dropped: AtomicU64,
    turns_committed: AtomicU64,
}

/// Everything a running session holds; dropped as one value on teardown
struct SessionResources {
    generation: u64,
    capture: Box<dyn CaptureBackend>,
    /// Capture frames waiting for the channel to open
    capture_rx: Option<mpsc::Receiver<AudioFrame>>,
    sink: Arc<dyn OutputSink>,
    channel: Arc<dyn RealtimeChannel>,
    scheduler: Arc<Mutex<PlaybackScheduler>>,
    pump: Option<AbortOnDrop>,
    driver: Option<JoinHandle<()>>,
}

impl SessionResources {
    /// Release everything in teardown order
    ///
    /// `abort_driver` is false when the driver itself is tearing down.
    async fn release(mut self, abort_driver: bool) {
        drop(self.pump.take());
        if let Some(driver) = self.driver.take() {
            if abort_driver {
                driver.abort();
            }
        }

        if let Err(e) = self.capture.stop().await {
            warn!("Failed to stop capture: {:#}", e);
        }

        self.scheduler.lock().await.stop_all();

        if self.sink.state() != SinkState::Closed {
            if let Err(e) = self.sink.close() {
                warn!("Failed to close output: {:#}", e);
            }
        }

        self.channel.close();
    }

    /// Synchronous best-effort release used from `Drop`
    fn abort(mut self) {
        drop(self.pump.take());
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
        if let Ok(mut scheduler) = self.scheduler.try_lock() {
            scheduler.stop_all();
        }
        if self.sink.state() != SinkState::Closed {
            if let Err(e) = self.sink.close() {
                warn!("Failed to close output: {:#}", e);
            }
        }
        self.channel.close();
    }
}

struct SessionInner {
    config: LiveSessionConfig,
    devices: Arc<dyn AudioDevices>,
    connector: Arc<dyn RealtimeConnector>,
    decoder: Arc<dyn FrameDecoder>,
    turns: Arc<dyn TurnSink>,
    state: watch::Sender<SessionState>,
    caption: watch::Sender<String>,
    muted: AtomicBool,
    generation: AtomicU64,
    started_at: std::sync::Mutex<Option<DateTime<Utc>>>,
    resources: Mutex<Option<SessionResources>>,
    counters: Arc<Counters>,
}

/// A realtime voice conversation
///
/// Microphone audio is streamed to the realtime channel while the channel's
/// transcripts and synthesized speech are fed to the transcript accumulator
/// and the playback scheduler. Finalized turns go to the `TurnSink`.
pub struct VoiceSession {
    inner: Arc<SessionInner>,
}

impl VoiceSession {
    pub fn new(
        config: LiveSessionConfig,
        devices: Arc<dyn AudioDevices>,
        connector: Arc<dyn RealtimeConnector>,
        decoder: Arc<dyn FrameDecoder>,
        turns: Arc<dyn TurnSink>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        let (caption, _) = watch::channel(String::new());

        Self {
            inner: Arc::new(SessionInner {
                config,
                devices,
                connector,
                decoder,
                turns,
                state,
                caption,
                muted: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                started_at: std::sync::Mutex::new(None),
                resources: Mutex::new(None),
                counters: Arc::new(Counters::default()),
            }),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.inner.config.session_id
    }

    /// Acquire devices and connect
    ///
    /// Returns once the channel is connecting; the state becomes `Active`
    /// when the channel opens. Ignored while already connecting or active.
    pub async fn start(&self) -> Result<(), SessionError> {
        self.inner.start().await
    }

    /// Tear everything down and return to `Idle`. Safe from any state.
    pub async fn stop(&self) {
        self.inner.stop().await;
    }

    /// Stop and hand control back to the turn sink
    pub async fn exit(&self) {
        self.inner.stop().await;
        self.inner.turns.on_exit();
    }

    /// Mute or unmute the microphone without tearing down
    pub async fn set_muted(&self, muted: bool) {
        self.inner.muted.store(muted, Ordering::SeqCst);
        if let Some(resources) = self.inner.resources.lock().await.as_ref() {
            resources.capture.set_enabled(!muted);
        }
        info!("Microphone {}", if muted { "muted" } else { "unmuted" });
    }

    pub fn is_muted(&self) -> bool {
        self.inner.muted.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Live caption of the bot's current turn
    pub fn subscribe_caption(&self) -> watch::Receiver<String> {
        self.inner.caption.subscribe()
    }

    /// Playback cursor of the running session
    pub async fn playback_cursor(&self) -> Option<f64> {
        let scheduler = self
            .inner
            .resources
            .lock()
            .await
            .as_ref()
            .map(|r| Arc::clone(&r.scheduler))?;
        let cursor = scheduler.lock().await.next_start_time();
        Some(cursor)
    }

    pub async fn stats(&self) -> SessionStats {
        let scheduler = self
            .inner
            .resources
            .lock()
            .await
            .as_ref()
            .map(|r| Arc::clone(&r.scheduler));

        let (active_sources, playback_cursor) = match scheduler {
            Some(scheduler) => {
                let scheduler = scheduler.lock().await;
                (scheduler.active_count(), scheduler.next_start_time())
            }
            None => (0, 0.0),
        };

        let counters = &self.inner.counters;
        SessionStats {
            state: self.state(),
            started_at: *self
                .inner
                .started_at
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
            frames_sent: counters.frames_sent.load(Ordering::SeqCst),
            frames_scheduled: counters.frames_scheduled.load(Ordering::SeqCst),
            frames_dropped: counters.frames_dropped.load(Ordering::SeqCst),
            turns_committed: counters.turns_committed.load(Ordering::SeqCst),
            active_sources,
            playback_cursor,
        }
    }
}

impl Drop for VoiceSession {
    fn drop(&mut self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut guard) = self.inner.resources.try_lock() {
            if let Some(resources) = guard.take() {
                resources.abort();
            }
        }
    }
}

impl SessionInner {
    /// Apply a state machine event; returns whether it was accepted
    fn apply(&self, event: SessionEvent) -> bool {
        let mut accepted = false;
        self.state.send_if_modified(|state| match transition(*state, event) {
            Some(next) => {
                accepted = true;
                let changed = next != *state;
                if changed {
                    debug!("Session state {:?} -> {:?} ({:?})", *state, next, event);
                }
                *state = next;
                changed
            }
            None => false,
        });
        accepted
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    async fn start(self: &Arc<Self>) -> Result<(), SessionError> {
        if !self.apply(SessionEvent::StartRequested) {
            warn!("Voice session already started");
            return Ok(());
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.caption.send_replace(String::new());
        *self.started_at.lock().unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
        self.turns.on_start();

        info!(
            "Starting voice session {} with {}",
            self.config.session_id, self.config.model
        );

        let (resources, events, ended_rx) = match self.acquire(generation).await {
            Ok(acquired) => acquired,
            Err((event, err)) => {
                // A stop that overtook this start already settled the state
                if !self.is_current(generation) {
                    return Ok(());
                }
                error!("Voice session failed to start: {}", err);
                self.apply(event);
                return Err(err);
            }
        };

        let mut guard = self.resources.lock().await;
        if !self.is_current(generation) {
            drop(guard);
            info!("Voice session stopped while connecting, releasing devices");
            resources.release(true).await;
            return Ok(());
        }

        let scheduler = Arc::clone(&resources.scheduler);
        let mut resources = resources;
        resources.driver = Some(tokio::spawn(Arc::clone(self).drive(
            generation,
            events,
            ended_rx,
            scheduler,
        )));
        *guard = Some(resources);

        Ok(())
    }

    /// Open capture, then output, then the channel; on failure release
    /// whatever was already acquired
    async fn acquire(
        &self,
        generation: u64,
    ) -> Result<
        (
            SessionResources,
            mpsc::Receiver<ChannelEvent>,
            mpsc::UnboundedReceiver<SourceId>,
        ),
        (SessionEvent, SessionError),
    > {
        let device_failed =
            |e: anyhow::Error| (SessionEvent::DeviceFailed, SessionError::Device(format!("{:#}", e)));

        let mut capture = self
            .devices
            .open_capture(&self.config.capture)
            .map_err(device_failed)?;
        capture.set_enabled(!self.muted.load(Ordering::SeqCst));
        let capture_rx = capture.start().await.map_err(device_failed)?;
        debug!("Capture backend '{}' started", capture.name());

        let sink = match self.devices.open_output(self.config.playback_sample_rate) {
            Ok(sink) => sink,
            Err(e) => {
                stop_capture(capture.as_mut()).await;
                return Err(device_failed(e));
            }
        };

        let handle = match self
            .connector
            .connect(&self.config.model, &self.config.connect)
            .await
        {
            Ok(handle) => handle,
            Err(e) => {
                stop_capture(capture.as_mut()).await;
                if let Err(e) = sink.close() {
                    warn!("Failed to close output: {:#}", e);
                }
                return Err((
                    SessionEvent::ChannelFailed,
                    SessionError::Channel(format!("{:#}", e)),
                ));
            }
        };

        let (scheduler, ended_rx) = PlaybackScheduler::new(Arc::clone(&sink));

        let resources = SessionResources {
            generation,
            capture,
            capture_rx: Some(capture_rx),
            sink,
            channel: handle.channel,
            scheduler: Arc::new(Mutex::new(scheduler)),
            pump: None,
            driver: None,
        };

        Ok((resources, handle.events, ended_rx))
    }

    async fn stop(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);

        let mut guard = self.resources.lock().await;
        if let Some(resources) = guard.take() {
            info!("Stopping voice session {}", self.config.session_id);
            resources.release(true).await;
        }
        self.apply(SessionEvent::StopRequested);
        self.caption.send_replace(String::new());
    }

    /// Teardown initiated by the driver; ignored if a newer session owns the resources
    async fn teardown(&self, generation: u64, event: SessionEvent) {
        let mut guard = self.resources.lock().await;
        if guard.as_ref().map(|r| r.generation) != Some(generation) {
            return;
        }
        if let Some(resources) = guard.take() {
            resources.release(false).await;
        }
        self.apply(event);
        self.caption.send_replace(String::new());
    }

    /// Wire capture to the channel once it is open
    async fn on_open(&self, generation: u64) {
        let mut guard = self.resources.lock().await;
        let Some(resources) = guard.as_mut().filter(|r| r.generation == generation) else {
            return;
        };

        if transition(*self.state.borrow(), SessionEvent::ChannelOpened).is_none() {
            return;
        }

        // Wire the pump before announcing Active so no block slips past the drain
        if let Some(mut capture_rx) = resources.capture_rx.take() {
            let mut discarded = 0;
            while capture_rx.try_recv().is_ok() {
                discarded += 1;
            }
            if discarded > 0 {
                debug!("Discarded {} capture blocks recorded before open", discarded);
            }

            let channel = Arc::clone(&resources.channel);
            let counters = Arc::clone(&self.counters);
            let encoder = CaptureEncoder::new(self.config.capture.sample_rate);

            resources.pump = Some(AbortOnDrop(tokio::spawn(async move {
                while let Some(frame) = capture_rx.recv().await {
                    channel.send_realtime_input(encoder.encode(&frame.samples));
                    counters.frames_sent.fetch_add(1, Ordering::SeqCst);
                }
                debug!("Capture stream ended");
            })));
        }

        self.apply(SessionEvent::ChannelOpened);
        info!("Voice session {} active", self.config.session_id);
    }

    /// Per-session event loop
    ///
    /// Owns the transcript accumulator and the decode queue. Decoded frames
    /// are committed in arrival order regardless of decode completion order.
    async fn drive(
        self: Arc<Self>,
        generation: u64,
        mut events: mpsc::Receiver<ChannelEvent>,
        mut ended_rx: mpsc::UnboundedReceiver<SourceId>,
        scheduler: Arc<Mutex<PlaybackScheduler>>,
    ) {
        let mut transcript = TranscriptAccumulator::new();
        let mut queue = PlaybackQueue::new(Arc::clone(&self.decoder));

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(ChannelEvent::Open) => self.on_open(generation).await,
                    Some(ChannelEvent::Message(message)) => {
                        self.on_message(message, &mut transcript, &mut queue, &scheduler).await;
                    }
                    Some(ChannelEvent::Error(message)) => {
                        error!("Realtime channel error: {}", message);
                        self.teardown(generation, SessionEvent::ChannelFailed).await;
                        break;
                    }
                    Some(ChannelEvent::Closed) | None => {
                        info!("Realtime channel closed");
                        self.teardown(generation, SessionEvent::ChannelClosed).await;
                        break;
                    }
                },
                Some(decoded) = queue.next_decoded(), if !queue.is_empty() => {
                    self.commit_decoded(decoded, &scheduler).await;
                }
                Some(id) = ended_rx.recv() => {
                    scheduler.lock().await.source_ended(id);
                }
            }
        }
    }

    async fn on_message(
        &self,
        message: ServerEvent,
        transcript: &mut TranscriptAccumulator,
        queue: &mut PlaybackQueue,
        scheduler: &Mutex<PlaybackScheduler>,
    ) {
        if let Some(text) = message.input_transcript.as_deref() {
            transcript.append_input(text);
        }

        if let Some(text) = message.output_transcript.as_deref() {
            let caption = transcript.append_output(text).to_string();
            self.caption.send_replace(caption);
        }

        if message.turn_complete {
            if let Some(turn) = transcript.finalize_turn() {
                self.counters.turns_committed.fetch_add(1, Ordering::SeqCst);
                self.turns.on_turn(turn);
            }
            self.caption.send_replace(String::new());
        }

        if let Some(data) = message.audio {
            if !scheduler.lock().await.is_running() {
                debug!("Output not running, dropping audio frame");
                self.counters.frames_dropped.fetch_add(1, Ordering::SeqCst);
                return;
            }
            match decode_base64(&data) {
                Ok(bytes) => queue.push(bytes),
                Err(e) => {
                    warn!("Dropping audio frame: {}", e);
                    self.counters.frames_dropped.fetch_add(1, Ordering::SeqCst);
                }
            }
        }
    }

    async fn commit_decoded(
        &self,
        decoded: Result<AudioBuffer, DecodeError>,
        scheduler: &Mutex<PlaybackScheduler>,
    ) {
        let buffer = match decoded {
            Ok(buffer) => buffer,
            Err(e) => {
                warn!("Dropping audio frame: {}", e);
                self.counters.frames_dropped.fetch_add(1, Ordering::SeqCst);
                return;
            }
        };

        match scheduler.lock().await.schedule(buffer) {
            Some(start_at) => {
                debug!("Scheduled audio frame at {:.3}s", start_at);
                self.counters.frames_scheduled.fetch_add(1, Ordering::SeqCst);
            }
            None => {
                self.counters.frames_dropped.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}

async fn stop_capture(capture: &mut dyn CaptureBackend) {
    if let Err(e) = capture.stop().await {
        warn!("Failed to stop capture: {:#}", e);
    }
}
