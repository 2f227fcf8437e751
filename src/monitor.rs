//! Background worker that meters the microphone, captures triggered episodes,
//! and pushes accepted recordings through the classification gate into a sink.
//! The caller polls an event channel; the worker owns the device for the whole
//! session because CPAL stream handles cannot cross threads.

use crate::audio::{
    self, level_from_samples, CaptureEpisode, EncodedChunk, FinishedCapture, LiveMeter,
    PrerollRing, Recorder, StopCause, TriggerConfig, TriggerDecision, TriggerMachine,
    WavChunkEncoder, CLASSIFIER_RATE, MIN_DB,
};
use crate::classify::{self, LabelScore, SoundClassifier};
use crate::config::{EngineConfig, SharedConfig};
use crate::log_debug;
use crate::sink::{recording_id, Notifier, RecordingMeta, RecordingSink};
use anyhow::Result;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// How long the worker waits for a frame before re-checking the stop flag.
const FRAME_RECV_PATIENCE: Duration = Duration::from_millis(250);

/// Messages sent from the worker back to the caller.
#[derive(Debug, PartialEq)]
pub enum MonitorEvent {
    /// The device is open and the session is metering.
    Listening { device: String, sample_rate: u32 },
    /// The level crossed the threshold and an episode started.
    Triggered { level_db: f32 },
    /// An episode passed the gate and reached the sink.
    Saved {
        meta: RecordingMeta,
        cause: StopCause,
    },
    /// An episode finished but no filtered label qualified.
    Rejected {
        primary: Option<LabelScore>,
        cause: StopCause,
    },
    /// An episode finished without any audio payload.
    DroppedEmpty,
    /// Labels from the notification list were detected.
    Notified { labels: Vec<String> },
    /// The sink refused a recording; the session keeps running.
    SinkFailed(String),
    /// The session could not start or died; no more events will follow.
    Fatal(String),
    /// The session ended normally.
    Stopped(SessionMetrics),
}

/// Counters collected across one session for observability and tests.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionMetrics {
    pub frames_processed: usize,
    pub frames_dropped: usize,
    pub episodes_started: usize,
    pub episodes_saved: usize,
    pub episodes_rejected: usize,
    pub episodes_dropped_empty: usize,
    pub sink_failures: usize,
}

/// Handle the caller uses to poll the worker thread.
pub struct MonitorHandle {
    pub events: mpsc::Receiver<MonitorEvent>,
    pub handle: Option<thread::JoinHandle<()>>,
    pub stop_flag: Arc<AtomicBool>,
    pub meter: LiveMeter,
}

impl MonitorHandle {
    /// Signal the session to finish the in-flight episode and shut down.
    pub fn request_stop(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }
}

/// Spawn a worker thread that owns the input device and runs the session
/// until [`MonitorHandle::request_stop`] is called.
pub fn start_monitor(
    config: SharedConfig,
    classifier: Option<Arc<dyn SoundClassifier>>,
    sink: Box<dyn RecordingSink>,
    notifier: Box<dyn Notifier>,
) -> MonitorHandle {
    let (tx, rx) = mpsc::channel();
    let stop_flag = Arc::new(AtomicBool::new(false));
    let meter = LiveMeter::new();

    let worker_flag = stop_flag.clone();
    let worker_meter = meter.clone();
    let handle = thread::spawn(move || {
        if let Err(err) = run_session(config, classifier, sink, notifier, worker_flag, worker_meter, &tx) {
            log_debug(&format!("monitor session failed: {err:#}"));
            let _ = tx.send(MonitorEvent::Fatal(format!("{err:#}")));
        }
    });

    MonitorHandle {
        events: rx,
        handle: Some(handle),
        stop_flag,
        meter,
    }
}

/// Device acquisition and the frame loop. Errors here are fatal; everything
/// past the stream open is absorbed and reported as events.
fn run_session(
    config: SharedConfig,
    classifier: Option<Arc<dyn SoundClassifier>>,
    sink: Box<dyn RecordingSink>,
    notifier: Box<dyn Notifier>,
    stop_flag: Arc<AtomicBool>,
    meter: LiveMeter,
    events: &mpsc::Sender<MonitorEvent>,
) -> Result<()> {
    let cfg = config.snapshot();
    let recorder = Recorder::acquire(cfg.input_device.as_deref())?;
    let stream = recorder.open_stream(cfg.frame_ms, cfg.channel_capacity)?;
    let sample_rate = stream.sample_rate;
    let _ = events.send(MonitorEvent::Listening {
        device: recorder.device_name(),
        sample_rate,
    });

    let mut session = MonitorSession::new(config, sample_rate, classifier, sink, notifier, meter);
    let started = Instant::now();
    loop {
        if stop_flag.load(Ordering::Relaxed) {
            break;
        }
        match stream.frames.recv_timeout(FRAME_RECV_PATIENCE) {
            Ok(frame) => {
                let now_ms = started.elapsed().as_millis() as u64;
                for event in session.on_frame(now_ms, &frame) {
                    let _ = events.send(event);
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                log_debug("input stream closed unexpectedly");
                break;
            }
        }
    }

    let now_ms = started.elapsed().as_millis() as u64;
    for event in session.shutdown(now_ms) {
        let _ = events.send(event);
    }
    let mut metrics = session.into_metrics();
    metrics.frames_dropped = stream.dropped_frames();
    stream.close();
    log_session_metrics(&metrics);
    let _ = events.send(MonitorEvent::Stopped(metrics));
    Ok(())
}

/// Run the full trigger/capture/gate pipeline against synthetic PCM.
///
/// Frames are cut at the configured cadence and the clock advances one frame
/// interval per tick, so session behavior can be tested without CPAL devices.
pub fn offline_monitor_from_pcm(
    samples: &[f32],
    sample_rate: u32,
    config: SharedConfig,
    classifier: Option<Arc<dyn SoundClassifier>>,
    sink: Box<dyn RecordingSink>,
    notifier: Box<dyn Notifier>,
) -> (Vec<MonitorEvent>, SessionMetrics) {
    let cfg = config.snapshot();
    let frame_ms = cfg.frame_ms.max(1);
    let frame_samples = ((sample_rate as u64 * frame_ms) / 1000).max(1) as usize;
    let mut session = MonitorSession::new(
        config,
        sample_rate,
        classifier,
        sink,
        notifier,
        LiveMeter::new(),
    );

    let mut events = Vec::new();
    let mut now_ms = 0u64;
    for chunk in samples.chunks(frame_samples) {
        let mut frame = chunk.to_vec();
        frame.resize(frame_samples, 0.0);
        now_ms += frame_ms;
        events.extend(session.on_frame(now_ms, &frame));
    }
    events.extend(session.shutdown(now_ms));
    (events, session.into_metrics())
}

/// Rolling window of raw device-rate samples for the classifier.
///
/// Independent of the encoded chunk pipeline: the gate wants the most recent
/// seconds of audio regardless of where chunk boundaries fell.
struct AnalysisWindow {
    samples: VecDeque<f32>,
    sample_rate: u32,
    max_samples: usize,
}

impl AnalysisWindow {
    fn new(window_ms: u64, sample_rate: u32) -> Self {
        Self {
            samples: VecDeque::new(),
            sample_rate,
            max_samples: Self::cap(window_ms, sample_rate),
        }
    }

    fn cap(window_ms: u64, sample_rate: u32) -> usize {
        ((u64::from(sample_rate) * window_ms) / 1000).max(1) as usize
    }

    fn retune(&mut self, window_ms: u64) {
        let cap = Self::cap(window_ms, self.sample_rate);
        if cap != self.max_samples {
            self.max_samples = cap;
            self.evict();
        }
    }

    fn push(&mut self, frame: &[f32]) {
        self.samples.extend(frame.iter().copied());
        self.evict();
    }

    fn evict(&mut self) {
        while self.samples.len() > self.max_samples {
            self.samples.pop_front();
        }
    }

    fn snapshot(&self) -> Vec<f32> {
        self.samples.iter().copied().collect()
    }
}

/// One always-on session: meter, trigger state machine, encoder, pre-roll
/// ring, and the gate/sink tail. Driven one frame at a time so the same code
/// runs under CPAL and in offline tests.
pub struct MonitorSession {
    config: SharedConfig,
    meter: LiveMeter,
    machine: TriggerMachine,
    encoder: WavChunkEncoder,
    header: EncodedChunk,
    preroll: PrerollRing,
    analysis: AnalysisWindow,
    episode: Option<CaptureEpisode>,
    classifier: Option<Arc<dyn SoundClassifier>>,
    sink: Box<dyn RecordingSink>,
    notifier: Box<dyn Notifier>,
    sample_rate: u32,
    metrics: SessionMetrics,
}

impl MonitorSession {
    pub fn new(
        config: SharedConfig,
        sample_rate: u32,
        classifier: Option<Arc<dyn SoundClassifier>>,
        sink: Box<dyn RecordingSink>,
        notifier: Box<dyn Notifier>,
        meter: LiveMeter,
    ) -> Self {
        let cfg = config.snapshot();
        let encoder = WavChunkEncoder::new(sample_rate, cfg.chunk_interval_ms);
        let header = encoder.init_chunk();
        let preroll = PrerollRing::for_window(cfg.pre_buffer_ms, cfg.chunk_interval_ms);
        let machine = TriggerMachine::new(trigger_config(&cfg));
        let analysis = AnalysisWindow::new(cfg.classify_window_ms, sample_rate);
        Self {
            config,
            meter,
            machine,
            encoder,
            header,
            preroll,
            analysis,
            episode: None,
            classifier,
            sink,
            notifier,
            sample_rate,
            metrics: SessionMetrics::default(),
        }
    }

    /// Process one frame of mono device-rate samples.
    ///
    /// Re-reads the shared config first, so threshold, filter, and window
    /// changes apply on the very next tick. The chunk cadence and device are
    /// fixed for the life of the session.
    pub fn on_frame(&mut self, now_ms: u64, frame: &[f32]) -> Vec<MonitorEvent> {
        let cfg = self.config.snapshot();
        self.machine.set_config(trigger_config(&cfg));
        self.analysis.retune(cfg.classify_window_ms);
        if self.episode.is_none() {
            self.preroll
                .resize(PrerollRing::window_capacity(cfg.pre_buffer_ms, cfg.chunk_interval_ms));
        }

        let level = level_from_samples(frame);
        self.meter.set_db(level);
        self.metrics.frames_processed += 1;
        self.analysis.push(frame);
        if let Some(episode) = self.episode.as_mut() {
            episode.observe_level(level);
        }

        // Completed chunks belong to the live episode when one is running,
        // otherwise to the pre-roll ring.
        let chunks = self.encoder.push_samples(frame, now_ms);
        match self.episode.as_mut() {
            Some(episode) => {
                for chunk in chunks {
                    episode.push_chunk(chunk);
                }
            }
            None => {
                for chunk in chunks {
                    self.preroll.push(chunk);
                }
            }
        }

        let mut events = Vec::new();
        match self.machine.on_level(now_ms, level) {
            TriggerDecision::Idle | TriggerDecision::Continue => {}
            TriggerDecision::Start => {
                self.metrics.episodes_started += 1;
                let preroll = self.preroll.snapshot();
                self.preroll.clear();
                let mut episode = CaptureEpisode::begin(now_ms, preroll);
                episode.observe_level(level);
                self.episode = Some(episode);
                log_debug(&format!(
                    "episode started at {now_ms}ms (level {level:.1} dBFS)"
                ));
                events.push(MonitorEvent::Triggered { level_db: level });
            }
            TriggerDecision::Stop(cause) => {
                events.extend(self.finish_episode(now_ms, cause, &cfg));
            }
        }
        events
    }

    /// Tear the session down, finalizing any in-flight episode through the
    /// normal gate path so a manual stop still keeps its capture.
    pub fn shutdown(&mut self, now_ms: u64) -> Vec<MonitorEvent> {
        let mut events = Vec::new();
        if let Some(cause) = self.machine.cancel() {
            let cfg = self.config.snapshot();
            events.extend(self.finish_episode(now_ms, cause, &cfg));
        }
        self.meter.set_db(MIN_DB);
        events
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    pub fn into_metrics(self) -> SessionMetrics {
        self.metrics
    }

    fn finish_episode(
        &mut self,
        now_ms: u64,
        cause: StopCause,
        cfg: &EngineConfig,
    ) -> Vec<MonitorEvent> {
        let mut events = Vec::new();
        let Some(mut episode) = self.episode.take() else {
            return events;
        };
        if let Some(tail) = self.encoder.flush(now_ms) {
            episode.push_chunk(tail);
        }
        let Some(capture) = episode.finalize(&self.header, now_ms, cause) else {
            self.metrics.episodes_dropped_empty += 1;
            log_debug("episode produced no audio payload; dropped");
            events.push(MonitorEvent::DroppedEmpty);
            return events;
        };
        log_debug(&format!(
            "episode stopped at {now_ms}ms: cause={} bytes={} preroll_chunks={} live_chunks={}",
            capture.cause.label(),
            capture.wav.len(),
            capture.preroll_chunks,
            capture.live_chunks
        ));
        events.extend(self.gate_and_store(now_ms, capture, cfg));
        events
    }

    fn gate_and_store(
        &mut self,
        now_ms: u64,
        capture: FinishedCapture,
        cfg: &EngineConfig,
    ) -> Vec<MonitorEvent> {
        let mut events = Vec::new();

        let window = self.analysis.snapshot();
        let samples = audio::resample_to_classifier_rate(&window, self.sample_rate);
        let race_started = Instant::now();
        let (outcome, settled_by) = classify::run_classification(
            self.classifier.clone(),
            samples,
            CLASSIFIER_RATE,
            Duration::from_millis(cfg.classify_timeout_ms),
        );
        let decision = classify::decide(
            &outcome,
            settled_by,
            &cfg.sound_type_filter,
            cfg.classification_min_score,
        );
        log_debug(&format!(
            "gate: accept={} settled_by={} labels={} in {}ms",
            decision.accept,
            decision.settled_by.label(),
            decision.labels.len(),
            race_started.elapsed().as_millis()
        ));
        tracing::info!(
            phase = "classification",
            elapsed_ms = race_started.elapsed().as_millis() as u64,
            settled_by = decision.settled_by.label(),
            accept = decision.accept,
            labels = decision.labels.len(),
            "gate settled"
        );

        let timestamp_ms = unix_ms().saturating_sub(now_ms.saturating_sub(capture.started_at_ms));
        let meta = RecordingMeta {
            id: recording_id(timestamp_ms),
            timestamp_ms,
            peak_db: capture.peak_db,
            duration_seconds: capture.duration_seconds,
            classifications: decision.labels.clone(),
        };

        // Notifications do not depend on the accept decision.
        if cfg.notifications_enabled {
            let hits = classify::notification_hits(
                &decision.labels,
                &cfg.notification_sound_types,
                cfg.classification_min_score,
            );
            if !hits.is_empty() {
                for label in &hits {
                    self.notifier.notify(label, &meta);
                }
                events.push(MonitorEvent::Notified { labels: hits });
            }
        }

        if decision.accept {
            match self.sink.store(&meta, &capture.wav) {
                Ok(()) => {
                    self.metrics.episodes_saved += 1;
                    events.push(MonitorEvent::Saved {
                        meta,
                        cause: capture.cause,
                    });
                }
                Err(err) => {
                    self.metrics.sink_failures += 1;
                    log_debug(&format!("sink '{}' refused {}: {err}", self.sink.name(), meta.id));
                    events.push(MonitorEvent::SinkFailed(err.to_string()));
                }
            }
        } else {
            self.metrics.episodes_rejected += 1;
            events.push(MonitorEvent::Rejected {
                primary: decision.primary,
                cause: capture.cause,
            });
        }
        events
    }
}

fn trigger_config(cfg: &EngineConfig) -> TriggerConfig {
    TriggerConfig {
        threshold_db: cfg.threshold_db,
        release_buffer_ms: cfg.release_buffer_ms,
        min_episode_ms: cfg.min_episode_ms,
    }
}

fn unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Emit structured metrics for perf smoke consumption.
/// Format: `monitor_metrics|frames_processed=...|frames_dropped=...|episodes=...|saved=...|rejected=...|dropped_empty=...|sink_failures=...`
pub(crate) fn log_session_metrics(metrics: &SessionMetrics) {
    log_debug(&format!(
        "monitor_metrics|frames_processed={}|frames_dropped={}|episodes={}|saved={}|rejected={}|dropped_empty={}|sink_failures={}",
        metrics.frames_processed,
        metrics.frames_dropped,
        metrics.episodes_started,
        metrics.episodes_saved,
        metrics.episodes_rejected,
        metrics.episodes_dropped_empty,
        metrics.sink_failures
    ));
    tracing::info!(
        phase = "session",
        frames_processed = metrics.frames_processed,
        frames_dropped = metrics.frames_dropped,
        episodes = metrics.episodes_started,
        saved = metrics.episodes_saved,
        rejected = metrics.episodes_rejected,
        "session finished"
    );
}
