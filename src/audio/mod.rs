//! Audio capture pipeline for the sound monitor.
//!
//! Microphone input is captured via CPAL, metered as dBFS levels at the
//! device rate, and encoded into fixed-interval WAV chunks. A bounded
//! pre-roll ring keeps the most recent chunks so a triggered episode starts
//! before the sound that caused it; only classification windows are
//! resampled to the classifier's 16 kHz rate.

/// Sample rate sound classifiers expect.
pub const CLASSIFIER_RATE: u32 = 16_000;

mod dispatch;
mod encode;
mod episode;
mod meter;
mod preroll;
mod recorder;
mod resample;
#[cfg(test)]
mod tests;
mod trigger;

pub use encode::{finalize_wav, EncodedChunk, WavChunkEncoder};
pub use episode::{CaptureEpisode, FinishedCapture};
pub use meter::{level_from_samples, LiveMeter, MAX_DB, MIN_DB};
pub use preroll::PrerollRing;
pub use recorder::{mic_permission_hint, InputStream, Recorder};
pub use trigger::{
    StopCause, TriggerConfig, TriggerDecision, TriggerMachine, COOLDOWN_MARGIN_MS, MAX_EPISODE_MS,
};

pub(crate) use resample::resample_to_classifier_rate;
