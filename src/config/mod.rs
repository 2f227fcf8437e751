//! Command-line parsing, profiles, and validation helpers.

mod defaults;
mod validation;

use clap::builder::TypedValueParser as _;
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::lock_or_recover;

pub use defaults::{
    DEFAULT_CHANNEL_CAPACITY, DEFAULT_CHUNK_INTERVAL_MS, DEFAULT_CLASSIFICATION_MIN_SCORE,
    DEFAULT_CLASSIFY_TIMEOUT_MS, DEFAULT_CLASSIFY_WINDOW_MS, DEFAULT_FRAME_MS,
    DEFAULT_MIN_EPISODE_MS, DEFAULT_PRE_BUFFER_MS, DEFAULT_RECORDINGS_DIR,
    DEFAULT_RELEASE_BUFFER_MS, DEFAULT_THRESHOLD_DB, MAX_PRE_BUFFER_MS, MAX_RELEASE_BUFFER_MS,
};
pub use validation::Profile;

/// CLI options for the SoundSentry monitor. Validated values keep the
/// engine's invariants intact before a session starts.
#[derive(Debug, Parser, Clone)]
#[command(about = "SoundSentry sound-event monitor", author, version)]
pub struct AppConfig {
    /// Trigger threshold in dBFS; levels at or above start a recording
    #[arg(long = "threshold-db", env = "SOUNDSENTRY_THRESHOLD_DB", default_value_t = DEFAULT_THRESHOLD_DB, allow_hyphen_values = true)]
    pub threshold_db: f32,

    /// Continuous quiet required before a recording stops (milliseconds)
    #[arg(long = "release-buffer-ms", default_value_t = DEFAULT_RELEASE_BUFFER_MS)]
    pub release_buffer_ms: u64,

    /// Audio kept from before the trigger (milliseconds)
    #[arg(long = "pre-buffer-ms", default_value_t = DEFAULT_PRE_BUFFER_MS)]
    pub pre_buffer_ms: u64,

    /// Encoded chunk cadence (milliseconds)
    #[arg(long = "chunk-interval-ms", default_value_t = DEFAULT_CHUNK_INTERVAL_MS)]
    pub chunk_interval_ms: u64,

    /// Metering frame size (milliseconds)
    #[arg(long = "frame-ms", default_value_t = DEFAULT_FRAME_MS)]
    pub frame_ms: u64,

    /// Minimum episode length before a release can fire (milliseconds)
    #[arg(long = "min-episode-ms", default_value_t = DEFAULT_MIN_EPISODE_MS)]
    pub min_episode_ms: u64,

    /// Keep only recordings classified as this sound type (repeatable;
    /// empty = keep every loud sound)
    #[arg(long = "sound-type", action = ArgAction::Append, value_name = "LABEL")]
    pub sound_types: Vec<String>,

    /// Minimum classifier confidence for filter and notification matches
    #[arg(long = "classification-min-score", default_value_t = DEFAULT_CLASSIFICATION_MIN_SCORE)]
    pub classification_min_score: f32,

    /// Raise a notification when this sound type is detected (repeatable)
    #[arg(long = "notify-sound", action = ArgAction::Append, value_name = "LABEL")]
    pub notification_sounds: Vec<String>,

    /// Master toggle for notifications
    #[arg(long = "notifications", default_value_t = false)]
    pub notifications_enabled: bool,

    /// Classification deadline (milliseconds)
    #[arg(long = "classify-timeout-ms", default_value_t = DEFAULT_CLASSIFY_TIMEOUT_MS)]
    pub classify_timeout_ms: u64,

    /// Analysis window handed to the classifier (milliseconds)
    #[arg(long = "classify-window-ms", default_value_t = DEFAULT_CLASSIFY_WINDOW_MS)]
    pub classify_window_ms: u64,

    /// Frame channel capacity between the device callback and the monitor
    #[arg(long = "channel-capacity", default_value_t = DEFAULT_CHANNEL_CAPACITY)]
    pub channel_capacity: usize,

    /// Preferred audio input device name
    #[arg(long, env = "SOUNDSENTRY_INPUT_DEVICE")]
    pub input_device: Option<String>,

    /// Directory for accepted recordings and their metadata sidecars
    #[arg(
        long = "recordings-dir",
        env = "SOUNDSENTRY_RECORDINGS_DIR",
        default_value = DEFAULT_RECORDINGS_DIR,
        value_parser = clap::builder::OsStringValueParser::new().map(PathBuf::from)
    )]
    pub recordings_dir: PathBuf,

    /// YAML profile whose values override the flags above; re-read while
    /// the monitor runs
    #[arg(long = "profile", value_name = "FILE")]
    pub profile: Option<PathBuf>,

    /// Print detected audio input devices and exit
    #[arg(long = "list-input-devices", default_value_t = false)]
    pub list_input_devices: bool,

    /// Print the built-in sound label catalog and exit
    #[arg(long = "list-labels", default_value_t = false)]
    pub list_labels: bool,

    /// Enable file logging (debug)
    #[arg(long = "logs", env = "SOUNDSENTRY_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all file logging (overrides --logs and log env vars)
    #[arg(long = "no-logs", env = "SOUNDSENTRY_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Allow logging recording ids and label names (debug log only)
    #[arg(
        long = "log-content",
        env = "SOUNDSENTRY_LOG_CONTENT",
        default_value_t = false
    )]
    pub log_content: bool,

    /// Enable verbose timing logs
    #[arg(long)]
    pub log_timings: bool,

    /// Disable ANSI colors in the status display
    #[arg(long = "no-color", default_value_t = false)]
    pub no_color: bool,
}

/// Snapshot of everything the monitor session needs per tick. Cloned out of
/// [`SharedConfig`] so a mid-tick update never tears a read.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub threshold_db: f32,
    pub release_buffer_ms: u64,
    pub pre_buffer_ms: u64,
    pub chunk_interval_ms: u64,
    pub frame_ms: u64,
    pub min_episode_ms: u64,
    pub sound_type_filter: Vec<String>,
    pub classification_min_score: f32,
    pub notification_sound_types: Vec<String>,
    pub notifications_enabled: bool,
    pub classify_timeout_ms: u64,
    pub classify_window_ms: u64,
    pub channel_capacity: usize,
    pub input_device: Option<String>,
}

/// Handle for live configuration updates.
///
/// The monitor snapshots it at every metering tick, so threshold or filter
/// changes apply without restarting the session. Device changes are the
/// exception; the session owner tears down and reacquires for those.
#[derive(Clone)]
pub struct SharedConfig {
    inner: Arc<Mutex<EngineConfig>>,
}

impl SharedConfig {
    pub fn new(cfg: EngineConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(cfg)),
        }
    }

    pub fn snapshot(&self) -> EngineConfig {
        lock_or_recover(&self.inner, "engine config").clone()
    }

    pub fn update(&self, cfg: EngineConfig) {
        *lock_or_recover(&self.inner, "engine config") = cfg;
    }

    pub fn mutate(&self, apply: impl FnOnce(&mut EngineConfig)) {
        apply(&mut lock_or_recover(&self.inner, "engine config"));
    }
}
