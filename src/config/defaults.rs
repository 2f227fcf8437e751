//! Default values and hard bounds for the CLI flags.

/// Trigger threshold in dBFS. Matches a quiet room with normal speech and
/// household sounds landing comfortably above it.
pub const DEFAULT_THRESHOLD_DB: f32 = -30.0;

/// Continuous quiet required before an episode releases (milliseconds).
pub const DEFAULT_RELEASE_BUFFER_MS: u64 = 1_000;

/// Audio retained from before the trigger (milliseconds).
pub const DEFAULT_PRE_BUFFER_MS: u64 = 1_000;

/// Encoder chunk cadence (milliseconds).
pub const DEFAULT_CHUNK_INTERVAL_MS: u64 = 100;

/// Metering frame size (milliseconds).
pub const DEFAULT_FRAME_MS: u64 = 100;

/// Episodes younger than this cannot release (milliseconds).
pub const DEFAULT_MIN_EPISODE_MS: u64 = 300;

/// Minimum classifier confidence for filter and notification matches.
pub const DEFAULT_CLASSIFICATION_MIN_SCORE: f32 = 0.2;

/// Deadline for the classification race (milliseconds).
pub const DEFAULT_CLASSIFY_TIMEOUT_MS: u64 = 500;

/// Rolling analysis window handed to the classifier (milliseconds).
pub const DEFAULT_CLASSIFY_WINDOW_MS: u64 = 1_500;

/// Frame channel capacity between the device callback and the monitor loop.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Where accepted recordings land unless overridden.
pub const DEFAULT_RECORDINGS_DIR: &str = "recordings";

/// Upper bound for the pre-roll window; anything larger holds minutes of
/// encoded audio in memory for no benefit.
pub const MAX_PRE_BUFFER_MS: u64 = 30_000;

/// Upper bound for the release buffer. Must stay below the episode hard cap
/// or a release could never fire.
pub const MAX_RELEASE_BUFFER_MS: u64 = 20_000;

/// Bounds for label lists supplied via repeatable flags.
pub const MAX_SOUND_TYPES: usize = 64;
pub const MAX_LABEL_BYTES: usize = 128;
