//! SoundSentry: an always-on sound-event monitor.
//!
//! Meters the microphone as dBFS levels, records episodes around loud
//! moments (with pre-roll), and routes finished captures through a
//! deadline-raced classification gate before they reach a recording sink.

pub mod audio;
pub mod classify;
pub mod config;
pub mod monitor;
pub mod sink;
pub mod terminal_restore;

mod app;
mod lock;
mod telemetry;

pub(crate) use lock::lock_or_recover;

pub use app::{
    crash_log_path, init_logging, log_debug, log_debug_content, log_file_path, log_panic,
};
pub use monitor::{
    offline_monitor_from_pcm, start_monitor, MonitorEvent, MonitorHandle, MonitorSession,
    SessionMetrics,
};
pub use telemetry::{init_tracing, tracing_log_path};
