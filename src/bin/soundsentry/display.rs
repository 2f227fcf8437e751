//! Status-line and event rendering for the monitor CLI.
//!
//! One meter line is redrawn in place; everything that happens (triggers,
//! saves, rejections) scrolls above it as plain lines.

use soundsentry::audio::{StopCause, MAX_DB, MIN_DB};
use soundsentry::classify::LabelScore;
use soundsentry::monitor::{MonitorEvent, SessionMetrics};

/// Characters for the meter bar.
const BAR_FULL: char = '█';
const BAR_EMPTY: char = '░';
const THRESHOLD_MARKER: char = '│';

/// Width of the level bar in characters.
const METER_WIDTH: usize = 30;

/// ANSI codes for the display; all empty when colors are off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Palette {
    pub success: &'static str,
    pub warning: &'static str,
    pub error: &'static str,
    pub info: &'static str,
    pub dim: &'static str,
    pub reset: &'static str,
}

const COLOR: Palette = Palette {
    success: "\x1b[92m", // Bright green
    warning: "\x1b[93m", // Bright yellow
    error: "\x1b[91m",   // Bright red
    info: "\x1b[94m",    // Bright blue
    dim: "\x1b[90m",     // Dark gray
    reset: "\x1b[0m",
};

const PLAIN: Palette = Palette {
    success: "",
    warning: "",
    error: "",
    info: "",
    dim: "",
    reset: "",
};

pub(crate) fn palette(no_color: bool) -> Palette {
    if no_color {
        PLAIN
    } else {
        COLOR
    }
}

/// Format the horizontal level meter with a threshold marker.
///
/// The bar stays green below the trigger threshold and runs yellow, then
/// red, above it.
pub(crate) fn format_meter(
    level_db: f32,
    threshold_db: f32,
    recording: bool,
    palette: &Palette,
) -> String {
    let range = MAX_DB - MIN_DB;
    let level_pos = ((level_db - MIN_DB) / range).clamp(0.0, 1.0);
    let threshold_pos = ((threshold_db - MIN_DB) / range).clamp(0.0, 1.0);
    let level_chars = (level_pos * METER_WIDTH as f32) as usize;
    let threshold_char = (threshold_pos * METER_WIDTH as f32) as usize;

    let mut bar = String::new();
    for i in 0..METER_WIDTH {
        if i >= level_chars && i == threshold_char {
            bar.push_str(palette.info);
            bar.push(THRESHOLD_MARKER);
            bar.push_str(palette.reset);
        } else if i < level_chars {
            bar.push_str(segment_color(i, threshold_char, palette));
            bar.push(BAR_FULL);
            bar.push_str(palette.reset);
        } else {
            bar.push(BAR_EMPTY);
        }
    }

    let state = if recording {
        format!("{}REC{}", palette.error, palette.reset)
    } else {
        format!("{}idle{}", palette.dim, palette.reset)
    };
    format!("{bar} {level_db:>6.1} dBFS  {state}")
}

fn segment_color<'a>(pos: usize, threshold_char: usize, palette: &'a Palette) -> &'a str {
    if pos < threshold_char {
        palette.success
    } else if pos < (METER_WIDTH * 9) / 10 {
        palette.warning
    } else {
        palette.error
    }
}

/// One printable line per event; `None` for events the loop handles itself.
pub(crate) fn format_event(event: &MonitorEvent, palette: &Palette) -> Option<String> {
    match event {
        MonitorEvent::Listening {
            device,
            sample_rate,
        } => Some(format!(
            "{}listening{} on '{device}' at {sample_rate} Hz",
            palette.info, palette.reset
        )),
        MonitorEvent::Triggered { level_db } => Some(format!(
            "{}triggered{} at {level_db:.1} dBFS",
            palette.error, palette.reset
        )),
        MonitorEvent::Saved { meta, cause } => Some(format!(
            "{}saved{} {} ({:.1}s, peak {:.1} dBFS{}{})",
            palette.success,
            palette.reset,
            meta.id,
            meta.duration_seconds,
            meta.peak_db,
            top_label(&meta.classifications),
            cause_suffix(cause, palette),
        )),
        MonitorEvent::Rejected { primary, .. } => {
            let detail = match primary {
                Some(label) => format!("top match {} {:.2}", label.label, label.score),
                None => "no qualifying label".to_string(),
            };
            Some(format!(
                "{}rejected{} capture ({detail})",
                palette.warning, palette.reset
            ))
        }
        MonitorEvent::DroppedEmpty => Some(format!(
            "{}discarded{} empty capture",
            palette.dim, palette.reset
        )),
        MonitorEvent::Notified { labels } => Some(format!(
            "{}notify{}: {}",
            palette.warning,
            palette.reset,
            labels.join(", ")
        )),
        MonitorEvent::SinkFailed(message) => Some(format!(
            "{}sink error{}: {message}",
            palette.error, palette.reset
        )),
        MonitorEvent::Fatal(message) => Some(format!(
            "{}fatal{}: {message}",
            palette.error, palette.reset
        )),
        MonitorEvent::Stopped(metrics) => Some(format!(
            "{}stopped{} ({})",
            palette.dim,
            palette.reset,
            summarize_metrics(metrics)
        )),
    }
}

fn top_label(labels: &[LabelScore]) -> String {
    match labels.first() {
        Some(best) => format!(", {} {:.2}", best.label, best.score),
        None => String::new(),
    }
}

fn cause_suffix(cause: &StopCause, palette: &Palette) -> String {
    match cause {
        StopCause::Released { .. } => String::new(),
        other => format!(", {}{}{}", palette.dim, other.label(), palette.reset),
    }
}

pub(crate) fn summarize_metrics(metrics: &SessionMetrics) -> String {
    format!(
        "{} frames, {} episodes, {} saved, {} rejected, {} dropped",
        metrics.frames_processed,
        metrics.episodes_started,
        metrics.episodes_saved,
        metrics.episodes_rejected,
        metrics.frames_dropped,
    )
}
