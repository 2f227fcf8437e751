//! Destinations for accepted recordings and notification hits.
//!
//! The monitor hands finished captures to a [`RecordingSink`] and raised
//! labels to a [`Notifier`]. Sink failures are transient by contract: the
//! monitor logs them, surfaces an event, and keeps running. Nothing here is
//! allowed to take the capture loop down.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use thiserror::Error;

use crate::classify::LabelScore;
use crate::{lock_or_recover, log_debug};

/// Metadata stored alongside every accepted recording.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordingMeta {
    pub id: String,
    /// Trigger time, milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    /// Loudest metering tick of the episode, dBFS.
    pub peak_db: f32,
    /// Trigger-to-stop wall clock, seconds.
    pub duration_seconds: f64,
    /// Ranked classifier labels; empty when classification fell through.
    pub classifications: Vec<LabelScore>,
}

/// Recording ids are derived from the trigger timestamp. The cooldown
/// between episodes guarantees uniqueness at millisecond resolution.
pub fn recording_id(timestamp_ms: u64) -> String {
    format!("rec-{timestamp_ms}")
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to write recording: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode metadata: {0}")]
    Metadata(#[from] serde_json::Error),
    #[error("sink unavailable: {0}")]
    Unavailable(String),
}

/// Where accepted recordings go.
pub trait RecordingSink: Send {
    fn store(&mut self, meta: &RecordingMeta, wav: &[u8]) -> Result<(), SinkError>;

    fn name(&self) -> &'static str {
        "unknown_sink"
    }
}

/// How raised notification labels reach the user.
pub trait Notifier: Send {
    fn notify(&mut self, label: &str, meta: &RecordingMeta);
}

/// Writes `<id>.wav` plus an `<id>.json` sidecar into a recordings
/// directory.
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    /// Creates the recordings directory if needed.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl RecordingSink for FileSink {
    fn store(&mut self, meta: &RecordingMeta, wav: &[u8]) -> Result<(), SinkError> {
        let stem = sanitize_file_stem(&meta.id);
        let wav_path = self.dir.join(format!("{stem}.wav"));
        let json_path = self.dir.join(format!("{stem}.json"));
        fs::write(&wav_path, wav)?;
        let sidecar = serde_json::to_vec_pretty(meta)?;
        fs::write(&json_path, sidecar)?;
        log_debug(&format!(
            "stored recording {} ({} bytes) at {}",
            meta.id,
            wav.len(),
            wav_path.display()
        ));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// Keeps recordings in memory. Used by tests and by embedders that forward
/// blobs elsewhere.
#[derive(Default)]
pub struct MemorySink {
    pub saved: Vec<(RecordingMeta, Vec<u8>)>,
    /// When set, the next `store` call fails with this message.
    pub fail_next: Option<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordingSink for MemorySink {
    fn store(&mut self, meta: &RecordingMeta, wav: &[u8]) -> Result<(), SinkError> {
        if let Some(message) = self.fail_next.take() {
            return Err(SinkError::Unavailable(message));
        }
        self.saved.push((meta.clone(), wav.to_vec()));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Lets the capture worker and its caller share one sink.
impl<S: RecordingSink> RecordingSink for Arc<Mutex<S>> {
    fn store(&mut self, meta: &RecordingMeta, wav: &[u8]) -> Result<(), SinkError> {
        lock_or_recover(self, "recording sink").store(meta, wav)
    }

    fn name(&self) -> &'static str {
        lock_or_recover(self, "recording sink").name()
    }
}

impl<N: Notifier> Notifier for Arc<Mutex<N>> {
    fn notify(&mut self, label: &str, meta: &RecordingMeta) {
        lock_or_recover(self, "notifier").notify(label, meta);
    }
}

/// Notifier that mirrors hits into the debug log. The CLI prints its own
/// line from the event stream; embedders bring their own delivery channel.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&mut self, label: &str, meta: &RecordingMeta) {
        log_debug(&format!(
            "notification: label='{label}' recording={} peak_db={:.1}",
            meta.id, meta.peak_db
        ));
    }
}

/// Collects hits in memory so tests can assert which labels were raised.
#[derive(Default)]
pub struct MemoryNotifier {
    pub hits: Vec<(String, String)>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&mut self, label: &str, meta: &RecordingMeta) {
        self.hits.push((label.to_string(), meta.id.clone()));
    }
}

/// Ids come from our own clock, but the sink still refuses to build paths
/// from anything outside `[A-Za-z0-9._-]`.
fn sanitize_file_stem(id: &str) -> String {
    static UNSAFE_CHARS: OnceLock<Regex> = OnceLock::new();
    let re = UNSAFE_CHARS.get_or_init(|| {
        Regex::new(r"[^A-Za-z0-9._-]+").expect("filename regex should compile")
    });
    let cleaned = re.replace_all(id, "_");
    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        "recording".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(id: &str) -> RecordingMeta {
        RecordingMeta {
            id: id.to_string(),
            timestamp_ms: 1_700_000_000_000,
            peak_db: -18.5,
            duration_seconds: 2.3,
            classifications: vec![LabelScore::new("Dog", 0.9)],
        }
    }

    #[test]
    fn recording_id_embeds_timestamp() {
        assert_eq!(recording_id(1_700_000_000_123), "rec-1700000000123");
    }

    #[test]
    fn file_sink_writes_blob_and_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileSink::create(dir.path().join("recordings")).unwrap();
        let wav = vec![1u8, 2, 3, 4];
        sink.store(&meta("rec-1"), &wav).unwrap();

        let stored = fs::read(sink.dir().join("rec-1.wav")).unwrap();
        assert_eq!(stored, wav);

        let sidecar = fs::read_to_string(sink.dir().join("rec-1.json")).unwrap();
        let parsed: RecordingMeta = serde_json::from_str(&sidecar).unwrap();
        assert_eq!(parsed, meta("rec-1"));
    }

    #[test]
    fn file_sink_sanitizes_hostile_ids() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileSink::create(dir.path()).unwrap();
        sink.store(&meta("../../etc/passwd"), &[0u8]).unwrap();
        // Separators collapse, so both files land flat inside the sink
        // directory instead of escaping it.
        let entries: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries.len(), 2);
        assert!(entries
            .iter()
            .all(|name| !name.contains('/') && !name.starts_with('.')));
        assert!(entries.iter().any(|name| name.ends_with(".wav")));
    }

    #[test]
    fn memory_sink_records_and_fails_on_demand() {
        let mut sink = MemorySink::new();
        sink.store(&meta("rec-1"), &[9u8]).unwrap();
        assert_eq!(sink.saved.len(), 1);

        sink.fail_next = Some("upstream down".to_string());
        let err = sink.store(&meta("rec-2"), &[9u8]).unwrap_err();
        assert!(matches!(err, SinkError::Unavailable(_)));
        // The failure is one-shot.
        sink.store(&meta("rec-3"), &[9u8]).unwrap();
        assert_eq!(sink.saved.len(), 2);
    }

    #[test]
    fn sanitize_keeps_normal_ids_untouched() {
        assert_eq!(sanitize_file_stem("rec-1700000000123"), "rec-1700000000123");
        assert_eq!(sanitize_file_stem("a b/c"), "a_b_c");
        assert_eq!(sanitize_file_stem(""), "recording");
    }

    #[test]
    fn meta_round_trips_through_json() {
        let original = meta("rec-42");
        let json = serde_json::to_string(&original).unwrap();
        let back: RecordingMeta = serde_json::from_str(&json).unwrap();
        assert_eq!(back, original);
    }
}
