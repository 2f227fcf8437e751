//! Sound classification seam.
//!
//! The engine treats the classifier as an external collaborator behind the
//! [`SoundClassifier`] trait. A classification run is raced against a short
//! deadline on a worker thread; whichever side settles first decides the
//! outcome and the loser is discarded. The monitor never waits longer than
//! the configured timeout to decide whether a capture is kept.

mod gate;
mod labels;

pub use gate::{decide, notification_hits, GateDecision};
pub use labels::FALLBACK_LABELS;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::log_debug;

/// One label with model confidence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f32,
}

impl LabelScore {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Classifies a window of audio into ranked labels.
///
/// Implementations run on the caller's worker thread and may block; the
/// engine enforces its deadline from the outside.
pub trait SoundClassifier: Send + Sync {
    /// Ranked labels for the window, most confident first.
    fn classify(&self, samples: &[f32], sample_rate: u32) -> Result<Vec<LabelScore>>;

    /// Windows shorter than this are not worth presenting to the model.
    fn minimum_samples(&self) -> usize {
        1600
    }

    fn name(&self) -> &'static str {
        "unknown_classifier"
    }
}

/// What a classification attempt produced.
#[derive(Clone, Debug, PartialEq)]
pub enum ClassifyOutcome {
    /// The model ran in time; labels are in the model's ranking order.
    Ranked(Vec<LabelScore>),
    /// The model missed the deadline.
    TimedOut,
    /// The model ran and failed.
    Failed(String),
    /// The analysis window was below the model's minimum input.
    TooShort,
    /// No classifier is configured.
    Unavailable,
}

/// Which side of the race settled the decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Settlement {
    /// The classifier answered (or failed) before the deadline.
    Classifier,
    /// The deadline fired first; any later answer is ignored.
    Timeout,
    /// No race was run for this episode.
    Immediate,
}

impl Settlement {
    pub fn label(&self) -> &'static str {
        match self {
            Settlement::Classifier => "classifier",
            Settlement::Timeout => "timeout",
            Settlement::Immediate => "immediate",
        }
    }
}

/// Runs the classifier on a worker thread and waits at most `timeout`.
///
/// The result channel holds one slot; if the deadline fires first the
/// receiver is dropped and the worker's late send fails silently, so exactly
/// one side ever settles the outcome.
pub fn run_classification(
    classifier: Option<Arc<dyn SoundClassifier>>,
    samples: Vec<f32>,
    sample_rate: u32,
    timeout: Duration,
) -> (ClassifyOutcome, Settlement) {
    let Some(classifier) = classifier else {
        return (ClassifyOutcome::Unavailable, Settlement::Immediate);
    };
    if samples.len() < classifier.minimum_samples() {
        return (ClassifyOutcome::TooShort, Settlement::Immediate);
    }

    let name = classifier.name();
    let (sender, receiver) = mpsc::sync_channel(1);
    thread::spawn(move || {
        let result = classifier.classify(&samples, sample_rate);
        let _ = sender.send(result);
    });

    match receiver.recv_timeout(timeout) {
        Ok(Ok(labels)) => (ClassifyOutcome::Ranked(labels), Settlement::Classifier),
        Ok(Err(err)) => {
            log_debug(&format!("classifier '{name}' failed: {err:#}"));
            (
                ClassifyOutcome::Failed(format!("{err:#}")),
                Settlement::Classifier,
            )
        }
        Err(RecvTimeoutError::Timeout) => {
            log_debug(&format!(
                "classifier '{name}' missed {}ms deadline",
                timeout.as_millis()
            ));
            (ClassifyOutcome::TimedOut, Settlement::Timeout)
        }
        Err(RecvTimeoutError::Disconnected) => (
            ClassifyOutcome::Failed("classifier worker exited".to_string()),
            Settlement::Classifier,
        ),
    }
}
