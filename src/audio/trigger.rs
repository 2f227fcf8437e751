//! Trigger and release decisions for the monitor loop.
//!
//! The machine is fed one `(now_ms, level_db)` pair per metering tick and
//! owns every state transition, so the rules are testable without touching
//! an audio device. All clocks are injected milliseconds; nothing in here
//! reads wall time.

/// Hard cap on episode length. Checked before any level logic so a stuck
/// loud signal can never record forever.
pub const MAX_EPISODE_MS: u64 = 30_000;

/// Added on top of the release buffer when deciding whether enough time has
/// passed since the last trigger to arm again.
pub const COOLDOWN_MARGIN_MS: u64 = 1_000;

#[derive(Clone, Copy, Debug)]
pub struct TriggerConfig {
    /// Levels at or above this start and sustain an episode.
    pub threshold_db: f32,
    /// Continuous quiet required before an episode releases.
    pub release_buffer_ms: u64,
    /// Episodes younger than this cannot release (the hard cap still can).
    pub min_episode_ms: u64,
}

/// Why a recording episode ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopCause {
    /// Level stayed below threshold for the full release buffer.
    Released { quiet_ms: u64 },
    /// The episode hit [`MAX_EPISODE_MS`].
    MaxDuration,
    /// The session was torn down mid-episode.
    Cancelled,
}

impl StopCause {
    /// Stable labels. These appear in metrics lines and saved metadata, so
    /// changing one is a breaking change for log consumers.
    pub fn label(&self) -> &'static str {
        match self {
            StopCause::Released { .. } => "released",
            StopCause::MaxDuration => "max_duration",
            StopCause::Cancelled => "cancelled",
        }
    }
}

/// Outcome of one metering tick.
#[derive(Clone, Debug, PartialEq)]
pub enum TriggerDecision {
    /// Idle and staying idle.
    Idle,
    /// Transitioned Idle to Recording on this tick.
    Start,
    /// Recording and staying in the episode.
    Continue,
    /// The episode ended on this tick.
    Stop(StopCause),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    Recording,
}

pub struct TriggerMachine {
    cfg: TriggerConfig,
    phase: Phase,
    started_at_ms: u64,
    below_since_ms: Option<u64>,
    last_trigger_ms: Option<u64>,
    max_episode_ms: u64,
}

impl TriggerMachine {
    pub fn new(cfg: TriggerConfig) -> Self {
        Self {
            cfg,
            phase: Phase::Idle,
            started_at_ms: 0,
            below_since_ms: None,
            last_trigger_ms: None,
            max_episode_ms: MAX_EPISODE_MS,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.phase == Phase::Recording
    }

    /// Updates the trigger rules without touching episode state. Called when
    /// the configuration is re-read mid-session.
    pub fn set_config(&mut self, cfg: TriggerConfig) {
        self.cfg = cfg;
    }

    pub fn on_level(&mut self, now_ms: u64, level_db: f32) -> TriggerDecision {
        match self.phase {
            Phase::Idle => {
                if level_db >= self.cfg.threshold_db && self.cooldown_elapsed(now_ms) {
                    self.phase = Phase::Recording;
                    self.started_at_ms = now_ms;
                    self.below_since_ms = None;
                    self.last_trigger_ms = Some(now_ms);
                    TriggerDecision::Start
                } else {
                    TriggerDecision::Idle
                }
            }
            Phase::Recording => {
                let elapsed = now_ms.saturating_sub(self.started_at_ms);
                // The hard cap wins over every other condition.
                if elapsed >= self.max_episode_ms {
                    self.finish_episode();
                    return TriggerDecision::Stop(StopCause::MaxDuration);
                }
                if level_db >= self.cfg.threshold_db {
                    // Any tick back at or above threshold restarts the
                    // release countdown from scratch.
                    self.below_since_ms = None;
                    return TriggerDecision::Continue;
                }
                let below_since = *self.below_since_ms.get_or_insert(now_ms);
                let quiet_ms = now_ms.saturating_sub(below_since);
                if quiet_ms >= self.cfg.release_buffer_ms && elapsed >= self.cfg.min_episode_ms {
                    self.finish_episode();
                    return TriggerDecision::Stop(StopCause::Released { quiet_ms });
                }
                TriggerDecision::Continue
            }
        }
    }

    /// Aborts an in-flight episode, e.g. on shutdown or device loss.
    /// Returns `None` when the machine was already idle.
    pub fn cancel(&mut self) -> Option<StopCause> {
        if self.phase == Phase::Idle {
            return None;
        }
        self.finish_episode();
        Some(StopCause::Cancelled)
    }

    fn finish_episode(&mut self) {
        self.phase = Phase::Idle;
        self.below_since_ms = None;
    }

    fn cooldown_elapsed(&self, now_ms: u64) -> bool {
        match self.last_trigger_ms {
            None => true,
            Some(at) => {
                now_ms.saturating_sub(at) >= self.cfg.release_buffer_ms + COOLDOWN_MARGIN_MS
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn with_max_episode_ms(cfg: TriggerConfig, max_episode_ms: u64) -> Self {
        let mut machine = Self::new(cfg);
        machine.max_episode_ms = max_episode_ms;
        machine
    }
}
