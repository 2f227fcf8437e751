use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Meter floor in dBFS. Silence and empty frames report this value.
pub const MIN_DB: f32 = -60.0;
/// Meter ceiling in dBFS. Full-scale signal reports this value.
pub const MAX_DB: f32 = 0.0;

/// Guards `log10` against zero-energy frames. Matches a meter floor well
/// below `MIN_DB` so the clamp, not the epsilon, decides the displayed value.
const RMS_EPSILON: f32 = 1e-4;

/// Shared sound-level cell updated by the capture worker and read by the UI.
///
/// The level is stored as raw f32 bits in an atomic so the audio path never
/// takes a lock to publish a reading.
#[derive(Clone, Debug)]
pub struct LiveMeter {
    level_bits: Arc<AtomicU32>,
}

impl LiveMeter {
    pub fn new() -> Self {
        Self {
            level_bits: Arc::new(AtomicU32::new(MIN_DB.to_bits())),
        }
    }

    pub fn set_db(&self, db: f32) {
        self.level_bits.store(db.to_bits(), Ordering::Relaxed);
    }

    pub fn level_db(&self) -> f32 {
        f32::from_bits(self.level_bits.load(Ordering::Relaxed))
    }
}

impl Default for LiveMeter {
    fn default() -> Self {
        Self::new()
    }
}

/// RMS sound level of a frame in dBFS, clamped to `[MIN_DB, MAX_DB]`.
pub fn level_from_samples(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return MIN_DB;
    }
    let energy: f32 = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    let rms = energy.sqrt().max(RMS_EPSILON);
    (20.0 * rms.log10()).clamp(MIN_DB, MAX_DB)
}
