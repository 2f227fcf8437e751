use super::encode::{finalize_wav, EncodedChunk};
use super::meter::MIN_DB;
use super::trigger::StopCause;

/// One in-flight recording, from trigger to stop.
///
/// Collects the pre-roll snapshot taken at trigger time plus every live
/// chunk, and tracks the loudest metering tick seen while the episode ran.
pub struct CaptureEpisode {
    started_at_ms: u64,
    peak_db: f32,
    chunks: Vec<EncodedChunk>,
    preroll_chunks: usize,
}

impl CaptureEpisode {
    pub fn begin(now_ms: u64, preroll: Vec<EncodedChunk>) -> Self {
        let preroll_chunks = preroll.len();
        Self {
            started_at_ms: now_ms,
            peak_db: MIN_DB,
            chunks: preroll,
            preroll_chunks,
        }
    }

    pub fn started_at_ms(&self) -> u64 {
        self.started_at_ms
    }

    pub fn peak_db(&self) -> f32 {
        self.peak_db
    }

    pub fn observe_level(&mut self, level_db: f32) {
        if level_db > self.peak_db {
            self.peak_db = level_db;
        }
    }

    pub fn push_chunk(&mut self, chunk: EncodedChunk) {
        self.chunks.push(chunk);
    }

    /// Assembles the final WAV blob. Returns `None` when no audio payload
    /// was collected; such episodes are dropped without touching any sink.
    pub fn finalize(
        self,
        header: &EncodedChunk,
        now_ms: u64,
        cause: StopCause,
    ) -> Option<FinishedCapture> {
        let live_chunks = self.chunks.len() - self.preroll_chunks;
        let wav = finalize_wav(header, &self.chunks)?;
        let duration_ms = now_ms.saturating_sub(self.started_at_ms);
        Some(FinishedCapture {
            wav,
            peak_db: self.peak_db,
            duration_seconds: duration_ms as f64 / 1000.0,
            started_at_ms: self.started_at_ms,
            cause,
            preroll_chunks: self.preroll_chunks,
            live_chunks,
        })
    }
}

/// A completed episode, ready for the classification gate.
#[derive(Clone, Debug)]
pub struct FinishedCapture {
    /// Finalized WAV blob, sizes patched.
    pub wav: Vec<u8>,
    /// Loudest metering tick during the episode, dBFS.
    pub peak_db: f32,
    /// Wall-clock trigger-to-stop span. Pre-roll audio extends the blob but
    /// not this figure.
    pub duration_seconds: f64,
    pub started_at_ms: u64,
    pub cause: StopCause,
    pub preroll_chunks: usize,
    pub live_chunks: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::encode::WavChunkEncoder;

    fn encoder() -> WavChunkEncoder {
        WavChunkEncoder::new(1000, 100)
    }

    fn payload_chunk(at_ms: u64) -> EncodedChunk {
        EncodedChunk {
            at_ms,
            data: vec![0u8; 200],
        }
    }

    #[test]
    fn empty_episode_finalizes_to_none() {
        let episode = CaptureEpisode::begin(100, Vec::new());
        let header = encoder().init_chunk();
        assert!(episode
            .finalize(&header, 500, StopCause::MaxDuration)
            .is_none());
    }

    #[test]
    fn duration_is_wall_clock_not_chunk_count() {
        let mut episode = CaptureEpisode::begin(200, vec![payload_chunk(100)]);
        episode.push_chunk(payload_chunk(300));
        let header = encoder().init_chunk();
        let finished = episode
            .finalize(&header, 1500, StopCause::Released { quiet_ms: 1000 })
            .unwrap();
        // Two chunks (~200 ms of audio) but 1.3 s of wall clock.
        assert!((finished.duration_seconds - 1.3).abs() < 1e-9);
        assert_eq!(finished.preroll_chunks, 1);
        assert_eq!(finished.live_chunks, 1);
    }

    #[test]
    fn peak_tracks_loudest_tick() {
        let mut episode = CaptureEpisode::begin(0, Vec::new());
        episode.observe_level(-32.0);
        episode.observe_level(-18.5);
        episode.observe_level(-40.0);
        assert_eq!(episode.peak_db(), -18.5);
    }

    #[test]
    fn preroll_only_episode_still_finalizes() {
        let episode = CaptureEpisode::begin(500, vec![payload_chunk(400)]);
        let header = encoder().init_chunk();
        let finished = episode
            .finalize(&header, 600, StopCause::Cancelled)
            .unwrap();
        assert_eq!(finished.wav.len(), 44 + 200);
        assert_eq!(finished.live_chunks, 0);
        assert_eq!(finished.cause, StopCause::Cancelled);
    }
}
