//! Streaming WAV encoder.
//!
//! The capture pipeline never holds a growable recording in one buffer.
//! Samples are encoded into fixed-interval chunks as they arrive so the
//! pre-roll ring can retain a bounded window of recent audio, and an episode
//! is assembled by concatenating the header chunk with whatever chunks were
//! selected. Sizes in the header are placeholders until [`finalize_wav`]
//! patches them, so a finalized blob is a well-formed standalone WAV file.

const WAV_HEADER_LEN: usize = 44;
const RIFF_SIZE_OFFSET: usize = 4;
const DATA_SIZE_OFFSET: usize = 40;
const SIZE_PLACEHOLDER: u32 = 0xFFFF_FFFF;

/// One encoded slice of the capture stream.
///
/// The first chunk of any stream is the WAV header (`is_header() == true`);
/// every later chunk is raw PCM16LE payload covering one encoder interval.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodedChunk {
    /// Engine clock at the moment the chunk was completed.
    pub at_ms: u64,
    pub data: Vec<u8>,
}

impl EncodedChunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_header(&self) -> bool {
        self.data.len() >= 12 && &self.data[..4] == b"RIFF" && &self.data[8..12] == b"WAVE"
    }
}

/// Groups mono f32 frames into fixed-interval PCM16 chunks.
pub struct WavChunkEncoder {
    sample_rate: u32,
    samples_per_chunk: usize,
    pending: Vec<u8>,
}

impl WavChunkEncoder {
    pub fn new(sample_rate: u32, chunk_interval_ms: u64) -> Self {
        let samples_per_chunk =
            ((sample_rate as u64 * chunk_interval_ms) / 1000).max(1) as usize;
        Self {
            sample_rate,
            samples_per_chunk,
            pending: Vec::with_capacity(samples_per_chunk * 2),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Header chunk with placeholder sizes. Emitted once per stream and kept
    /// outside the pre-roll ring so eviction can never orphan the payload.
    pub fn init_chunk(&self) -> EncodedChunk {
        EncodedChunk {
            at_ms: 0,
            data: wav_header(self.sample_rate).to_vec(),
        }
    }

    /// Appends a frame of samples, emitting every chunk that filled up.
    pub fn push_samples(&mut self, samples: &[f32], now_ms: u64) -> Vec<EncodedChunk> {
        self.pending.reserve(samples.len() * 2);
        for &sample in samples {
            let value = (sample.clamp(-1.0, 1.0) * 32767.0).round() as i16;
            self.pending.extend_from_slice(&value.to_le_bytes());
        }
        let chunk_bytes = self.samples_per_chunk * 2;
        let mut out = Vec::new();
        while self.pending.len() >= chunk_bytes {
            let rest = self.pending.split_off(chunk_bytes);
            let data = std::mem::replace(&mut self.pending, rest);
            out.push(EncodedChunk { at_ms: now_ms, data });
        }
        out
    }

    /// Emits the partial chunk still buffered, if any. Called when an
    /// episode stops so the tail of the sound is not lost.
    pub fn flush(&mut self, now_ms: u64) -> Option<EncodedChunk> {
        if self.pending.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.pending);
        Some(EncodedChunk { at_ms: now_ms, data })
    }
}

fn wav_header(sample_rate: u32) -> [u8; WAV_HEADER_LEN] {
    let mut header = [0u8; WAV_HEADER_LEN];
    let byte_rate = sample_rate * 2;
    header[..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&SIZE_PLACEHOLDER.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM
    header[22..24].copy_from_slice(&1u16.to_le_bytes()); // mono
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&2u16.to_le_bytes()); // block align
    header[34..36].copy_from_slice(&16u16.to_le_bytes());
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&SIZE_PLACEHOLDER.to_le_bytes());
    header
}

/// Concatenates a header chunk and payload chunks into one WAV blob, then
/// patches the RIFF and data sizes that were placeholders during streaming.
///
/// Returns `None` when the payload is empty. A header with no audio behind
/// it is not a recording, so callers drop the episode instead of saving a
/// 44-byte husk.
pub fn finalize_wav<'a, I>(header: &EncodedChunk, chunks: I) -> Option<Vec<u8>>
where
    I: IntoIterator<Item = &'a EncodedChunk>,
{
    let mut blob = header.data.clone();
    for chunk in chunks {
        blob.extend_from_slice(&chunk.data);
    }
    if blob.len() <= WAV_HEADER_LEN {
        return None;
    }
    let riff_size = (blob.len() - 8) as u32;
    let data_size = (blob.len() - WAV_HEADER_LEN) as u32;
    blob[RIFF_SIZE_OFFSET..RIFF_SIZE_OFFSET + 4].copy_from_slice(&riff_size.to_le_bytes());
    blob[DATA_SIZE_OFFSET..DATA_SIZE_OFFSET + 4].copy_from_slice(&data_size.to_le_bytes());
    Some(blob)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(samples: usize) -> Vec<f32> {
        (0..samples).map(|i| 0.25 * (i as f32 * 0.2).sin()).collect()
    }

    #[test]
    fn header_chunk_is_well_formed() {
        let encoder = WavChunkEncoder::new(48_000, 100);
        let init = encoder.init_chunk();
        assert!(init.is_header());
        assert_eq!(init.len(), WAV_HEADER_LEN);
        // Placeholder sizes until finalize.
        assert_eq!(&init.data[4..8], &SIZE_PLACEHOLDER.to_le_bytes());
        assert_eq!(&init.data[40..44], &SIZE_PLACEHOLDER.to_le_bytes());
        // 48 kHz mono 16-bit.
        assert_eq!(&init.data[24..28], &48_000u32.to_le_bytes());
        assert_eq!(&init.data[22..24], &1u16.to_le_bytes());
        assert_eq!(&init.data[34..36], &16u16.to_le_bytes());
    }

    #[test]
    fn chunks_emit_at_fixed_cadence() {
        // 1 kHz * 100 ms = 100 samples per chunk.
        let mut encoder = WavChunkEncoder::new(1000, 100);
        assert!(encoder.push_samples(&tone(60), 10).is_empty());
        let chunks = encoder.push_samples(&tone(60), 20);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 200);
        assert_eq!(chunks[0].at_ms, 20);
    }

    #[test]
    fn oversized_frame_yields_multiple_chunks() {
        let mut encoder = WavChunkEncoder::new(1000, 100);
        let chunks = encoder.push_samples(&tone(250), 5);
        assert_eq!(chunks.len(), 2);
        let tail = encoder.flush(6).unwrap();
        assert_eq!(tail.len(), 100);
    }

    #[test]
    fn flush_on_empty_encoder_is_none() {
        let mut encoder = WavChunkEncoder::new(1000, 100);
        assert!(encoder.flush(0).is_none());
        let _ = encoder.push_samples(&tone(100), 1);
        assert!(encoder.flush(2).is_none());
    }

    #[test]
    fn finalize_patches_sizes() {
        let mut encoder = WavChunkEncoder::new(1000, 100);
        let init = encoder.init_chunk();
        let chunks = encoder.push_samples(&tone(100), 1);
        let blob = finalize_wav(&init, &chunks).unwrap();
        assert_eq!(blob.len(), WAV_HEADER_LEN + 200);
        let riff = u32::from_le_bytes(blob[4..8].try_into().unwrap());
        let data = u32::from_le_bytes(blob[40..44].try_into().unwrap());
        assert_eq!(riff as usize, blob.len() - 8);
        assert_eq!(data as usize, blob.len() - 44);
    }

    #[test]
    fn finalize_without_payload_is_none() {
        let encoder = WavChunkEncoder::new(1000, 100);
        let init = encoder.init_chunk();
        assert!(finalize_wav(&init, &[]).is_none());
    }

    #[test]
    fn finalized_blob_decodes_round() {
        let mut encoder = WavChunkEncoder::new(8000, 100);
        let init = encoder.init_chunk();
        let mut chunks = encoder.push_samples(&tone(2000), 1);
        chunks.extend(encoder.flush(2));
        let blob = finalize_wav(&init, &chunks).unwrap();

        let mut reader = hound::WavReader::new(std::io::Cursor::new(blob)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 8000);
        assert_eq!(spec.bits_per_sample, 16);
        let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded.len(), 2000);
        // Spot-check a sample against the direct conversion.
        let expected = (0.25 * (10.0_f32 * 0.2).sin() * 32767.0).round() as i16;
        assert_eq!(decoded[10], expected);
    }

    #[test]
    fn conversion_clamps_out_of_range_samples() {
        let mut encoder = WavChunkEncoder::new(1000, 100);
        let mut chunks = encoder.push_samples(&[2.0, -2.0], 0);
        chunks.extend(encoder.flush(0));
        let data = &chunks[0].data;
        assert_eq!(i16::from_le_bytes([data[0], data[1]]), 32767);
        assert_eq!(i16::from_le_bytes([data[2], data[3]]), -32767);
    }
}
