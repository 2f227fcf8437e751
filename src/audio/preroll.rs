use std::collections::VecDeque;

use super::encode::EncodedChunk;

/// Bounded FIFO of the most recent encoded chunks.
///
/// While the engine is idle every completed chunk lands here, and the oldest
/// chunk is evicted once the ring is full. When a trigger fires the ring is
/// snapshotted into the episode so the seconds leading up to the sound are
/// part of the recording. The WAV header chunk is owned by the session, not
/// the ring, so eviction can never drop it.
pub struct PrerollRing {
    chunks: VecDeque<EncodedChunk>,
    capacity: usize,
}

impl PrerollRing {
    /// Capacity covering `pre_buffer_ms` of audio at the encoder cadence,
    /// rounded up so a partial interval still gets a slot.
    pub fn window_capacity(pre_buffer_ms: u64, chunk_interval_ms: u64) -> usize {
        let interval = chunk_interval_ms.max(1);
        pre_buffer_ms.div_ceil(interval) as usize
    }

    pub fn for_window(pre_buffer_ms: u64, chunk_interval_ms: u64) -> Self {
        Self::with_capacity(Self::window_capacity(pre_buffer_ms, chunk_interval_ms))
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            chunks: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn push(&mut self, chunk: EncodedChunk) {
        if self.capacity == 0 {
            return;
        }
        while self.chunks.len() >= self.capacity {
            self.chunks.pop_front();
        }
        self.chunks.push_back(chunk);
    }

    /// Adjusts the capacity in place, evicting oldest-first when shrinking.
    /// Lets a pre-buffer change apply without restarting the session.
    pub fn resize(&mut self, capacity: usize) {
        self.capacity = capacity;
        while self.chunks.len() > capacity {
            self.chunks.pop_front();
        }
    }

    /// Oldest-first copy of the buffered chunks.
    pub fn snapshot(&self) -> Vec<EncodedChunk> {
        self.chunks.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
    }
}
