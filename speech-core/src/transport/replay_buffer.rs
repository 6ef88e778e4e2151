//! Bounded FIFO of chunks held while the transport is reconnecting.

use std::collections::VecDeque;

use tracing::warn;

use crate::model::AudioChunk;

/// At most 100 chunks (~20s at 200ms/chunk), deep-copied on insertion.
pub const CAPACITY: usize = 100;

/// Replay buffer: producer is `send_audio` while `reconnecting`, consumer is
/// the reconnection flush. Overflow drops the oldest entry and counts it.
pub struct ReplayBuffer {
    entries: VecDeque<AudioChunk>,
    dropped_counter: u64,
}

impl ReplayBuffer {
    pub fn new() -> Self {
        Self { entries: VecDeque::with_capacity(CAPACITY), dropped_counter: 0 }
    }

    /// Deep-copies `chunk` in. If full, drops the oldest entry first.
    pub fn push(&mut self, chunk: AudioChunk) {
        if self.entries.len() >= CAPACITY {
            self.entries.pop_front();
            self.dropped_counter += 1;
            warn!(
                dropped_total = self.dropped_counter,
                "replay buffer overflow, dropped oldest chunk"
            );
        }
        self.entries.push_back(chunk);
    }

    pub fn dropped_counter(&self) -> u64 {
        self.dropped_counter
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drains all entries in insertion order for the flush; clears the
    /// dropped counter as the spec requires "on completion" of flush. The
    /// caller is responsible for pacing sends (10ms between each).
    pub fn drain_for_flush(&mut self) -> Vec<AudioChunk> {
        let drained: Vec<_> = self.entries.drain(..).collect();
        self.dropped_counter = 0;
        drained
    }
}

impl Default for ReplayBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(seq: u64) -> AudioChunk {
        AudioChunk::new(vec![0i16; crate::model::CHUNK_SAMPLES], seq, 0)
    }

    #[test]
    fn preserves_insertion_order() {
        let mut buf = ReplayBuffer::new();
        for i in 0..5 {
            buf.push(chunk(i));
        }
        let drained = buf.drain_for_flush();
        let seqs: Vec<u64> = drained.iter().map(|c| c.sequence_id).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn overflow_drops_oldest_and_counts() {
        let mut buf = ReplayBuffer::new();
        for i in 0..(CAPACITY as u64 + 3) {
            buf.push(chunk(i));
        }
        assert_eq!(buf.len(), CAPACITY);
        assert_eq!(buf.dropped_counter(), 3);
        let drained = buf.drain_for_flush();
        // Oldest 3 (seq 0,1,2) were evicted; first remaining is seq 3.
        assert_eq!(drained.first().unwrap().sequence_id, 3);
    }

    #[test]
    fn flush_clears_buffer_and_counter() {
        let mut buf = ReplayBuffer::new();
        for i in 0..(CAPACITY as u64 + 1) {
            buf.push(chunk(i));
        }
        assert!(buf.dropped_counter() > 0);
        buf.drain_for_flush();
        assert!(buf.is_empty());
        assert_eq!(buf.dropped_counter(), 0);
    }
}
