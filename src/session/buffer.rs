//! Session buffer for gaze samples
//!
//! Append-only while tracking runs, with any number of concurrent readers.
//! The sampler thread is the only writer. When a capacity is set the oldest
//! samples are evicted once it is reached.

use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::protocol::GazeSample;

/// Ordered store of the active session's samples
pub struct SessionBuffer {
    samples: RwLock<VecDeque<GazeSample>>,
    capacity: Option<usize>,
    appended: AtomicU64,
    evicted: AtomicU64,
}

impl SessionBuffer {
    /// Create an unbounded buffer
    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    /// Create a buffer holding at most `capacity` samples
    pub fn bounded(capacity: usize) -> Self {
        Self::with_capacity(Some(capacity))
    }

    pub fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            samples: RwLock::new(VecDeque::new()),
            capacity: capacity.map(|c| c.max(1)),
            appended: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
        }
    }

    /// Append a sample, evicting the oldest one if the buffer is full
    pub fn append(&self, sample: GazeSample) {
        let mut samples = self.samples.write();

        if let Some(capacity) = self.capacity {
            if samples.len() >= capacity {
                samples.pop_front();
                self.evicted.fetch_add(1, Ordering::Relaxed);
            }
        }

        samples.push_back(sample);
        self.appended.fetch_add(1, Ordering::Relaxed);
    }

    /// Consistent ordered copy of everything buffered
    pub fn snapshot(&self) -> Vec<GazeSample> {
        self.samples.read().iter().copied().collect()
    }

    /// Ordered copy plus a mark for [`discard_through`](Self::discard_through)
    pub fn snapshot_marked(&self) -> (Vec<GazeSample>, SnapshotMark) {
        let samples = self.samples.read();
        let mark = SnapshotMark(self.appended.load(Ordering::Relaxed));
        (samples.iter().copied().collect(), mark)
    }

    /// Drop the samples covered by `mark`, keeping anything appended since
    pub fn discard_through(&self, mark: SnapshotMark) -> usize {
        let mut samples = self.samples.write();
        let appended = self.appended.load(Ordering::Relaxed);
        let newer = appended.saturating_sub(mark.0) as usize;
        let count = samples.len().saturating_sub(newer);
        samples.drain(..count);
        count
    }

    /// Drop all buffered samples
    pub fn clear(&self) {
        self.samples.write().clear();
    }

    pub fn len(&self) -> usize {
        self.samples.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.read().is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Most recent sample
    pub fn latest(&self) -> Option<GazeSample> {
        self.samples.read().back().copied()
    }

    pub fn stats(&self) -> BufferStats {
        BufferStats {
            len: self.len(),
            capacity: self.capacity,
            appended: self.appended.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
        }
    }
}

impl Default for SessionBuffer {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// Position in the append sequence at the time of a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotMark(u64);

/// Thread-safe handle to a session buffer
pub type SharedSessionBuffer = Arc<SessionBuffer>;

/// Session buffer statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct BufferStats {
    pub len: usize,
    pub capacity: Option<usize>,
    pub appended: u64,
    pub evicted: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::thread;

    #[test]
    fn test_append_and_snapshot() {
        let buffer = SessionBuffer::unbounded();

        buffer.append(GazeSample::new(1.0, 2.0, 10));
        buffer.append(GazeSample::new(3.0, 4.0, 20));

        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].timestamp_ms, 10);
        assert_eq!(snapshot[1].x, 3.0);
        assert_eq!(buffer.latest().map(|s| s.timestamp_ms), Some(20));
    }

    #[test]
    fn test_discard_through_keeps_later_samples() {
        let buffer = SessionBuffer::unbounded();
        buffer.append(GazeSample::new(1.0, 1.0, 10));
        buffer.append(GazeSample::new(2.0, 2.0, 20));

        let (exported, mark) = buffer.snapshot_marked();
        assert_eq!(exported.len(), 2);
        buffer.append(GazeSample::new(3.0, 3.0, 30));

        assert_eq!(buffer.discard_through(mark), 2);
        assert_eq!(buffer.snapshot(), vec![GazeSample::new(3.0, 3.0, 30)]);
    }

    #[test]
    fn test_discard_through_after_eviction() {
        let buffer = SessionBuffer::bounded(2);
        buffer.append(GazeSample::new(1.0, 1.0, 10));
        buffer.append(GazeSample::new(2.0, 2.0, 20));
        let (_, mark) = buffer.snapshot_marked();

        buffer.append(GazeSample::new(3.0, 3.0, 30));
        buffer.append(GazeSample::new(4.0, 4.0, 40));
        buffer.append(GazeSample::new(5.0, 5.0, 50));

        assert_eq!(buffer.discard_through(mark), 0);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_clear() {
        let buffer = SessionBuffer::unbounded();
        buffer.append(GazeSample::new(0.0, 0.0, 1));
        buffer.clear();

        assert!(buffer.is_empty());
        assert!(buffer.snapshot().is_empty());
        assert_eq!(buffer.stats().appended, 1);
    }

    #[test]
    fn test_bounded_evicts_oldest() {
        let buffer = SessionBuffer::bounded(3);
        for ts in 0..5 {
            buffer.append(GazeSample::new(0.0, 0.0, ts));
        }

        let timestamps: Vec<i64> = buffer.snapshot().iter().map(|s| s.timestamp_ms).collect();
        assert_eq!(timestamps, vec![2, 3, 4]);

        let stats = buffer.stats();
        assert_eq!(stats.len, 3);
        assert_eq!(stats.evicted, 2);
        assert_eq!(stats.appended, 5);
    }

    #[test]
    fn test_snapshot_during_concurrent_append() {
        let buffer = Arc::new(SessionBuffer::unbounded());

        let writer = {
            let buffer = buffer.clone();
            thread::spawn(move || {
                for ts in 0..2_000 {
                    buffer.append(GazeSample::new(ts as f64, 0.0, ts));
                }
            })
        };

        let mut previous_len = 0;
        while !writer.is_finished() {
            let snapshot = buffer.snapshot();
            assert!(snapshot.len() >= previous_len);
            assert!(snapshot.windows(2).all(|w| w[0].timestamp_ms <= w[1].timestamp_ms));
            previous_len = snapshot.len();
        }
        writer.join().unwrap();

        assert_eq!(buffer.len(), 2_000);
    }

    proptest! {
        #[test]
        fn prop_snapshot_preserves_append_order(
            mut timestamps in proptest::collection::vec(0i64..1_000_000, 0..200),
            capacity in 1usize..64,
        ) {
            timestamps.sort_unstable();
            let buffer = SessionBuffer::bounded(capacity);
            for ts in &timestamps {
                buffer.append(GazeSample::new(0.0, 0.0, *ts));
            }

            let kept: Vec<i64> = buffer.snapshot().iter().map(|s| s.timestamp_ms).collect();
            let start = timestamps.len().saturating_sub(capacity);
            prop_assert_eq!(kept, timestamps[start..].to_vec());
        }
    }
}
