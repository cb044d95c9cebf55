// SampleRing - bounded ring of recent audio samples
//
// The capture callback appends chunks, the analysis thread copies snapshots.
// Both sides go through one short-held mutex: the audio thread must never be
// parked for longer than the copy/evict work itself, so no computation
// happens inside the critical section.

use std::collections::VecDeque;
use std::sync::Mutex;

/// Thread-safe fixed-capacity ring of mono f32 samples.
///
/// Oldest samples are evicted first once `capacity` is exceeded. A snapshot
/// is a copy of the current contents in insertion order; it never observes a
/// partially written chunk.
pub struct SampleRing {
    inner: Mutex<VecDeque<f32>>,
    capacity: usize,
}

impl SampleRing {
    /// Create a ring holding at most `capacity` samples.
    ///
    /// # Panics
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than 0");
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append samples in order, evicting the oldest beyond capacity.
    ///
    /// O(chunk length) amortized. Safe to call concurrently with
    /// `snapshot()`; the chunk becomes visible atomically.
    pub fn append(&self, chunk: &[f32]) {
        let mut buf = self.lock();
        if chunk.len() >= self.capacity {
            // Chunk alone fills the ring; keep only its tail.
            buf.clear();
            buf.extend(&chunk[chunk.len() - self.capacity..]);
            return;
        }
        let overflow = (buf.len() + chunk.len()).saturating_sub(self.capacity);
        if overflow > 0 {
            buf.drain(..overflow);
        }
        buf.extend(chunk);
    }

    /// Copy of all currently held samples in insertion order.
    pub fn snapshot(&self) -> Vec<f32> {
        let buf = self.lock();
        buf.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    // A poisoned lock only means another thread panicked mid-append; the
    // deque itself stays structurally valid, so recover instead of
    // propagating a panic into the real-time callback.
    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<f32>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
