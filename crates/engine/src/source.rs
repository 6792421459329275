/// What the store needs to know about the connection that feeds it.
///
/// Readers never look past the number of samples the connection says it has
/// acquired, even if the store itself already holds more. A connection that
/// is running a stress test asks the store to drop cold slots instead of
/// writing them to disk.
use std::sync::atomic::{AtomicU64, Ordering};

pub trait SampleSource: Send + Sync {
    /// Samples the connection has fully acquired.
    fn sample_count(&self) -> u64;

    /// Whether paged-out slots should be discarded instead of persisted.
    fn is_stress_test(&self) -> bool {
        false
    }
}

/// Source for a store with no connection: readers are limited only by the
/// store's own sample count.
#[derive(Debug, Default, Clone, Copy)]
pub struct Detached;

impl SampleSource for Detached {
    fn sample_count(&self) -> u64 {
        u64::MAX
    }
}

/// Counter kept by an acquisition loop and shared with its stores.
#[derive(Debug, Default)]
pub struct AcquisitionCounter {
    count: AtomicU64,
    stress_test: bool,
}

impl AcquisitionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A counter whose stores discard cold slots.
    pub fn stress_test() -> Self {
        Self {
            count: AtomicU64::new(0),
            stress_test: true,
        }
    }

    /// Records `n` more acquired samples. Call after the samples (and their
    /// timestamps) have been appended.
    pub fn add(&self, n: u64) {
        self.count.fetch_add(n, Ordering::Release);
    }

    pub fn reset(&self) {
        self.count.store(0, Ordering::Release);
    }
}

impl SampleSource for AcquisitionCounter {
    fn sample_count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    fn is_stress_test(&self) -> bool {
        self.stress_test
    }
}
