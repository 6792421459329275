//! Coarse per-block summaries.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Plain copy of a [`BlockSummary`] taken at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockBounds {
    pub min_timestamp: i64,
    pub max_timestamp: i64,
    pub min_sample: u64,
    pub max_sample: u64,
}

/// Min/max timestamp and sample number over one block of records.
///
/// The min fields are written once when the block's first record arrives.
/// The max fields only ever grow.
#[derive(Debug, Default)]
pub struct BlockSummary {
    min_timestamp: AtomicI64,
    max_timestamp: AtomicI64,
    min_sample: AtomicU64,
    max_sample: AtomicU64,
}

impl BlockSummary {
    /// Starts the block with its first record.
    pub fn seed(&self, timestamp: i64, first_sample: u64, run_length: u64) {
        self.min_timestamp.store(timestamp, Ordering::Relaxed);
        self.max_timestamp.store(timestamp, Ordering::Relaxed);
        self.min_sample.store(first_sample, Ordering::Relaxed);
        self.max_sample
            .store(first_sample + run_length - 1, Ordering::Relaxed);
    }

    /// Accounts for a new record appended to a block that is already seeded.
    pub fn extend(&self, timestamp: i64, run_length: u64) {
        self.max_timestamp.fetch_max(timestamp, Ordering::Relaxed);
        self.max_sample.fetch_add(run_length, Ordering::Relaxed);
    }

    /// Accounts for samples added to the block's latest record.
    pub fn widen(&self, count: u64) {
        self.max_sample.fetch_add(count, Ordering::Relaxed);
    }

    pub fn min_timestamp(&self) -> i64 {
        self.min_timestamp.load(Ordering::Relaxed)
    }

    pub fn max_timestamp(&self) -> i64 {
        self.max_timestamp.load(Ordering::Relaxed)
    }

    pub fn min_sample(&self) -> u64 {
        self.min_sample.load(Ordering::Relaxed)
    }

    pub fn max_sample(&self) -> u64 {
        self.max_sample.load(Ordering::Relaxed)
    }

    pub fn bounds(&self) -> BlockBounds {
        BlockBounds {
            min_timestamp: self.min_timestamp(),
            max_timestamp: self.max_timestamp(),
            min_sample: self.min_sample(),
            max_sample: self.max_sample(),
        }
    }
}
