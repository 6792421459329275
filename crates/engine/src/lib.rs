//! # Engine - paged timestamp store
//!
//! Stores the timestamp of every acquired sample for one data source and
//! answers the questions a chart renderer asks every frame: which sample is
//! closest to this time, and what are the timestamps of this span of samples.
//!
//! ## Architecture
//!
//! ```text
//! acquisition thread (one writer)          chart threads (many readers)
//!        |                                        |
//!        v                                        v
//! ┌───────────────────────────────────────────────────────────────┐
//! │                      TIMESTAMP STORE                          │
//! │                                                               │
//! │ append.rs → widen latest record, or open a new one            │
//! │              |                                                │
//! │              |  (first record of slot N?)                     │
//! │              |            yes                                 │
//! │              v                                                │
//! │ paging.rs → page out slot N-2 on a background thread          │
//! │                                                               │
//! │ lookup.rs → block summaries → records of one block            │
//! │ cache.rs  → RangeCache per reader, filled slot by slot        │
//! │              (memory if resident, overflow file otherwise)    │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module       | Purpose                                                   |
//! |-------------|-----------------------------------------------------------|
//! | [`lib.rs`]  | `TimestampStore` struct, constructor, accessors, `Debug`  |
//! | [`append`]  | `append_timestamps()`                                     |
//! | [`lookup`]  | `closest_at_or_before()`, `closest_after()`               |
//! | [`cache`]   | `RangeCache`, `get_timestamp()`, `get_range()`            |
//! | [`paging`]  | page-out, disk fallback reads, `clear()`, `dispose()`     |
//! | [`source`]  | what the store needs from the owning connection           |
//! | [`fault`]   | where I/O failures are reported                           |
//!
//! ## Concurrency
//!
//! There is no reader-writer lock, and the writer takes no lock a reader or
//! page-out thread can hold. The writer only ever grows state:
//! records are widened in place or appended, block maxima only increase, and
//! `record_count` / `sample_count` are published with release stores after
//! the data they cover. A reader acquires the counters first and never looks
//! past them, so whatever it sees is some valid earlier state of the store.
//!
//! `clear()` takes `&mut self` and `dispose()` takes `self`: a store shared
//! behind an `Arc`, or borrowed by a live [`RangeCache`], cannot be cleared.

mod append;
mod cache;
mod fault;
mod lookup;
mod paging;
mod source;

use anyhow::{Context, Result};
use config::StoreConfig;
use overflow::OverflowFile;
use parking_lot::Mutex;
use slot::{BlockSummary, RecordArray, Slot, SlotDirectory, SlotState};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

pub use cache::RangeCache;
pub use fault::{FaultReporter, LogReporter};
pub use source::{AcquisitionCounter, Detached, SampleSource};

/// Timestamp storage for one data source.
///
/// # Write Path
///
/// 1. If the timestamp equals the latest record's, widen that record.
/// 2. Otherwise write a new record, allocating its slot on first use and
///    paging out the slot two behind it.
/// 3. Seed or extend the covering block summary.
/// 4. Publish `record_count`, then `sample_count`.
///
/// # Read Path
///
/// 1. Scan block summaries to find the one block that can hold the answer.
/// 2. Read that block's records from memory, or from the overflow file once
///    any in-flight page-out of its slot has finished.
pub struct TimestampStore {
    pub(crate) config: StoreConfig,

    /// Samples stored so far. Written only by the writer.
    pub(crate) sample_count: AtomicU64,
    /// Records stored so far. Written only by the writer.
    pub(crate) record_count: AtomicU64,

    pub(crate) first_timestamp: AtomicI64,
    pub(crate) last_timestamp: AtomicI64,

    /// One entry per addressable slot index.
    pub(crate) slots: SlotDirectory,
    /// The writer's own handle to the records of the newest slot. Only
    /// `append_timestamps()` and `clear()` touch it, so it is never contended.
    pub(crate) active_records: Mutex<Option<Arc<RecordArray>>>,

    pub(crate) file: Arc<OverflowFile>,
    pub(crate) source: Arc<dyn SampleSource>,
    pub(crate) reporter: Arc<dyn FaultReporter>,

    /// Set once the capacity warning has been logged.
    pub(crate) capacity_warned: AtomicBool,
}

impl std::fmt::Debug for TimestampStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimestampStore")
            .field("path", &self.file.path())
            .field("slot_size", &self.config.slot_size)
            .field("block_size", &self.config.block_size)
            .field("sample_count", &self.sample_count())
            .field("record_count", &self.record_count())
            .field("allocated_slots", &self.allocated_slot_count())
            .field("resident_slots", &self.resident_slot_count())
            .finish()
    }
}

impl TimestampStore {
    /// Creates an empty store backed by a fresh overflow file at `path`.
    ///
    /// Any existing file at `path` is truncated: the overflow file is a cache
    /// and never outlives the store that wrote it.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid or the overflow file cannot
    /// be created.
    pub fn open<P: AsRef<Path>>(path: P, config: StoreConfig) -> Result<Self> {
        config.validate()?;

        let path = path.as_ref();
        let file = OverflowFile::create(path)
            .with_context(|| format!("unable to create the cache file {}", path.display()))?;

        Ok(Self {
            slots: new_directory(&config),
            active_records: Mutex::new(None),
            config,
            sample_count: AtomicU64::new(0),
            record_count: AtomicU64::new(0),
            first_timestamp: AtomicI64::new(0),
            last_timestamp: AtomicI64::new(0),
            file: Arc::new(file),
            source: Arc::new(Detached),
            reporter: Arc::new(LogReporter),
            capacity_warned: AtomicBool::new(false),
        })
    }

    /// Creates a store whose overflow file is `<cache_dir>/<name>.bin`.
    pub fn open_in_cache_dir(name: &str, config: StoreConfig) -> Result<Self> {
        let path = config.cache_dir.join(format!("{name}.bin"));
        Self::open(path, config)
    }

    /// Attaches the owning connection.
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn SampleSource>) -> Self {
        self.source = source;
        self
    }

    /// Replaces the default [`LogReporter`].
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn FaultReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Number of samples stored.
    #[must_use]
    pub fn sample_count(&self) -> u64 {
        self.sample_count.load(Ordering::Acquire)
    }

    /// Number of records (distinct timestamp runs) stored.
    #[must_use]
    pub fn record_count(&self) -> u64 {
        self.record_count.load(Ordering::Acquire)
    }

    /// Timestamp of sample 0, or `None` if the store is empty.
    #[must_use]
    pub fn first_timestamp(&self) -> Option<i64> {
        (self.sample_count() > 0).then(|| self.first_timestamp.load(Ordering::Relaxed))
    }

    /// Timestamp of the newest sample, or `None` if the store is empty.
    #[must_use]
    pub fn last_timestamp(&self) -> Option<i64> {
        (self.sample_count() > 0).then(|| self.last_timestamp.load(Ordering::Relaxed))
    }

    /// Samples a reader may request: the store's own count, clamped to what
    /// the owning connection reports as acquired.
    #[must_use]
    pub fn readable_sample_count(&self) -> u64 {
        self.sample_count().min(self.source.sample_count())
    }

    /// Residency of slot `slot_index`, or `None` if it was never allocated.
    #[must_use]
    pub fn slot_state(&self, slot_index: usize) -> Option<SlotState> {
        self.slot(slot_index).map(|s| s.state())
    }

    /// Number of slots allocated so far.
    #[must_use]
    pub fn allocated_slot_count(&self) -> usize {
        self.slots.iter().count()
    }

    /// Number of allocated slots whose records are in memory.
    #[must_use]
    pub fn resident_slot_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.state() == SlotState::Resident)
            .count()
    }

    pub(crate) fn slot(&self, slot_index: usize) -> Option<&Arc<Slot>> {
        self.slots.get(slot_index)
    }

    /// Summary of global block `block_index`.
    pub(crate) fn block(&self, block_index: usize) -> Option<&BlockSummary> {
        let per_slot = self.config.blocks_per_slot();
        self.slot(block_index / per_slot)
            .map(|s| s.block(block_index % per_slot))
    }

    /// Index of the block holding the newest record. Requires `record_count > 0`.
    pub(crate) fn last_block(&self, record_count: u64) -> usize {
        ((record_count - 1) / self.config.block_size as u64) as usize
    }
}

fn new_directory(config: &StoreConfig) -> SlotDirectory {
    SlotDirectory::new(config.max_slot_count())
}

#[cfg(test)]
mod tests;
