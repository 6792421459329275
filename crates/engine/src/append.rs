/// Write path: `append_timestamps()`.
///
/// Only one thread may append. Every field it touches is either private to
/// the writer until published or grows monotonically, so readers never need
/// a lock. The writer holds its own handle to the newest slot's records and
/// never locks a slot.
use slot::{Record, RecordArray, Slot};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::warn;

use crate::TimestampStore;

impl TimestampStore {
    /// Appends `count` samples that share `timestamp`.
    ///
    /// `timestamp` must not be older than the previous append. This is not
    /// checked; a regressing timestamp leaves lookups with undefined answers.
    ///
    /// An append that would exceed the configured maximum sample count is
    /// dropped and logged once.
    pub fn append_timestamps(&self, timestamp: i64, count: u64) {
        if count == 0 {
            return;
        }

        let sample_count = self.sample_count.load(Ordering::Relaxed);
        let record_count = self.record_count.load(Ordering::Relaxed);

        let Some(new_sample_count) = sample_count
            .checked_add(count)
            .filter(|&n| n <= self.config.max_sample_count)
        else {
            self.warn_capacity(sample_count, count);
            return;
        };

        let mut active = self.active_records.lock();

        if record_count > 0 && self.last_timestamp.load(Ordering::Relaxed) == timestamp {
            self.widen_latest(active.as_deref(), record_count - 1, count);
            self.sample_count.store(new_sample_count, Ordering::Release);
            return;
        }

        let slot_size = self.config.slot_size as u64;
        let slot_index = (record_count / slot_size) as usize;
        let offset = (record_count % slot_size) as usize;

        if offset == 0 {
            let Some(records) = self.open_slot(slot_index) else {
                self.warn_capacity(sample_count, count);
                return;
            };
            *active = Some(records);
        }
        let (Some(slot), Some(records)) = (self.slot(slot_index), active.as_ref()) else {
            return;
        };

        records.store(offset, Record::new(sample_count, count, timestamp));

        let block = slot.block(offset / self.config.block_size);
        if offset % self.config.block_size == 0 {
            block.seed(timestamp, sample_count, count);
        } else {
            block.extend(timestamp, count);
        }

        if record_count == 0 {
            self.first_timestamp.store(timestamp, Ordering::Relaxed);
        }
        self.last_timestamp.store(timestamp, Ordering::Relaxed);

        self.record_count.store(record_count + 1, Ordering::Release);
        self.sample_count.store(new_sample_count, Ordering::Release);
    }

    /// Adds `count` samples to record `record_index` and its block.
    /// `active` holds the records of the newest slot, which is the one
    /// `record_index` lives in.
    fn widen_latest(&self, active: Option<&RecordArray>, record_index: u64, count: u64) {
        let slot_size = self.config.slot_size as u64;
        let slot_index = (record_index / slot_size) as usize;
        let offset = (record_index % slot_size) as usize;

        let Some(slot) = self.slot(slot_index) else {
            return;
        };
        if let Some(records) = active {
            records.widen(offset, count);
        }
        slot.block(offset / self.config.block_size).widen(count);
    }

    /// Allocates slot `slot_index` around a fresh record array, pages out the
    /// slot two behind, and returns the writer's handle to the new records.
    /// `None` if the index is past the directory.
    fn open_slot(&self, slot_index: usize) -> Option<Arc<RecordArray>> {
        let records = Arc::new(RecordArray::new(self.config.slot_size));
        let blocks_per_slot = self.config.blocks_per_slot();
        self.slots.get_or_init(slot_index, || {
            Slot::with_records(slot_index, Arc::clone(&records), blocks_per_slot)
        })?;
        if slot_index >= 2 {
            self.page_out(slot_index - 2);
        }
        Some(records)
    }

    fn warn_capacity(&self, sample_count: u64, count: u64) {
        if !self.capacity_warned.swap(true, Ordering::Relaxed) {
            warn!(
                sample_count,
                count,
                max = self.config.max_sample_count,
                "timestamp store is full, dropping appended samples"
            );
        }
    }
}
