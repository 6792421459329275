/// Per-reader range cache: `create_cache()`, `get_timestamp()`,
/// `get_range()`, `get_range_relative()`.
///
/// Chart renderers ask for large, mostly overlapping spans every frame. A
/// [`RangeCache`] keeps a sliding window of decoded timestamps so that those
/// requests turn into one contiguous fill per slot instead of a lookup per
/// sample.
use tracing::debug;

use crate::TimestampStore;

/// Sliding window of timestamps `[start, start + cached_len)`.
///
/// The buffer holds `capacity` entries and never shrinks. Each reader owns
/// its own cache; the cache borrows the store it reads from.
pub struct RangeCache<'s> {
    store: &'s TimestampStore,
    buffer: Vec<i64>,
    capacity: usize,
    start: u64,
    cached: u64,
    disk_reads: u64,
}

impl std::fmt::Debug for RangeCache<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeCache")
            .field("capacity", &self.capacity)
            .field("start", &self.start)
            .field("cached", &self.cached)
            .field("disk_reads", &self.disk_reads)
            .finish()
    }
}

impl<'s> RangeCache<'s> {
    fn new(store: &'s TimestampStore) -> Self {
        Self {
            store,
            buffer: Vec::new(),
            capacity: 3 * store.config.slot_size,
            start: 0,
            cached: 0,
            disk_reads: 0,
        }
    }

    /// Makes every sample in `[first, last]` available, as far as the store
    /// has readable samples.
    ///
    /// The request is rounded outward to slot boundaries. A request outside
    /// the current window recenters it so a third of the buffer precedes the
    /// request, then refills it; otherwise only the missing tail is read.
    pub fn update(&mut self, first: u64, last: u64) {
        let readable = self.store.readable_sample_count();
        if readable == 0 || first > last || first >= readable {
            return;
        }

        let slot_size = self.store.config.slot_size as u64;
        let first = first / slot_size * slot_size;
        let mut last = (last / slot_size)
            .saturating_add(1)
            .saturating_mul(slot_size)
            .saturating_sub(1)
            .min(readable - 1);

        let span = (last - first + 1) as usize;
        if self.capacity < 2 * span {
            self.capacity = 3 * span;
            self.buffer = Vec::new();
            self.start = 0;
            self.cached = 0;
        }
        if self.buffer.len() < self.capacity {
            self.buffer.resize(self.capacity, 0);
        }

        let capacity = self.capacity as u64;
        if self.cached == 0 || first < self.start || last >= self.start + capacity {
            self.start = first.saturating_sub(capacity / 3);
            self.cached = 0;
            last = (self.start + capacity - 1).min(readable - 1);
            debug!(start = self.start, capacity, "recentered range cache");
        }

        let next = self.start + self.cached;
        if last >= next {
            self.fill(next, last);
        }
    }

    /// Decodes samples `[from, to]` into the buffer. `from` must be the end
    /// of the cached window.
    fn fill(&mut self, from: u64, to: u64) {
        let store = self.store;
        let record_count = store.record_count();
        if record_count == 0 {
            return;
        }

        let last_block = store.last_block(record_count);
        let Some(first_block) = (0..=last_block)
            .find(|&n| store.block(n).is_some_and(|b| b.max_sample() >= from))
        else {
            return;
        };
        let cover_block = (first_block..=last_block)
            .find(|&n| store.block(n).is_some_and(|b| b.max_sample() >= to))
            .unwrap_or(last_block);

        let block_size = store.config.block_size as u64;
        let slot_size = store.config.slot_size as u64;
        let first_record = first_block as u64 * block_size;
        let end_record = ((cover_block as u64 + 1) * block_size).min(record_count);

        let mut next = from;
        let mut record = first_record;
        'slots: while record < end_record && next <= to {
            let slot_index = (record / slot_size) as usize;
            let offset = record % slot_size;
            let len = (slot_size - offset).min(end_record - record);
            record += len;

            let view = match store.load_records(slot_index, offset as usize, len as usize) {
                Ok(view) => view,
                Err(e) => {
                    store
                        .reporter
                        .critical_fault("unable to read timestamps from the cache file", &e);
                    break;
                }
            };
            if view.is_paged() {
                self.disk_reads += 1;
            }

            for r in view.iter().filter(|r| r.is_used()) {
                let end = r.last_sample().min(to);
                if end < next {
                    continue;
                }
                let lo = (next - self.start) as usize;
                let hi = (end - self.start) as usize;
                self.buffer[lo..=hi].fill(r.timestamp);
                next = end + 1;
                if next > to {
                    break 'slots;
                }
            }
        }

        self.cached = next - self.start;
    }

    /// Timestamp of `sample`, if it is inside the cached window.
    #[must_use]
    pub fn get(&self, sample: u64) -> Option<i64> {
        if sample < self.start || sample >= self.start + self.cached {
            return None;
        }
        self.buffer.get((sample - self.start) as usize).copied()
    }

    /// Cached timestamps of `[first, last]`, cut short at the end of the
    /// cached window.
    #[must_use]
    pub fn slice(&self, first: u64, last: u64) -> &[i64] {
        let end = self.start + self.cached;
        if first < self.start || first >= end || first > last {
            return &[];
        }
        let lo = (first - self.start) as usize;
        let hi = (last.min(end - 1) - self.start) as usize;
        &self.buffer[lo..=hi]
    }

    /// Entries the buffer can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// First sample number of the window.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Number of samples currently decoded.
    pub fn cached_len(&self) -> u64 {
        self.cached
    }

    /// Number of slot reads that had to go to the overflow file.
    pub fn disk_reads(&self) -> u64 {
        self.disk_reads
    }
}

impl TimestampStore {
    /// Creates a range cache for one reader.
    pub fn create_cache(&self) -> RangeCache<'_> {
        RangeCache::new(self)
    }

    /// Timestamp of `sample`, or `None` if it is not readable yet.
    pub fn get_timestamp(&self, sample: u64, cache: &mut RangeCache<'_>) -> Option<i64> {
        cache.update(sample, sample);
        cache.get(sample)
    }

    /// Timestamps of samples `[first, last]`.
    ///
    /// The slice is shorter than requested if the tail is not readable yet,
    /// and empty if `first` is not.
    pub fn get_range<'c>(&self, first: u64, last: u64, cache: &'c mut RangeCache<'_>) -> &'c [i64] {
        cache.update(first, last);
        cache.slice(first, last)
    }

    /// Timestamps of `[first, last]` as `f32` offsets from `plot_min_x`,
    /// ready for upload as vertex data. Offsets beyond the `i64` range clamp
    /// to its ends.
    pub fn get_range_relative(
        &self,
        first: u64,
        last: u64,
        plot_min_x: i64,
        cache: &mut RangeCache<'_>,
    ) -> Vec<f32> {
        self.get_range(first, last, cache)
            .iter()
            .map(|&ts| ts.saturating_sub(plot_min_x) as f32)
            .collect()
    }
}
