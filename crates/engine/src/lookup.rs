/// Nearest-sample lookups: `closest_at_or_before()` and `closest_after()`.
///
/// Both run a coarse linear scan over block summaries, then a fine scan over
/// the records of the one block that can hold the answer. Only that block is
/// read, from memory or from the overflow file.
use crate::TimestampStore;

impl TimestampStore {
    /// Returns the newest sample whose timestamp is `<= timestamp`.
    ///
    /// If every stored timestamp is older than `timestamp` this returns
    /// `max_sample` without touching any records. Returns `None` if the store
    /// is empty, if every timestamp is newer, or if the covering records
    /// could not be read.
    #[must_use]
    pub fn closest_at_or_before(&self, timestamp: i64, max_sample: u64) -> Option<u64> {
        let sample_count = self.sample_count();
        let record_count = self.record_count();
        if sample_count == 0 || record_count == 0 {
            return None;
        }

        let last_block = self.last_block(record_count);
        if self.block(last_block)?.max_timestamp() < timestamp {
            return Some(max_sample);
        }

        for block_index in (0..=last_block).rev() {
            let Some(block) = self.block(block_index) else {
                continue;
            };
            if block.min_timestamp() > timestamp {
                continue;
            }

            let view = match self.block_records(block_index, record_count) {
                Ok(view) => view,
                Err(e) => {
                    self.reporter
                        .critical_fault("unable to read timestamps from the cache file", &e);
                    return None;
                }
            };
            let found = view
                .iter()
                .rev()
                .find(|r| r.is_used() && r.timestamp <= timestamp);
            if let Some(r) = found {
                return Some(r.last_sample().min(max_sample));
            }
        }

        None
    }

    /// Returns the first sample whose timestamp is `> timestamp`.
    ///
    /// Returns sample 0 if every stored timestamp is newer, and the last
    /// stored sample if none is. Returns `None` only for an empty store.
    #[must_use]
    pub fn closest_after(&self, timestamp: i64) -> Option<u64> {
        let sample_count = self.sample_count();
        let record_count = self.record_count();
        if sample_count == 0 || record_count == 0 {
            return None;
        }
        let last_sample = sample_count - 1;

        if self.block(0)?.min_timestamp() > timestamp {
            return Some(0);
        }

        let last_block = self.last_block(record_count);
        let Some(block_index) = (0..=last_block).find(|&n| {
            self.block(n)
                .is_some_and(|b| b.max_timestamp() > timestamp)
        }) else {
            return Some(last_sample);
        };

        match self.block_records(block_index, record_count) {
            Ok(view) => view
                .iter()
                .find(|r| r.is_used() && r.timestamp > timestamp)
                .map(|r| r.first_sample.min(last_sample))
                .or(Some(last_sample)),
            Err(e) => {
                self.reporter
                    .critical_fault("unable to read timestamps from the cache file", &e);
                Some(last_sample)
            }
        }
    }
}
