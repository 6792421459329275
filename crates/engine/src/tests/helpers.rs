use crate::*;
use anyhow::Result;
use config::StoreConfig;
use overflow::OverflowError;
use parking_lot::Mutex;
use std::path::Path;

/// Records per slot in the small test geometry.
pub const SLOT: u64 = 8;
/// Records per block in the small test geometry.
pub const BLOCK: u64 = 2;

pub fn small_config() -> StoreConfig {
    StoreConfig::with_geometry(SLOT as usize, BLOCK as usize)
}

pub fn open_small(dir: &Path) -> Result<TimestampStore> {
    TimestampStore::open(dir.join("ts.bin"), small_config())
}

/// Appends `n` single-sample records with timestamps 0, 10, 20, ...
pub fn append_distinct(store: &TimestampStore, n: u64) {
    for i in 0..n {
        store.append_timestamps(i as i64 * 10, 1);
    }
}

/// Collects faults instead of logging them.
#[derive(Default)]
pub struct RecordingReporter {
    pub faults: Mutex<Vec<String>>,
}

impl FaultReporter for RecordingReporter {
    fn critical_fault(&self, message: &str, error: &OverflowError) {
        self.faults.lock().push(format!("{message}: {error}"));
    }
}
