//! `STRESS` command: one writer and several readers hammering a throwaway
//! store whose source discards cold slots.

use anyhow::Result;
use config::StoreConfig;
use engine::{AcquisitionCounter, TimestampStore};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Debug)]
pub struct StressReport {
    pub samples: u64,
    pub records: u64,
    pub resident_slots: usize,
    pub reader_passes: u64,
    pub elapsed: Duration,
}

impl fmt::Display for StressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OK (samples={}, records={}, resident_slots={}, reader_passes={}, elapsed={}ms)",
            self.samples,
            self.records,
            self.resident_slots,
            self.reader_passes,
            self.elapsed.as_millis()
        )
    }
}

/// Appends `samples` samples while `readers` threads read the live edge,
/// then deletes the store.
pub fn run(config: StoreConfig, samples: u64, readers: usize) -> Result<StressReport> {
    let window = config.slot_size as u64;
    let counter = Arc::new(AcquisitionCounter::stress_test());
    let store = TimestampStore::open_in_cache_dir("stress", config)?.with_source(counter.clone());

    let done = AtomicBool::new(false);
    let passes = AtomicU64::new(0);
    let start = Instant::now();

    thread::scope(|s| {
        for _ in 0..readers {
            s.spawn(|| {
                let mut cache = store.create_cache();
                while !done.load(Ordering::Acquire) {
                    let n = store.readable_sample_count();
                    if n == 0 {
                        thread::yield_now();
                        continue;
                    }
                    let first = n.saturating_sub(window);
                    let newest = store.get_range(first, n - 1, &mut cache).last().copied();
                    if let Some(ts) = newest {
                        let _ = store.closest_at_or_before(ts, n - 1);
                        let _ = store.closest_after(ts);
                    }
                    passes.fetch_add(1, Ordering::Relaxed);
                }
            });
        }

        let mut written = 0;
        let mut ts = 0i64;
        while written < samples {
            let count = (1 + written % 4).min(samples - written);
            store.append_timestamps(ts, count);
            counter.add(count);
            written += count;
            ts += 1;
        }
        done.store(true, Ordering::Release);
    });

    let report = StressReport {
        samples: store.sample_count(),
        records: store.record_count(),
        resident_slots: store.resident_slot_count(),
        reader_passes: passes.load(Ordering::Relaxed),
        elapsed: start.elapsed(),
    };
    info!(samples = report.samples, readers, "stress run finished");

    store.dispose();
    Ok(report)
}
