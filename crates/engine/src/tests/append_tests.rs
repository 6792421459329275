use super::helpers::{append_distinct, open_small, SLOT};
use crate::*;
use anyhow::Result;
use slot::{BlockBounds, SlotState};
use tempfile::tempdir;

// --------------------- Counters ---------------------

#[test]
fn empty_store() -> Result<()> {
    let dir = tempdir()?;
    let store = open_small(dir.path())?;
    assert_eq!(store.sample_count(), 0);
    assert_eq!(store.record_count(), 0);
    assert_eq!(store.first_timestamp(), None);
    assert_eq!(store.last_timestamp(), None);
    assert_eq!(store.allocated_slot_count(), 0);
    Ok(())
}

#[test]
fn distinct_timestamps_open_records() -> Result<()> {
    let dir = tempdir()?;
    let store = open_small(dir.path())?;
    store.append_timestamps(100, 3);
    store.append_timestamps(200, 1);
    store.append_timestamps(300, 2);

    assert_eq!(store.sample_count(), 6);
    assert_eq!(store.record_count(), 3);
    assert_eq!(store.first_timestamp(), Some(100));
    assert_eq!(store.last_timestamp(), Some(300));
    Ok(())
}

#[test]
fn repeated_timestamp_widens_latest_record() -> Result<()> {
    let dir = tempdir()?;
    let store = open_small(dir.path())?;
    store.append_timestamps(500, 3);
    store.append_timestamps(500, 2);

    assert_eq!(store.sample_count(), 5);
    assert_eq!(store.record_count(), 1);
    // no boundary inside the run
    assert_eq!(store.closest_at_or_before(500, 4), Some(4));
    assert_eq!(store.closest_after(499), Some(0));
    Ok(())
}

#[test]
fn zero_count_is_ignored() -> Result<()> {
    let dir = tempdir()?;
    let store = open_small(dir.path())?;
    store.append_timestamps(7, 0);
    assert_eq!(store.sample_count(), 0);
    assert_eq!(store.record_count(), 0);
    assert_eq!(store.last_timestamp(), None);
    Ok(())
}

#[test]
fn full_store_drops_appends() -> Result<()> {
    let dir = tempdir()?;
    let mut config = super::helpers::small_config();
    config.max_sample_count = 10;
    let store = TimestampStore::open(dir.path().join("ts.bin"), config)?;

    store.append_timestamps(1, 6);
    store.append_timestamps(2, 6);
    assert_eq!(store.sample_count(), 6);
    assert_eq!(store.last_timestamp(), Some(1));

    store.append_timestamps(2, 4);
    assert_eq!(store.sample_count(), 10);
    store.append_timestamps(2, 1);
    assert_eq!(store.sample_count(), 10);
    Ok(())
}

// --------------------- Block summaries ---------------------

#[test]
fn block_summaries_track_runs() -> Result<()> {
    let dir = tempdir()?;
    let store = open_small(dir.path())?;
    store.append_timestamps(10, 2);
    store.append_timestamps(20, 1);
    store.append_timestamps(30, 3);

    let b0 = store.block(0).map(|b| b.bounds());
    assert_eq!(
        b0,
        Some(BlockBounds {
            min_timestamp: 10,
            max_timestamp: 20,
            min_sample: 0,
            max_sample: 2,
        })
    );

    store.append_timestamps(30, 1);
    let b1 = store.block(1).map(|b| b.bounds());
    assert_eq!(
        b1,
        Some(BlockBounds {
            min_timestamp: 30,
            max_timestamp: 30,
            min_sample: 3,
            max_sample: 6,
        })
    );
    Ok(())
}

// --------------------- Slots and paging ---------------------

#[test]
fn slots_are_allocated_on_first_record() -> Result<()> {
    let dir = tempdir()?;
    let store = open_small(dir.path())?;
    append_distinct(&store, SLOT);
    assert_eq!(store.allocated_slot_count(), 1);

    store.append_timestamps(1_000_000, 1);
    assert_eq!(store.allocated_slot_count(), 2);
    assert_eq!(store.slot_state(2), None);
    Ok(())
}

#[test]
fn third_slot_pages_out_first() -> Result<()> {
    let dir = tempdir()?;
    let store = open_small(dir.path())?;
    append_distinct(&store, 2 * SLOT);
    store.wait_for_page_outs();
    assert_eq!(store.slot_state(0), Some(SlotState::Resident));

    append_distinct_from(&store, 2 * SLOT, 1);
    store.wait_for_page_outs();
    assert_eq!(store.slot_state(0), Some(SlotState::OnDisk));
    assert_eq!(store.slot_state(1), Some(SlotState::Resident));
    assert_eq!(store.slot_state(2), Some(SlotState::Resident));
    assert_eq!(store.resident_slot_count(), 2);
    assert_eq!(store.file.len()?, SLOT * overflow::RECORD_BYTES);
    Ok(())
}

#[test]
fn stress_source_discards_cold_slots() -> Result<()> {
    let dir = tempdir()?;
    let counter = std::sync::Arc::new(AcquisitionCounter::stress_test());
    let store = open_small(dir.path())?.with_source(counter.clone());
    append_distinct(&store, 3 * SLOT);
    counter.add(3 * SLOT);

    // discarding is synchronous and never touches the file
    assert_eq!(store.slot_state(0), Some(SlotState::OnDisk));
    assert!(store.file.is_empty()?);
    Ok(())
}

// --------------------- Writer handle ---------------------

#[test]
fn writer_handle_is_the_newest_slots_records() -> Result<()> {
    let dir = tempdir()?;
    let store = open_small(dir.path())?;
    store.append_timestamps(0, 1);

    let newest = |i: usize| -> bool {
        let active = store.active_records.lock().clone();
        match (active, store.slot(i).and_then(|s| s.records())) {
            (Some(a), Some(b)) => std::sync::Arc::ptr_eq(&a, &b),
            _ => false,
        }
    };
    assert!(newest(0));

    append_distinct_from(&store, 1, SLOT);
    assert_eq!(store.allocated_slot_count(), 2);
    assert!(newest(1));
    assert!(!newest(0));
    Ok(())
}

#[test]
fn widen_follows_the_writer_into_a_new_slot() -> Result<()> {
    let dir = tempdir()?;
    let store = open_small(dir.path())?;
    append_distinct(&store, SLOT);
    // last record of slot 0
    store.append_timestamps((SLOT as i64 - 1) * 10, 2);
    // first record of slot 1, then widened
    store.append_timestamps(1_000, 1);
    store.append_timestamps(1_000, 4);

    assert_eq!(store.record_count(), SLOT + 1);
    assert_eq!(store.sample_count(), SLOT + 2 + 5);

    let slot0 = store.slot(0).and_then(|s| s.resident_records());
    assert_eq!(slot0.map(|r| r.load(SLOT as usize - 1).run_length), Some(3));
    let slot1 = store.slot(1).and_then(|s| s.resident_records());
    assert_eq!(slot1.map(|r| r.load(0).run_length), Some(5));

    assert_eq!(store.closest_at_or_before(1_000, 100), Some(SLOT + 2 + 4));
    assert_eq!(store.closest_after(999), Some(SLOT + 2));
    Ok(())
}

#[test]
fn appends_complete_while_readers_hold_slot_records() -> Result<()> {
    let dir = tempdir()?;
    let store = open_small(dir.path())?;
    store.append_timestamps(0, 1);
    let stop = std::sync::atomic::AtomicBool::new(false);

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                let mut held = Vec::new();
                while !stop.load(std::sync::atomic::Ordering::Relaxed) {
                    let newest = store.allocated_slot_count().saturating_sub(1);
                    if let Some(r) = store.slot(newest).and_then(|s| s.resident_records()) {
                        held.push(r);
                    }
                    if held.len() > 64 {
                        held.clear();
                    }
                }
            });
        }

        // repeated timestamps take the widen path
        for i in 1..(4 * SLOT) as i64 {
            store.append_timestamps(i * 10, 1);
            store.append_timestamps(i * 10, 1);
        }
        stop.store(true, std::sync::atomic::Ordering::Relaxed);
    });

    store.wait_for_page_outs();
    assert_eq!(store.record_count(), 4 * SLOT);
    assert_eq!(store.sample_count(), 1 + 2 * (4 * SLOT - 1));
    assert_eq!(store.closest_at_or_before(10, 2), Some(2));
    Ok(())
}

#[test]
fn clear_drops_the_writer_handle() -> Result<()> {
    let dir = tempdir()?;
    let mut store = open_small(dir.path())?;
    append_distinct(&store, 3);
    store.clear();
    assert!(store.active_records.lock().is_none());

    store.append_timestamps(42, 2);
    assert_eq!(store.first_timestamp(), Some(42));
    assert_eq!(store.closest_at_or_before(42, 1), Some(1));
    Ok(())
}

fn append_distinct_from(store: &TimestampStore, first: u64, n: u64) {
    for i in first..first + n {
        store.append_timestamps(i as i64 * 10, 1);
    }
}
