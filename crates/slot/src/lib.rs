//! # Slot - paged record storage
//!
//! A slot is a fixed-capacity page of [`Record`]s plus the [`BlockSummary`]
//! entries for the blocks it contains. Slots are the unit of disk paging:
//!
//! ```text
//!   Resident ──begin_flush──▶ Flushing ──finish_flush──▶ OnDisk
//!       ▲                        │
//!       └──────abort_flush───────┘
//!
//!   Resident ──discard──▶ OnDisk        (stress-test sources)
//! ```
//!
//! Block summaries stay in memory for the lifetime of the slot; only the
//! record array is released when the slot is paged out.
//!
//! ## Reading a slot concurrently with page-out
//!
//! Readers call [`Slot::resident_records`], which clones the record array
//! handle *before* looking at the state. If the state is anything but
//! `Resident` the clone is discarded and the reader falls back to the
//! overflow file, after [`Slot::wait_while_flushing`].

mod block;
mod directory;
mod record;

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

pub use block::{BlockBounds, BlockSummary};
pub use directory::SlotDirectory;
pub use record::{Record, RecordArray, RecordView};

/// Residency of a slot's record array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SlotState {
    /// Records are in memory.
    Resident = 0,
    /// Records are being written to the overflow file.
    Flushing = 1,
    /// Records live only in the overflow file (or were discarded).
    OnDisk = 2,
}

impl SlotState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => SlotState::Resident,
            1 => SlotState::Flushing,
            _ => SlotState::OnDisk,
        }
    }
}

#[derive(Debug)]
pub struct Slot {
    index: usize,
    state: AtomicU8,
    records: Mutex<Option<Arc<RecordArray>>>,
    blocks: Box<[BlockSummary]>,
    page_out: Mutex<Option<JoinHandle<()>>>,
}

impl Slot {
    /// Allocates a resident slot of `slot_size` unused records and
    /// `blocks_per_slot` empty block summaries.
    pub fn new(index: usize, slot_size: usize, blocks_per_slot: usize) -> Self {
        Self::with_records(index, Arc::new(RecordArray::new(slot_size)), blocks_per_slot)
    }

    /// Builds a resident slot around `records`. The caller may keep its own
    /// clone of the handle; paging the slot out only drops the slot's copy.
    pub fn with_records(index: usize, records: Arc<RecordArray>, blocks_per_slot: usize) -> Self {
        let blocks = (0..blocks_per_slot)
            .map(|_| BlockSummary::default())
            .collect();
        Self {
            index,
            state: AtomicU8::new(SlotState::Resident as u8),
            records: Mutex::new(Some(records)),
            blocks,
            page_out: Mutex::new(None),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> SlotState {
        SlotState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Summary of block `n` within this slot.
    pub fn block(&self, n: usize) -> &BlockSummary {
        &self.blocks[n]
    }

    /// Handle to the record array regardless of state, or `None` once the
    /// slot has been paged out.
    pub fn records(&self) -> Option<Arc<RecordArray>> {
        self.records.lock().clone()
    }

    /// Record array for a reader, or `None` if the reader must go to disk.
    pub fn resident_records(&self) -> Option<Arc<RecordArray>> {
        // capture first: a page-out that completes after this point cannot
        // free the array out from under us
        let records = self.records.lock().clone();
        match self.state() {
            SlotState::Resident => records,
            SlotState::Flushing | SlotState::OnDisk => None,
        }
    }

    /// Marks the slot as flushing. Returns `false` if the slot was not
    /// resident, which keeps at most one page-out in flight per slot.
    pub fn begin_flush(&self) -> bool {
        self.state
            .compare_exchange(
                SlotState::Resident as u8,
                SlotState::Flushing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Drops the in-memory records and publishes `OnDisk`. Call only once the
    /// records are durable in the overflow file.
    pub fn finish_flush(&self) {
        self.records.lock().take();
        self.state.store(SlotState::OnDisk as u8, Ordering::Release);
    }

    /// Returns a flushing slot to `Resident` after a failed write.
    pub fn abort_flush(&self) {
        self.state.store(SlotState::Resident as u8, Ordering::Release);
    }

    /// Drops the records without persisting them.
    pub fn discard(&self) {
        self.records.lock().take();
        self.state.store(SlotState::OnDisk as u8, Ordering::Release);
    }

    /// Spins until no page-out is writing this slot.
    pub fn wait_while_flushing(&self) {
        while self.state() == SlotState::Flushing {
            std::hint::spin_loop();
            std::thread::yield_now();
        }
    }

    /// Remembers the thread writing this slot so it can be joined later.
    pub fn set_page_out(&self, handle: JoinHandle<()>) {
        *self.page_out.lock() = Some(handle);
    }

    /// Joins the page-out thread, if one was started and not yet joined.
    pub fn join_page_out(&self) {
        let handle = self.page_out.lock().take();
        match handle {
            Some(handle) => {
                // a page-out that panicked never cleared Flushing; its records
                // were not taken, so the slot is still resident
                if handle.join().is_err() {
                    self.abort_flush();
                }
            }
            None => self.wait_while_flushing(),
        }
    }
}
