/// Slot paging: background page-out, disk fallback reads, and the
/// lifecycle operations that must wait for page-outs (`clear()`,
/// `dispose()`).
use overflow::OverflowError;
use slot::{RecordView, SlotState};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use tracing::{debug, info};

use crate::{new_directory, TimestampStore};

impl TimestampStore {
    /// Moves slot `slot_index` out of memory.
    ///
    /// For a stress-test source the records are simply dropped. Otherwise a
    /// background thread writes them to the overflow file and releases them
    /// once the write is durable. The caller never waits for that thread.
    pub(crate) fn page_out(&self, slot_index: usize) {
        let Some(slot) = self.slot(slot_index).map(Arc::clone) else {
            return;
        };

        if self.source.is_stress_test() {
            slot.discard();
            debug!(slot = slot_index, "discarded slot");
            return;
        }

        if !slot.begin_flush() {
            return;
        }
        let Some(records) = slot.records() else {
            slot.abort_flush();
            return;
        };

        let first_record = slot_index as u64 * self.config.slot_size as u64;
        let file = Arc::clone(&self.file);
        let reporter = Arc::clone(&self.reporter);
        let worker = Arc::clone(&slot);

        let spawned = thread::Builder::new()
            .name(format!("page-out-{slot_index}"))
            .spawn(move || {
                debug!(slot = slot_index, "paging out slot");
                match file.write_records(first_record, &records.snapshot()) {
                    Ok(()) => {
                        drop(records);
                        worker.finish_flush();
                        debug!(slot = slot_index, "slot paged out");
                    }
                    Err(e) => {
                        worker.abort_flush();
                        reporter.critical_fault("unable to save to the cache file", &e);
                    }
                }
            });

        match spawned {
            Ok(handle) => slot.set_page_out(handle),
            Err(e) => {
                slot.abort_flush();
                self.reporter
                    .critical_fault("unable to start a page-out thread", &OverflowError::Io(e));
            }
        }
    }

    /// Records of block `block_index`, bounded by `record_count`.
    pub(crate) fn block_records(
        &self,
        block_index: usize,
        record_count: u64,
    ) -> Result<RecordView, OverflowError> {
        let block_size = self.config.block_size as u64;
        let first_record = block_index as u64 * block_size;
        let len = block_size.min(record_count.saturating_sub(first_record)) as usize;

        let slot_size = self.config.slot_size as u64;
        self.load_records(
            (first_record / slot_size) as usize,
            (first_record % slot_size) as usize,
            len,
        )
    }

    /// `len` records of slot `slot_index`, starting at `offset` within it.
    ///
    /// Resident records are returned in place. A slot that is being flushed
    /// is waited on, then read from the overflow file like a paged-out one.
    pub(crate) fn load_records(
        &self,
        slot_index: usize,
        offset: usize,
        len: usize,
    ) -> Result<RecordView, OverflowError> {
        let Some(slot) = self.slot(slot_index) else {
            return Ok(RecordView::Paged(Vec::new()));
        };

        loop {
            if let Some(records) = slot.resident_records() {
                return Ok(RecordView::Resident {
                    records,
                    offset,
                    len,
                });
            }
            match slot.state() {
                SlotState::Flushing => slot.wait_while_flushing(),
                // records were released but the new state is not visible yet
                SlotState::Resident => std::hint::spin_loop(),
                SlotState::OnDisk => break,
            }
        }

        let first_record = slot_index as u64 * self.config.slot_size as u64 + offset as u64;
        self.file
            .read_records(first_record, len)
            .map(RecordView::Paged)
    }

    /// Blocks until every page-out started so far has finished.
    pub fn wait_for_page_outs(&self) {
        for slot in self.slots.iter() {
            slot.join_page_out();
        }
    }

    /// Empties the store and truncates its overflow file.
    ///
    /// Range caches borrow the store, so none can be alive here; the owning
    /// connection must also have stopped appending.
    pub fn clear(&mut self) {
        self.wait_for_page_outs();

        if let Err(e) = self.file.truncate() {
            self.reporter.critical_fault("unable to clear the cache file", &e);
        }

        self.sample_count.store(0, Ordering::Release);
        self.record_count.store(0, Ordering::Release);
        self.first_timestamp.store(0, Ordering::Relaxed);
        self.last_timestamp.store(0, Ordering::Relaxed);
        self.capacity_warned.store(false, Ordering::Relaxed);
        self.slots = new_directory(&self.config);
        self.active_records.get_mut().take();

        info!(path = %self.file.path().display(), "timestamp store cleared");
    }

    /// Releases the store and deletes its overflow file.
    pub fn dispose(self) {
        self.wait_for_page_outs();

        let TimestampStore {
            file,
            reporter,
            slots,
            ..
        } = self;
        drop(slots);

        let path = file.path().to_path_buf();
        let removed = match Arc::try_unwrap(file) {
            Ok(file) => file.remove(),
            Err(shared) => {
                drop(shared);
                overflow::remove_file(&path)
            }
        };

        match removed {
            Ok(()) => info!(path = %path.display(), "timestamp store disposed"),
            Err(e) => reporter.critical_fault("unable to delete the cache file", &e),
        }
    }
}
