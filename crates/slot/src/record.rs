//! Records and the atomic record array a slot keeps in memory.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

/// A run of consecutive samples that share one timestamp.
///
/// `run_length == 0` marks a record that has not been written yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Record {
    pub first_sample: u64,
    pub run_length: u64,
    pub timestamp: i64,
}

impl Record {
    pub fn new(first_sample: u64, run_length: u64, timestamp: i64) -> Self {
        Self {
            first_sample,
            run_length,
            timestamp,
        }
    }

    /// Whether the writer has filled this record in.
    pub fn is_used(&self) -> bool {
        self.run_length > 0
    }

    /// Sample number of the last sample in the run. Only meaningful when
    /// [`Record::is_used`] is true.
    pub fn last_sample(&self) -> u64 {
        self.first_sample + self.run_length - 1
    }

    /// Whether `sample` falls inside this run.
    pub fn contains(&self, sample: u64) -> bool {
        self.is_used() && sample >= self.first_sample && sample <= self.last_sample()
    }
}

#[derive(Debug, Default)]
struct RecordCell {
    first_sample: AtomicU64,
    run_length: AtomicU64,
    timestamp: AtomicI64,
}

/// Fixed-length array of records shared between the writer and readers.
///
/// Only the writer stores into it. Fields are written with relaxed ordering;
/// the engine publishes them through its release-stored counters.
#[derive(Debug)]
pub struct RecordArray {
    cells: Box<[RecordCell]>,
}

impl RecordArray {
    /// Allocates `len` unused records.
    pub fn new(len: usize) -> Self {
        let cells = (0..len).map(|_| RecordCell::default()).collect();
        Self { cells }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn load(&self, index: usize) -> Record {
        let cell = &self.cells[index];
        Record {
            first_sample: cell.first_sample.load(Ordering::Relaxed),
            run_length: cell.run_length.load(Ordering::Relaxed),
            timestamp: cell.timestamp.load(Ordering::Relaxed),
        }
    }

    pub fn store(&self, index: usize, record: Record) {
        let cell = &self.cells[index];
        cell.first_sample.store(record.first_sample, Ordering::Relaxed);
        cell.timestamp.store(record.timestamp, Ordering::Relaxed);
        cell.run_length.store(record.run_length, Ordering::Relaxed);
    }

    /// Timestamp of the record at `index`.
    pub fn timestamp(&self, index: usize) -> i64 {
        self.cells[index].timestamp.load(Ordering::Relaxed)
    }

    /// Grows the run at `index` by `count` samples.
    pub fn widen(&self, index: usize, count: u64) {
        self.cells[index].run_length.fetch_add(count, Ordering::Relaxed);
    }

    /// Copies every record out, used records and unused ones alike.
    pub fn snapshot(&self) -> Vec<Record> {
        (0..self.cells.len()).map(|i| self.load(i)).collect()
    }
}

/// A window of records, either borrowed from a resident slot or read back
/// from the overflow file.
#[derive(Debug, Clone)]
pub enum RecordView {
    Resident {
        records: Arc<RecordArray>,
        offset: usize,
        len: usize,
    },
    Paged(Vec<Record>),
}

impl RecordView {
    pub fn len(&self) -> usize {
        match self {
            RecordView::Resident { len, .. } => *len,
            RecordView::Paged(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record `index` of the window (not of the slot).
    pub fn get(&self, index: usize) -> Record {
        match self {
            RecordView::Resident {
                records, offset, ..
            } => records.load(offset + index),
            RecordView::Paged(records) => records[index],
        }
    }

    /// Whether the window was served from disk.
    pub fn is_paged(&self) -> bool {
        matches!(self, RecordView::Paged(_))
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = Record> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }
}
