//! Lazily allocated slot directory.

use std::sync::{Arc, OnceLock};

use crate::Slot;

/// Slots per directory chunk.
const CHUNK_SIZE: usize = 4096;

type Chunk = Box<[OnceLock<Arc<Slot>>]>;

/// Fixed-capacity map from slot index to [`Slot`], readable without locks.
///
/// Entries are set once and never replaced. Only the top level is sized by
/// the capacity; chunks of [`CHUNK_SIZE`] entries are allocated on first use,
/// so a huge capacity over tiny slots stays cheap.
#[derive(Debug)]
pub struct SlotDirectory {
    chunks: Box<[OnceLock<Chunk>]>,
    capacity: usize,
}

impl SlotDirectory {
    pub fn new(capacity: usize) -> Self {
        let chunks = (0..capacity.div_ceil(CHUNK_SIZE))
            .map(|_| OnceLock::new())
            .collect();
        Self { chunks, capacity }
    }

    /// Number of addressable slot indices.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Slot>> {
        if index >= self.capacity {
            return None;
        }
        self.chunks[index / CHUNK_SIZE].get()?[index % CHUNK_SIZE].get()
    }

    /// Returns the slot at `index`, creating it with `init` if it is empty.
    /// Returns `None` if `index` is beyond the capacity.
    pub fn get_or_init<F>(&self, index: usize, init: F) -> Option<&Arc<Slot>>
    where
        F: FnOnce() -> Slot,
    {
        if index >= self.capacity {
            return None;
        }
        let chunk = self.chunks[index / CHUNK_SIZE]
            .get_or_init(|| (0..CHUNK_SIZE).map(|_| OnceLock::new()).collect());
        Some(chunk[index % CHUNK_SIZE].get_or_init(|| Arc::new(init())))
    }

    /// Allocated slots in index order. Slots are allocated in order, so this
    /// stops at the first empty entry.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Slot>> + '_ {
        (0..self.capacity).map_while(move |i| self.get(i))
    }
}
