//! Heap-backed arena with allocation accounting

use std::sync::atomic::{AtomicUsize, Ordering};

use super::{ArenaStats, RemoteTableArena};
use crate::{GnpError, Result};

/// Arena that hands out boxed, zeroed tables and counts every
/// construction and destruction.
///
/// Shared by reference (or `Arc`) between every rank of an in-process
/// group; all counters are atomic.
#[derive(Debug)]
pub struct HeapArena {
    /// Maximum live tables, if bounded
    capacity: Option<usize>,

    live: AtomicUsize,
    constructed: AtomicUsize,
    destroyed: AtomicUsize,

    /// High-water mark of `live`
    peak: AtomicUsize,
}

impl HeapArena {
    /// Arena with no limit on live tables.
    pub fn unbounded() -> Self {
        Self::new(None)
    }

    /// Arena that refuses to hold more than `capacity` live tables.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(Some(capacity))
    }

    /// Arena with an optional live-table limit.
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            capacity,
            live: AtomicUsize::new(0),
            constructed: AtomicUsize::new(0),
            destroyed: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            constructed: self.constructed.load(Ordering::SeqCst),
            destroyed: self.destroyed.load(Ordering::SeqCst),
            live: self.live.load(Ordering::SeqCst),
            peak: self.peak.load(Ordering::SeqCst),
        }
    }

    fn reserve(&self) -> Result<()> {
        let previous = self.live.fetch_add(1, Ordering::SeqCst);
        if let Some(capacity) = self.capacity {
            if previous >= capacity {
                self.live.fetch_sub(1, Ordering::SeqCst);
                return Err(GnpError::AllocationFailure { capacity });
            }
        }
        self.constructed.fetch_add(1, Ordering::SeqCst);
        self.peak.fetch_max(previous + 1, Ordering::SeqCst);
        Ok(())
    }
}

impl<T: Default> RemoteTableArena<T> for HeapArena {
    fn construct(&self) -> Result<Box<T>> {
        self.reserve()?;
        Ok(Box::default())
    }

    fn destroy(&self, table: Box<T>) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        self.destroyed.fetch_add(1, Ordering::SeqCst);
        drop(table);
    }
}
