//! Cross-rank table allocation
//!
//! Tables received from peers are materialised through an explicit arena
//! handle passed down from the controller, never through a process-wide
//! global. The arena is shared by every rank of the group and may be
//! invoked from any of them.

mod heap;

pub use heap::HeapArena;

use crate::Result;

/// Allocator for tables that must be visible to the whole process group.
pub trait RemoteTableArena<T> {
    /// Allocate a zeroed table.
    fn construct(&self) -> Result<Box<T>>;

    /// Release a table previously returned by [`RemoteTableArena::construct`].
    fn destroy(&self, table: Box<T>);
}

/// Allocation counters of an arena.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Tables handed out.
    pub constructed: usize,
    /// Tables released.
    pub destroyed: usize,
    /// Tables currently outstanding.
    pub live: usize,
    /// Maximum simultaneously outstanding.
    pub peak: usize,
}

impl ArenaStats {
    /// Every constructed table has been destroyed.
    pub fn is_balanced(&self) -> bool {
        self.live == 0 && self.constructed == self.destroyed
    }

    /// Generate report
    pub fn report(&self) -> String {
        format!(
            "Arena tables:\n  Constructed: {}\n  Destroyed: {}\n  Live: {}\n  Peak: {}",
            self.constructed, self.destroyed, self.live, self.peak
        )
    }
}
