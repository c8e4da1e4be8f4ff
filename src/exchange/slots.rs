//! Per-rank table slots and their release discipline
//!
//! Slot `owner` aliases the caller's own table and is never released here.
//! Every other slot is either empty or holds a box obtained from the arena;
//! each such box goes back to the arena exactly once, on `release` or, if
//! the exchange bailed out early, on drop.

use bitvec::prelude::*;
use tracing::debug;

use crate::arena::RemoteTableArena;

#[derive(Debug)]
enum Slot<'a, T> {
    Empty,
    /// The caller's own table, borrowed
    Local(&'a T),
    /// Allocated as a receive target; payload not yet decoded into it
    Pending(Box<T>),
    Remote(Box<T>),
}

/// Length-`P` table array indexed by rank.
#[derive(Debug)]
pub struct RemoteTables<'a, T, A: RemoteTableArena<T>> {
    owner: usize,
    slots: Vec<Slot<'a, T>>,

    /// One bit per rank: slot holds a readable table
    populated: BitVec,

    arena: &'a A,
}

impl<'a, T, A: RemoteTableArena<T>> RemoteTables<'a, T, A> {
    /// Array of `size` slots with only `owner`'s populated, aliasing `local`.
    pub fn new(size: usize, owner: usize, local: &'a T, arena: &'a A) -> Self {
        let mut slots: Vec<Slot<'a, T>> = (0..size).map(|_| Slot::Empty).collect();
        slots[owner] = Slot::Local(local);
        let mut populated = bitvec![0; size];
        populated.set(owner, true);

        Self {
            owner,
            slots,
            populated,
            arena,
        }
    }

    /// Number of slots (the group size).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the array has no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Rank whose table occupies the local slot.
    pub fn owner(&self) -> usize {
        self.owner
    }

    /// Number of slots holding a readable table.
    pub fn populated(&self) -> usize {
        self.populated.count_ones()
    }

    /// Whether every rank's table is present.
    pub fn is_complete(&self) -> bool {
        self.populated.all()
    }

    /// Whether slot `rank` holds a readable table.
    pub fn is_populated(&self, rank: usize) -> bool {
        self.populated.get(rank).map(|bit| *bit).unwrap_or(false)
    }

    /// Table for `rank`, if it has arrived.
    pub fn get(&self, rank: usize) -> Option<&T> {
        match self.slots.get(rank)? {
            Slot::Local(table) => Some(*table),
            Slot::Remote(table) => Some(table.as_ref()),
            Slot::Empty | Slot::Pending(_) => None,
        }
    }

    /// Whether the owner's slot is the very object `local` (not a copy).
    pub fn is_local_alias(&self, local: &T) -> bool {
        matches!(self.slots[self.owner], Slot::Local(table) if std::ptr::eq(table, local))
    }

    /// Arrived tables other than the owner's, by rank.
    pub fn remote(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(rank, slot)| match slot {
            Slot::Remote(table) => Some((rank, table.as_ref())),
            _ => None,
        })
    }

    /// Park a freshly allocated receive target in slot `rank`.
    pub(crate) fn install_pending(&mut self, rank: usize, target: Box<T>) {
        debug_assert!(matches!(self.slots[rank], Slot::Empty), "slot {} reused", rank);
        self.slots[rank] = Slot::Pending(target);
    }

    /// Receive target in slot `rank`, if one is parked there.
    pub(crate) fn pending_mut(&mut self, rank: usize) -> Option<&mut T> {
        match self.slots.get_mut(rank)? {
            Slot::Pending(target) => Some(target.as_mut()),
            _ => None,
        }
    }

    /// Mark slot `rank`'s receive as complete.
    pub(crate) fn mark_received(&mut self, rank: usize) {
        let slot = std::mem::replace(&mut self.slots[rank], Slot::Empty);
        self.slots[rank] = match slot {
            Slot::Pending(table) => {
                self.populated.set(rank, true);
                Slot::Remote(table)
            }
            other => other,
        };
    }

    /// Return every arena-backed slot to the arena; the local slot is left alone.
    ///
    /// Returns the number of tables destroyed.
    pub fn release(mut self) -> usize {
        self.release_slots()
    }

    fn release_slots(&mut self) -> usize {
        let mut released = 0;
        for (rank, slot) in self.slots.iter_mut().enumerate() {
            if rank == self.owner {
                continue;
            }
            match std::mem::replace(slot, Slot::Empty) {
                Slot::Pending(table) | Slot::Remote(table) => {
                    self.arena.destroy(table);
                    self.populated.set(rank, false);
                    released += 1;
                }
                Slot::Local(_) | Slot::Empty => {}
            }
        }
        released
    }
}

impl<T, A: RemoteTableArena<T>> Drop for RemoteTables<'_, T, A> {
    fn drop(&mut self) {
        let released = self.release_slots();
        if released > 0 {
            debug!(owner = self.owner, released, "released remote tables on drop");
        }
    }
}
