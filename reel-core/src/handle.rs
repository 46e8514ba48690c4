//! Generational handle tables
//!
//! A table maps opaque handles to positions in a dense, order-preserving
//! array owned by the caller. Freeing a handle bumps its slot's generation,
//! so a stale handle fails [`HandleTable::resolve`] even after the slot has
//! been reused.

use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::error::{ReelError, Result};

/// Handle type stored in a [`HandleTable`]
pub trait TableHandle: Copy + Eq + std::fmt::Debug + std::fmt::Display {
    /// Build a handle from its slot index and generation
    fn from_parts(index: u32, generation: u32) -> Self;
    /// Slot index
    fn index(&self) -> u32;
    /// Generation of the slot when the handle was issued
    fn generation(&self) -> u32;
}

macro_rules! table_handle {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name {
            index: u32,
            generation: u32,
        }

        impl TableHandle for $name {
            fn from_parts(index: u32, generation: u32) -> Self {
                Self { index, generation }
            }

            fn index(&self) -> u32 {
                self.index
            }

            fn generation(&self) -> u32 {
                self.generation
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({}v{})", $label, self.index, self.generation)
            }
        }
    };
}

table_handle!(
    /// Identifies a stream owned by the compositor
    StreamHandle,
    "Stream"
);

table_handle!(
    /// Identifies a placed source (draw context) on the canvas
    DrawHandle,
    "Draw"
);

#[derive(Debug, Clone, Copy)]
struct Slot {
    generation: u32,
    /// Position in the owner's dense array, `None` when free
    position: Option<usize>,
}

/// Bounded handle → dense position table
#[derive(Debug)]
pub struct HandleTable<H: TableHandle> {
    slots: Vec<Slot>,
    capacity: usize,
    live: usize,
    _marker: PhantomData<H>,
}

impl<H: TableHandle> HandleTable<H> {
    /// Create a table holding at most `capacity` live handles
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            live: 0,
            _marker: PhantomData,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live handles
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn is_full(&self) -> bool {
        self.live >= self.capacity
    }

    /// Allocate the lowest free slot and bind it to `position`
    ///
    /// Returns `None` when the table is at capacity; callers map that to
    /// their own capacity error.
    pub fn allocate(&mut self, position: usize) -> Option<H> {
        if self.is_full() {
            return None;
        }

        let index = match self.slots.iter().position(|slot| slot.position.is_none()) {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    position: None,
                });
                self.slots.len() - 1
            }
        };

        let slot = &mut self.slots[index];
        slot.position = Some(position);
        self.live += 1;
        Some(H::from_parts(index as u32, slot.generation))
    }

    /// Dense position for a live handle
    pub fn resolve(&self, handle: H) -> Result<usize> {
        self.slots
            .get(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.position)
            .ok_or_else(|| ReelError::InvalidHandle(handle.to_string()))
    }

    pub fn contains(&self, handle: H) -> bool {
        self.resolve(handle).is_ok()
    }

    /// Point a live handle at a new dense position (after compaction)
    pub fn rebind(&mut self, handle: H, position: usize) -> Result<()> {
        self.resolve(handle)?;
        self.slots[handle.index() as usize].position = Some(position);
        Ok(())
    }

    /// Release a handle; its slot becomes reusable with a new generation
    pub fn free(&mut self, handle: H) -> Result<()> {
        self.resolve(handle)?;
        let slot = &mut self.slots[handle.index() as usize];
        slot.position = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.live -= 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_lowest_free() {
        let mut table: HandleTable<StreamHandle> = HandleTable::new(4);
        let a = table.allocate(0).unwrap();
        let b = table.allocate(1).unwrap();
        let c = table.allocate(2).unwrap();
        assert_eq!((a.index(), b.index(), c.index()), (0, 1, 2));

        table.free(b).unwrap();
        let d = table.allocate(1).unwrap();
        assert_eq!(d.index(), 1);
        assert_ne!(d, b);
    }

    #[test]
    fn test_stale_handle_rejected() {
        let mut table: HandleTable<DrawHandle> = HandleTable::new(2);
        let a = table.allocate(0).unwrap();
        table.free(a).unwrap();
        assert!(matches!(table.resolve(a), Err(ReelError::InvalidHandle(_))));
        assert!(table.free(a).is_err());

        let b = table.allocate(0).unwrap();
        assert_eq!(b.index(), a.index());
        assert!(table.resolve(a).is_err());
        assert_eq!(table.resolve(b).unwrap(), 0);
    }

    #[test]
    fn test_capacity() {
        let mut table: HandleTable<StreamHandle> = HandleTable::new(2);
        assert!(table.allocate(0).is_some());
        assert!(table.allocate(1).is_some());
        assert!(table.allocate(2).is_none());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_rebind() {
        let mut table: HandleTable<DrawHandle> = HandleTable::new(4);
        let a = table.allocate(3).unwrap();
        table.rebind(a, 1).unwrap();
        assert_eq!(table.resolve(a).unwrap(), 1);
    }

    #[test]
    fn test_handle_display() {
        let handle = StreamHandle::from_parts(3, 1);
        assert_eq!(handle.to_string(), "Stream(3v1)");
    }
}
