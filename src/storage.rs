//! Power-of-two backing store shared by [`Queue`](crate::Queue) and
//! [`LfQueue`](crate::LfQueue).
//!
//! Cursors are unbounded counters; the physical cell of cursor `i` is
//! `i & (capacity - 1)`. Because the capacity is always a power of two the
//! arithmetic stays correct across integer wraparound, so callers never wrap
//! their cursors by hand.

use std::iter;
use std::mem::{self, MaybeUninit};

use crate::error::QueueError;
use crate::invariant::invariant;

/// A cell the store can create empty and move between allocations.
pub(crate) trait RingCell: Sized {
    /// A cell holding nothing.
    fn vacant() -> Self;

    /// Move the contents of `src` into `self`, leaving `src` vacant.
    fn relocate_from(&mut self, src: &mut Self);

    /// Holds a value although it lies outside the live range.
    fn is_stranded(&self) -> bool {
        false
    }
}

impl<T> RingCell for MaybeUninit<T> {
    #[inline]
    fn vacant() -> Self {
        MaybeUninit::uninit()
    }

    #[inline]
    fn relocate_from(&mut self, src: &mut Self) {
        *self = mem::replace(src, MaybeUninit::uninit());
    }
}

/// Fixed power-of-two array of cells plus the exponent that sized it.
///
/// # Invariants
///
/// - `cells.len() == 1 << p2size` and `mask == cells.len() - 1`.
/// - `1 <= p2size`.
pub(crate) struct RingStorage<S> {
    cells: Box<[S]>,
    p2size: u32,
    mask: usize,
}

impl<S: RingCell> RingStorage<S> {
    /// Allocate `2^p2size` vacant cells.
    pub(crate) fn with_pow2(p2size: u32, max_p2size: u32) -> Result<Self, QueueError> {
        check_pow2(p2size, max_p2size)?;
        let slots = 1usize << p2size;
        Ok(RingStorage {
            cells: alloc_cells(slots)?,
            p2size,
            mask: slots - 1,
        })
    }

    /// Replace the store with one of `2^new_p2size` cells.
    ///
    /// The live cells `[read, write)` are moved to the front of the new store,
    /// followed by any stranded cells from the rest of the ring in ring order.
    /// Returns the number of cells moved, which is the rebased write cursor;
    /// the rebased read cursor is 0.
    ///
    /// The new store is fully built before the old one is touched, so on
    /// error `self` is unchanged.
    pub(crate) fn reallocate(
        &mut self,
        new_p2size: u32,
        max_p2size: u32,
        read: usize,
        write: usize,
    ) -> Result<usize, QueueError> {
        if new_p2size > max_p2size {
            return Err(QueueError::CapacityOverflow {
                requested: 1usize.checked_shl(new_p2size).unwrap_or(usize::MAX),
            });
        }
        invariant!(new_p2size >= self.p2size, "reallocate must not shrink");

        let used = self.used_size(write, read);
        invariant!(used <= self.mask);

        let slots = 1usize << new_p2size;
        let mut fresh = alloc_cells::<S>(slots)?;
        for (i, dst) in fresh.iter_mut().take(used).enumerate() {
            let src = &mut self.cells[read.wrapping_add(i) & self.mask];
            dst.relocate_from(src);
        }
        let mut moved = used;
        for offset in used..self.capacity() {
            let src = &mut self.cells[read.wrapping_add(offset) & self.mask];
            if src.is_stranded() {
                fresh[moved].relocate_from(src);
                moved += 1;
            }
        }

        self.cells = fresh;
        self.p2size = new_p2size;
        self.mask = slots - 1;
        invariant!(self.cells.len().is_power_of_two());
        Ok(moved)
    }
}

impl<S> RingStorage<S> {
    #[inline(always)]
    pub(crate) fn mod_index(&self, i: usize) -> usize {
        i & self.mask
    }

    /// Number of live cells between two cursors, however often they wrapped.
    #[inline(always)]
    pub(crate) fn used_size(&self, write: usize, read: usize) -> usize {
        self.mod_index(self.mod_index(write).wrapping_sub(self.mod_index(read)))
    }

    #[inline(always)]
    pub(crate) fn capacity(&self) -> usize {
        self.mask + 1
    }

    #[inline(always)]
    pub(crate) fn p2size(&self) -> u32 {
        self.p2size
    }

    #[inline(always)]
    pub(crate) fn get(&self, i: usize) -> &S {
        &self.cells[i & self.mask]
    }

    #[inline(always)]
    pub(crate) fn get_mut(&mut self, i: usize) -> &mut S {
        &mut self.cells[i & self.mask]
    }
}

fn check_pow2(p2size: u32, max_p2size: u32) -> Result<(), QueueError> {
    if p2size == 0 || p2size > max_p2size {
        return Err(QueueError::InvalidPow2 {
            p2size,
            max: max_p2size,
        });
    }
    Ok(())
}

fn alloc_cells<S: RingCell>(slots: usize) -> Result<Box<[S]>, QueueError> {
    let mut cells = Vec::new();
    cells
        .try_reserve_exact(slots)
        .map_err(|source| QueueError::Alloc { slots, source })?;
    cells.extend(iter::repeat_with(S::vacant).take(slots));
    Ok(cells.into_boxed_slice())
}

/// Smallest exponent whose capacity holds `hint` slots (at least 2).
pub(crate) fn pow2_for_capacity(hint: usize, max_p2size: u32) -> Result<u32, QueueError> {
    let capacity = hint
        .max(2)
        .checked_next_power_of_two()
        .ok_or(QueueError::CapacityOverflow { requested: hint })?;
    let p2size = capacity.trailing_zeros();
    if p2size > max_p2size {
        return Err(QueueError::CapacityOverflow { requested: hint });
    }
    Ok(p2size)
}
