//! Read/write cursors of [`LfQueue`](crate::LfQueue).
//!
//! A cursor is a slot index plus a generation count. Every advance bumps the
//! count by [`GENERATION_STRIDE`], so a stale snapshot whose index happens to
//! match again still fails the compare-and-swap. This narrows the ABA window
//! but does not close it.

use crate::sync::{AtomicU64, Ordering};

/// Added to the generation count on every advance.
pub const GENERATION_STRIDE: u32 = 3;

/// Position plus generation of a read or write cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    /// Unwrapped position; the slot is `index & (capacity - 1)`.
    pub index: u32,
    /// Generation count, bumped on every advance.
    pub count: u32,
}

impl Cursor {
    /// Cursor at `index` with generation `count`.
    pub const fn new(index: u32, count: u32) -> Self {
        Cursor { index, count }
    }

    /// The cursor one slot further on.
    #[inline]
    pub const fn advance(self) -> Self {
        Cursor {
            index: self.index.wrapping_add(1),
            count: self.count.wrapping_add(GENERATION_STRIDE),
        }
    }

    /// Same generation, new position. Used when growth rebases the ring.
    #[inline]
    pub const fn rebase(self, index: u32) -> Self {
        Cursor {
            index,
            count: self.count,
        }
    }

    #[inline]
    const fn pack(self) -> u64 {
        ((self.count as u64) << 32) | self.index as u64
    }

    #[inline]
    const fn unpack(bits: u64) -> Self {
        Cursor {
            index: bits as u32,
            count: (bits >> 32) as u32,
        }
    }
}

/// A [`Cursor`] updated as one 64-bit word, so both fields are compared and
/// swapped together.
pub struct AtomicCursor {
    bits: AtomicU64,
}

impl AtomicCursor {
    /// Atomic cursor starting at `cursor`.
    pub fn new(cursor: Cursor) -> Self {
        AtomicCursor {
            bits: AtomicU64::new(cursor.pack()),
        }
    }

    /// Current value (Acquire).
    #[inline]
    pub fn load(&self) -> Cursor {
        Cursor::unpack(self.bits.load(Ordering::Acquire))
    }

    /// Overwrite unconditionally (Release).
    #[inline]
    pub fn store(&self, cursor: Cursor) {
        self.bits.store(cursor.pack(), Ordering::Release);
    }

    /// Replace `current` with `new` if nothing moved the cursor in between.
    #[inline]
    pub fn compare_set(&self, current: Cursor, new: Cursor) -> bool {
        self.bits
            .compare_exchange(
                current.pack(),
                new.pack(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Advance from `current` if it is still the live value.
    #[inline]
    pub fn advance_from(&self, current: Cursor) -> bool {
        self.compare_set(current, current.advance())
    }
}

impl std::fmt::Debug for AtomicCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.load().fmt(f)
    }
}
