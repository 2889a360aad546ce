//! Single-context circular queue with geometric growth.

use std::fmt;
use std::mem::MaybeUninit;

use crate::error::{GrowError, PushError, QueueError};
use crate::storage::{pow2_for_capacity, RingStorage};
use crate::trace::debug;
use crate::DEFAULT_P2SIZE;

const MAX_P2SIZE: u32 = usize::BITS - 1;

/// FIFO queue over a power-of-two ring. One slot is always left vacant, so a
/// queue of capacity `2^p` holds at most `2^p - 1` elements before it grows.
///
/// All mutation goes through `&mut self`; wrap it in a lock or use
/// [`LfQueue`](crate::LfQueue) to share it between threads.
pub struct Queue<T> {
    store: RingStorage<MaybeUninit<T>>,
    read: usize,
    write: usize,
}

impl<T> Queue<T> {
    /// Queue with `2^12` slots.
    pub fn new() -> Self {
        match Self::with_pow2(DEFAULT_P2SIZE) {
            Ok(queue) => queue,
            Err(err) => panic!("default queue allocation failed: {err}"),
        }
    }

    /// Queue with `2^p2size` slots, `p2size >= 1`.
    pub fn with_pow2(p2size: u32) -> Result<Self, QueueError> {
        Ok(Queue {
            store: RingStorage::with_pow2(p2size, MAX_P2SIZE)?,
            read: 0,
            write: 0,
        })
    }

    /// Queue whose capacity is `hint` rounded up to a power of two (at least 2).
    pub fn with_capacity(hint: usize) -> Result<Self, QueueError> {
        Self::with_pow2(pow2_for_capacity(hint, MAX_P2SIZE)?)
    }

    /// Append `value` unless the queue is full.
    pub fn bound_push(&mut self, value: T) -> Result<(), PushError<T>> {
        if self.is_full() {
            return Err(PushError(value));
        }
        *self.store.get_mut(self.write) = MaybeUninit::new(value);
        self.write = self.write.wrapping_add(1);
        Ok(())
    }

    /// Append `value`, doubling the capacity as often as needed.
    pub fn push(&mut self, value: T) -> Result<(), GrowError<T>> {
        let mut value = value;
        loop {
            match self.bound_push(value) {
                Ok(()) => return Ok(()),
                Err(PushError(v)) => value = v,
            }
            if let Err(source) = self.grow() {
                return Err(GrowError { value, source });
            }
        }
    }

    /// Double the capacity, moving live elements to the front of the new ring.
    pub fn grow(&mut self) -> Result<(), QueueError> {
        let next = self.store.p2size() + 1;
        self.write = self.store.reallocate(next, MAX_P2SIZE, self.read, self.write)?;
        self.read = 0;
        debug!(capacity = self.store.capacity(), len = self.write, "queue grew");
        Ok(())
    }

    /// Remove the oldest element.
    pub fn pop(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        // SAFETY: cells in [read, write) are initialized; we advance `read`
        // right after taking ownership, so this cell is not read twice.
        let value = unsafe { self.store.get(self.read).assume_init_read() };
        self.read = self.read.wrapping_add(1);
        Some(value)
    }

    /// The oldest element, without removing it.
    pub fn peek(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        // SAFETY: cell `read` is initialized while the queue is non-empty.
        Some(unsafe { self.store.get(self.read).assume_init_ref() })
    }

    /// No element is stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.store.mod_index(self.read) == self.store.mod_index(self.write)
    }

    /// The next [`bound_push`](Self::bound_push) would fail.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.store.mod_index(self.read) == self.store.mod_index(self.write.wrapping_add(1))
    }

    /// Number of stored elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.store.used_size(self.write, self.read)
    }

    /// Total slots, including the one kept vacant.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    /// Drop every stored element.
    pub fn clear(&mut self) {
        while self.pop().is_some() {}
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Queue<T> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T> fmt::Debug for Queue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}
