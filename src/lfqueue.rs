//! Lock-free growable circular queue.
//!
//! # Slot protocol
//!
//! Every slot carries a state tag next to its value:
//!
//! ```text
//! FreeToUse --push claims--> Pushing --value written--> HasNode
//!     ^                                                    |
//!     +----value moved out---- Popping <--pop claims-------+
//! ```
//!
//! The tag, not the cursors, decides whether a slot's value is initialized.
//! Cursors only say where to look. A thread that finds a tag one step ahead
//! of what its cursor snapshot implies knows the snapshot is stale, helps
//! advance the cursor, and retries.
//!
//! A consumer advances the read cursor before it frees the slot. A producer
//! that claims a slot then re-reads the read cursor and gives the slot back
//! if the cursor has already passed it: its snapshot was stale and the slot
//! was drained in between. A stale consumer needs no such check, since it
//! can only take a newer element early.
//!
//! A producer that stalls for a full lap can still leave a committed slot
//! behind the read cursor. Such an element is not lost: the next growth
//! moves it in after the live range, so it is delivered late.
//!
//! # Growth
//!
//! Push, pop and the queries hold the growth lock as readers for their whole
//! duration. Growth takes it as the writer, so it runs only once every
//! in-flight operation has finished and no slot is `Pushing` or `Popping`.
//! The live slots are then moved to the front of a store twice the size,
//! followed by any committed slot stranded outside the live range, and the
//! cursors rebased.
//!
//! # Ordering
//!
//! Elements come out in the order their slots were committed. Two producers
//! can commit out of call order, and `pop` never skips a slot that is still
//! being written: it reports `None` instead, even if later slots are ready.

use std::cell::UnsafeCell;
use std::fmt;
use std::marker::PhantomData;
use std::mem::MaybeUninit;

use crossbeam_utils::CachePadded;

use crate::backoff::Backoff;
use crate::cursor::{AtomicCursor, Cursor};
use crate::error::{GrowError, PushError, QueueError};
use crate::invariant::invariant;
use crate::rwlock::{ReadGuard, SpinRwLock, WriteGuard};
use crate::storage::{pow2_for_capacity, RingCell, RingStorage};
use crate::sync::{spin_hint, AtomicU8, Ordering};
use crate::trace::{debug, trace, warn};
use crate::DEFAULT_P2SIZE;

/// Largest exponent: cursors are `u32`, so the ring must divide `2^32`.
pub const MAX_P2SIZE: u32 = 31;

const FREE_TO_USE: u8 = 0;
const PUSHING: u8 = 1;
const HAS_NODE: u8 = 2;
const POPPING: u8 = 3;

struct Slot<T> {
    state: AtomicU8,
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> RingCell for Slot<T> {
    fn vacant() -> Self {
        Slot {
            state: AtomicU8::new(FREE_TO_USE),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    // Only runs under the write hold, so no tag is mid-transition.
    fn relocate_from(&mut self, src: &mut Self) {
        let state = src.state.load(Ordering::Relaxed);
        invariant!(state == FREE_TO_USE || state == HAS_NODE);
        *self.value.get_mut() = std::mem::replace(src.value.get_mut(), MaybeUninit::uninit());
        self.state.store(state, Ordering::Relaxed);
        src.state.store(FREE_TO_USE, Ordering::Relaxed);
    }

    fn is_stranded(&self) -> bool {
        self.state.load(Ordering::Relaxed) == HAS_NODE
    }
}

impl<T> Drop for Slot<T> {
    fn drop(&mut self) {
        if self.state.load(Ordering::Relaxed) == HAS_NODE {
            // SAFETY: HAS_NODE means the value is initialized and nobody owns
            // it; `&mut self` rules out a concurrent pop.
            unsafe { self.value.get_mut().assume_init_drop() };
        }
    }
}

/// Lock-free FIFO queue that grows instead of failing.
///
/// Share it between threads with `Arc<LfQueue<T>>`. One slot is always left
/// vacant, so a capacity of `2^p` holds `2^p - 1` elements before it grows.
pub struct LfQueue<T> {
    ring: UnsafeCell<RingStorage<Slot<T>>>,
    read: CachePadded<AtomicCursor>,
    write: CachePadded<AtomicCursor>,
    grow_lock: SpinRwLock,
}

// SAFETY: values only move between threads through the slot protocol, and the
// ring is only replaced under the exclusive growth hold.
unsafe impl<T: Send> Send for LfQueue<T> {}
unsafe impl<T: Send> Sync for LfQueue<T> {}

impl<T> LfQueue<T> {
    /// Queue with `2^12` slots and the default backoff.
    ///
    /// # Panics
    ///
    /// If the initial store cannot be allocated.
    pub fn new() -> Self {
        match Self::builder().build() {
            Ok(queue) => queue,
            Err(err) => panic!("default queue allocation failed: {err}"),
        }
    }

    /// Queue with `2^p2size` slots, `1 <= p2size <= 31`.
    pub fn with_pow2(p2size: u32) -> Result<Self, QueueError> {
        Self::builder().pow2(p2size).build()
    }

    /// Queue whose capacity is `hint` rounded up to a power of two (at least 2).
    pub fn with_capacity(hint: usize) -> Result<Self, QueueError> {
        Self::builder().capacity(hint).build()
    }

    /// Start configuring a queue; see [`LfQueueBuilder`].
    pub fn builder() -> LfQueueBuilder<T> {
        LfQueueBuilder::new()
    }

    fn from_parts(p2size: u32, backoff: Backoff) -> Result<Self, QueueError> {
        Ok(LfQueue {
            ring: UnsafeCell::new(RingStorage::with_pow2(p2size, MAX_P2SIZE)?),
            read: CachePadded::new(AtomicCursor::new(Cursor::default())),
            write: CachePadded::new(AtomicCursor::new(Cursor::default())),
            grow_lock: SpinRwLock::with_backoff(backoff),
        })
    }

    #[inline]
    fn ring<'a>(&'a self, _hold: &'a ReadGuard<'_>) -> &'a RingStorage<Slot<T>> {
        // SAFETY: the store is only replaced under a write hold, which cannot
        // coexist with the read hold borrowed here.
        unsafe { &*self.ring.get() }
    }

    #[inline]
    #[allow(clippy::mut_from_ref)]
    fn ring_mut<'a>(&'a self, _hold: &'a mut WriteGuard<'_>) -> &'a mut RingStorage<Slot<T>> {
        // SAFETY: the write hold excludes every reader and every other writer.
        unsafe { &mut *self.ring.get() }
    }

    /// Read first, then write: a stale `read` can only make the queue look
    /// fuller, never emptier.
    #[inline]
    fn snapshot(&self) -> (Cursor, Cursor) {
        let read = self.read.load();
        let write = self.write.load();
        (read, write)
    }

    #[inline]
    fn full_at(ring: &RingStorage<Slot<T>>, read: Cursor, write: Cursor) -> bool {
        write.index.wrapping_sub(read.index) as usize >= ring.capacity() - 1
    }

    /// `read` has moved past `at`.
    #[inline]
    fn behind(read: Cursor, at: Cursor) -> bool {
        (at.index.wrapping_sub(read.index) as i32) < 0
    }

    #[inline]
    fn empty_at(ring: &RingStorage<Slot<T>>, read: Cursor, write: Cursor) -> bool {
        ring.mod_index(read.index as usize) == ring.mod_index(write.index as usize)
    }

    /// Push without growing. Hands `value` back if the queue is full or the
    /// target slot is still being popped.
    pub fn bound_push(&self, value: T) -> Result<(), PushError<T>> {
        let hold = self.grow_lock.read();
        let ring = self.ring(&hold);

        loop {
            let (read, write) = self.snapshot();
            if Self::full_at(ring, read, write) {
                return Err(PushError(value));
            }

            let slot = ring.get(write.index as usize);
            match slot.state.compare_exchange(
                FREE_TO_USE,
                PUSHING,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    // Drained by a consumer after our snapshot: the slot is
                    // already behind the read cursor.
                    if Self::behind(self.read.load(), write) {
                        slot.state.store(FREE_TO_USE, Ordering::Release);
                        continue;
                    }
                    // SAFETY: PUSHING gives this thread sole access to the slot.
                    unsafe { (*slot.value.get()).write(value) };
                    // Nobody else moves a tag out of PUSHING.
                    slot.state.store(HAS_NODE, Ordering::Release);
                    self.write.advance_from(write);
                    return Ok(());
                }
                // A consumer is still draining this slot.
                Err(POPPING) => return Err(PushError(value)),
                Err(observed) => {
                    invariant!(observed == PUSHING || observed == HAS_NODE);
                    self.write.advance_from(write);
                }
            }
        }
    }

    /// Push, doubling the capacity whenever the queue is full.
    ///
    /// Fails only if the queue cannot grow any further or the allocator
    /// refuses; the queue is then unchanged and `value` is returned.
    pub fn push(&self, value: T) -> Result<(), GrowError<T>> {
        let mut value = value;
        loop {
            match self.bound_push(value) {
                Ok(()) => return Ok(()),
                Err(PushError(v)) => value = v,
            }
            if let Err(source) = self.try_grow() {
                return Err(GrowError { value, source });
            }
        }
    }

    /// Push, discarding the oldest elements while the queue is full.
    pub fn lostable_push(&self, value: T) {
        let mut value = value;
        loop {
            match self.bound_push(value) {
                Ok(()) => return,
                Err(PushError(v)) => value = v,
            }
            match self.pop() {
                Some(evicted) => {
                    trace!("lostable_push evicted the oldest element");
                    drop(evicted);
                }
                None => spin_hint(),
            }
        }
    }

    /// Take the element at the read cursor.
    ///
    /// `None` means nothing is committed there yet: either the queue is empty
    /// or the oldest slot is still being written.
    pub fn pop(&self) -> Option<T> {
        let hold = self.grow_lock.read();
        let ring = self.ring(&hold);

        loop {
            let (read, write) = self.snapshot();
            if Self::empty_at(ring, read, write) {
                return None;
            }

            let slot = ring.get(read.index as usize);
            match slot.state.compare_exchange(
                HAS_NODE,
                POPPING,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    // SAFETY: HAS_NODE -> POPPING hands this thread the
                    // initialized value; the tag goes back to FREE_TO_USE only
                    // after it has been moved out.
                    let value = unsafe { (*slot.value.get()).assume_init_read() };
                    // Cursor first, so a producer that sees FREE_TO_USE also
                    // sees the slot behind the read cursor.
                    self.read.advance_from(read);
                    slot.state.store(FREE_TO_USE, Ordering::Release);
                    return Some(value);
                }
                Err(PUSHING) => return None,
                Err(observed) => {
                    invariant!(observed == FREE_TO_USE || observed == POPPING);
                    self.read.advance_from(read);
                }
            }
        }
    }

    /// Double the capacity, waiting for any concurrent growth to finish first.
    pub fn grow(&self) -> Result<(), QueueError> {
        let mut hold = self.grow_lock.write();
        self.grow_locked(&mut hold)
    }

    /// Double the capacity unless another thread is already growing.
    ///
    /// Returns `Ok(false)` when it backed off; that thread's growth is then
    /// visible to the caller's next operation.
    pub fn try_grow(&self) -> Result<bool, QueueError> {
        match self.grow_lock.write_any() {
            Some(mut hold) => self.grow_locked(&mut hold).map(|()| true),
            None => Ok(false),
        }
    }

    fn grow_locked(&self, hold: &mut WriteGuard<'_>) -> Result<(), QueueError> {
        let ring = self.ring_mut(hold);
        let (read, write) = self.snapshot();

        match ring.reallocate(
            ring.p2size() + 1,
            MAX_P2SIZE,
            read.index as usize,
            write.index as usize,
        ) {
            Ok(used) => {
                self.read.store(read.rebase(0));
                self.write.store(write.rebase(used as u32));
                debug!(capacity = ring.capacity(), len = used, "lfqueue grew");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "lfqueue growth failed");
                Err(err)
            }
        }
    }

    /// Advisory: may be stale by the time the caller looks at it.
    pub fn is_full(&self) -> bool {
        let hold = self.grow_lock.read();
        let (read, write) = self.snapshot();
        Self::full_at(self.ring(&hold), read, write)
    }

    /// Advisory: may be stale by the time the caller looks at it.
    pub fn is_empty(&self) -> bool {
        let hold = self.grow_lock.read();
        let (read, write) = self.snapshot();
        Self::empty_at(self.ring(&hold), read, write)
    }

    /// Elements between the cursors, including slots still being written.
    pub fn len(&self) -> usize {
        let hold = self.grow_lock.read();
        let (read, write) = self.snapshot();
        self.ring(&hold)
            .used_size(write.index as usize, read.index as usize)
    }

    /// Total slots, including the one kept vacant.
    pub fn capacity(&self) -> usize {
        let hold = self.grow_lock.read();
        self.ring(&hold).capacity()
    }

    /// Exponent of the current capacity.
    pub fn p2size(&self) -> u32 {
        let hold = self.grow_lock.read();
        self.ring(&hold).p2size()
    }
}

impl<T> Default for LfQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for LfQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let capacity = self
            .grow_lock
            .try_read()
            .map(|hold| self.ring(&hold).capacity());

        let mut s = f.debug_struct("LfQueue");
        s.field("read", &*self.read).field("write", &*self.write);
        match capacity {
            Some(capacity) => s.field("capacity", &capacity),
            None => s.field("capacity", &"<growing>"),
        };
        s.finish()
    }
}

/// Configuration for an [`LfQueue`] of `T`.
///
/// ```
/// use lfring::{Backoff, LfQueue};
/// use std::time::Duration;
///
/// let queue = LfQueue::builder()
///     .capacity(1000)
///     .backoff(Backoff::new(64, Duration::from_micros(50)))
///     .build()
///     .unwrap();
/// queue.push(7u64).unwrap();
/// assert_eq!(queue.capacity(), 1024);
/// ```
pub struct LfQueueBuilder<T> {
    size: InitialSize,
    backoff: Backoff,
    _marker: PhantomData<fn() -> T>,
}

#[derive(Debug, Clone, Copy)]
enum InitialSize {
    Pow2(u32),
    Capacity(usize),
}

impl<T> LfQueueBuilder<T> {
    /// `2^12` slots and the default backoff.
    pub fn new() -> Self {
        LfQueueBuilder {
            size: InitialSize::Pow2(DEFAULT_P2SIZE),
            backoff: Backoff::default(),
            _marker: PhantomData,
        }
    }

    /// Start with `2^p2size` slots.
    pub fn pow2(mut self, p2size: u32) -> Self {
        self.size = InitialSize::Pow2(p2size);
        self
    }

    /// Start with at least `hint` slots, rounded up to a power of two.
    pub fn capacity(mut self, hint: usize) -> Self {
        self.size = InitialSize::Capacity(hint);
        self
    }

    /// How waiters on the growth lock spin and sleep.
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Allocate the queue. Fails on an out-of-range size or if the allocator
    /// refuses the initial store.
    pub fn build(self) -> Result<LfQueue<T>, QueueError> {
        let p2size = match self.size {
            InitialSize::Pow2(p2size) => p2size,
            InitialSize::Capacity(hint) => pow2_for_capacity(hint, MAX_P2SIZE)?,
        };
        LfQueue::from_parts(p2size, self.backoff)
    }
}

impl<T> Default for LfQueueBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for LfQueueBuilder<T> {
    fn clone(&self) -> Self {
        LfQueueBuilder {
            size: self.size,
            backoff: self.backoff,
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for LfQueueBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LfQueueBuilder")
            .field("size", &self.size)
            .field("backoff", &self.backoff)
            .finish()
    }
}
