//! Many-readers / one-writer spin lock that fences queue growth.
//!
//! The whole lock is one signed counter: `0` free, `n > 0` held by `n`
//! readers, `-1` held by a writer. Waiters follow the lock's [`Backoff`].

use crossbeam_utils::CachePadded;

use crate::backoff::Backoff;
use crate::invariant::invariant;
use crate::sync::{AtomicIsize, Ordering};
use crate::trace::trace;

const FREE: isize = 0;
const WRITER: isize = -1;

/// Spin lock shared by many readers or held by one writer.
pub struct SpinRwLock {
    state: CachePadded<AtomicIsize>,
    backoff: Backoff,
}

impl SpinRwLock {
    /// Unlocked, with the default [`Backoff`].
    pub fn new() -> Self {
        Self::with_backoff(Backoff::default())
    }

    /// Unlocked, with waiters following `backoff`.
    pub fn with_backoff(backoff: Backoff) -> Self {
        SpinRwLock {
            state: CachePadded::new(AtomicIsize::new(FREE)),
            backoff,
        }
    }

    /// The waiting policy.
    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// Shared hold. Waits while a writer is inside.
    pub fn read(&self) -> ReadGuard<'_> {
        let mut step = 0;
        loop {
            if let Some(guard) = self.try_read() {
                return guard;
            }
            self.backoff.snooze(&mut step);
        }
    }

    /// Shared hold without waiting for a writer. Concurrent readers never make
    /// this fail.
    pub fn try_read(&self) -> Option<ReadGuard<'_>> {
        let mut current = self.state.load(Ordering::Relaxed);
        loop {
            invariant!(current >= WRITER);
            if current == WRITER {
                return None;
            }
            match self.state.compare_exchange_weak(
                current,
                current + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Some(ReadGuard { lock: self }),
                Err(observed) => current = observed,
            }
        }
    }

    /// Exclusive hold. Waits for readers and any other writer to leave.
    pub fn write(&self) -> WriteGuard<'_> {
        let mut step = 0;
        loop {
            if let Some(guard) = self.try_write() {
                return guard;
            }
            self.backoff.snooze(&mut step);
        }
    }

    /// Exclusive hold if the lock is free right now.
    pub fn try_write(&self) -> Option<WriteGuard<'_>> {
        self.state
            .compare_exchange(FREE, WRITER, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| WriteGuard { lock: self })
    }

    /// Exclusive hold unless another writer got there first.
    ///
    /// Waits for readers to drain. Returns `None` as soon as it sees the lock
    /// held by a writer; the caller must not assume it owns anything then.
    pub fn write_any(&self) -> Option<WriteGuard<'_>> {
        let mut step = 0;
        loop {
            match self.state.compare_exchange(
                FREE,
                WRITER,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Some(WriteGuard { lock: self }),
                Err(WRITER) => {
                    trace!("write_any: another writer holds the lock");
                    return None;
                }
                Err(_) => self.backoff.snooze(&mut step),
            }
        }
    }

    #[cfg(test)]
    fn raw_state(&self) -> isize {
        self.state.load(Ordering::Relaxed)
    }
}

impl Default for SpinRwLock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SpinRwLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpinRwLock")
            .field("state", &self.state.load(Ordering::Relaxed))
            .field("backoff", &self.backoff)
            .finish()
    }
}

/// Shared hold on a [`SpinRwLock`].
#[must_use = "the read hold is released when the guard is dropped"]
pub struct ReadGuard<'a> {
    lock: &'a SpinRwLock,
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        let previous = self.lock.state.fetch_sub(1, Ordering::Release);
        invariant!(previous > FREE, "read hold released while not held");
    }
}

/// Exclusive hold on a [`SpinRwLock`].
#[must_use = "the write hold is released when the guard is dropped"]
pub struct WriteGuard<'a> {
    lock: &'a SpinRwLock,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        // Only the holder can move the state away from WRITER.
        let released = self
            .lock
            .state
            .compare_exchange(WRITER, FREE, Ordering::Release, Ordering::Relaxed)
            .is_ok();
        invariant!(released, "write hold released while not held");
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn readers_share() {
        let lock = SpinRwLock::new();
        let a = lock.read();
        let b = lock.read();
        assert_eq!(lock.raw_state(), 2);
        assert!(lock.try_write().is_none());
        drop(a);
        drop(b);
        assert_eq!(lock.raw_state(), 0);
        assert!(lock.try_write().is_some());
        assert_eq!(lock.raw_state(), 0);
    }

    #[test]
    fn writer_excludes_readers() {
        let lock = SpinRwLock::new();
        let guard = lock.write();
        assert_eq!(lock.raw_state(), -1);
        assert!(lock.try_read().is_none());
        assert!(lock.try_write().is_none());
        drop(guard);
        assert!(lock.try_read().is_some());
    }

    #[test]
    fn write_any_yields_to_active_writer() {
        let lock = SpinRwLock::with_backoff(Backoff::spin_only());
        let held = lock.write();
        assert!(lock.write_any().is_none());
        drop(held);
        let won = lock.write_any();
        assert!(won.is_some());
    }

    #[test]
    fn write_any_waits_for_readers() {
        let lock = Arc::new(SpinRwLock::with_backoff(Backoff::new(8, Duration::ZERO)));
        let reader = lock.read();

        let contender = {
            let lock = Arc::clone(&lock);
            thread::spawn(move || lock.write_any().is_some())
        };

        thread::sleep(Duration::from_millis(20));
        assert!(!contender.is_finished());
        drop(reader);
        assert!(contender.join().unwrap());
        assert_eq!(lock.raw_state(), 0);
    }

    #[test]
    fn writers_are_mutually_exclusive() {
        let lock = Arc::new(SpinRwLock::with_backoff(Backoff::spin_only()));
        let inside = Arc::new(AtomicUsize::new(0));
        let mut handles = vec![];

        for _ in 0..4 {
            let lock = Arc::clone(&lock);
            let inside = Arc::clone(&inside);
            handles.push(thread::spawn(move || {
                for _ in 0..500 {
                    let _guard = lock.write();
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                    inside.fetch_sub(1, Ordering::SeqCst);
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(lock.raw_state(), 0);
    }
}
