//! lfring - growable circular queues over power-of-two rings
//!
//! - [`LfQueue`]: lock-free MPMC queue. Each slot carries a state tag
//!   (free, pushing, has-node, popping) and the cursors carry a generation
//!   count. When full, `push` doubles the ring under a spin RW lock instead
//!   of failing.
//! - [`Queue`]: the same ring arithmetic for a single owner.
//! - [`AbstractFifo`]: SPSC index bookkeeping over a buffer the caller owns.
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//!
//! let queue = Arc::new(lfring::LfQueue::with_pow2(2).unwrap());
//! let producer = {
//!     let queue = Arc::clone(&queue);
//!     thread::spawn(move || {
//!         for i in 0..100 {
//!             queue.push(i).unwrap();
//!         }
//!     })
//! };
//! producer.join().unwrap();
//!
//! let got: Vec<i32> = std::iter::from_fn(|| queue.pop()).collect();
//! assert_eq!(got, (0..100).collect::<Vec<_>>());
//! ```
#![warn(missing_docs)]

mod invariant;
mod sync;
mod trace;

mod backoff;
pub mod cursor;
pub mod error;
pub mod fifo;
pub mod lfqueue;
pub mod queue;
pub mod rwlock;
mod storage;

pub use backoff::Backoff;
pub use cursor::Cursor;
pub use error::{GrowError, PushError, QueueError};
pub use fifo::{AbstractFifo, FifoRegions};
pub use lfqueue::{LfQueue, LfQueueBuilder};
pub use queue::Queue;
pub use rwlock::SpinRwLock;
pub use trace::init_tracing;

/// Exponent used by `new()`: `2^12` slots.
pub const DEFAULT_P2SIZE: u32 = 12;

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn smoke() {
        let q = LfQueue::new();
        q.push(42).unwrap();
        assert_eq!(q.pop(), Some(42));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn bound_push_then_pop() {
        let q = LfQueue::with_pow2(2).unwrap();
        for i in 0..3 {
            assert!(q.bound_push(i).is_ok());
        }
        assert!(q.bound_push(99).is_err());
        for i in 0..3 {
            assert_eq!(q.pop(), Some(i));
        }
        assert!(q.pop().is_none());
    }

    #[test]
    fn shared_across_threads() {
        let q = Arc::new(LfQueue::with_pow2(3).unwrap());
        let handles: Vec<_> = (0..2)
            .map(|t| {
                let q = Arc::clone(&q);
                thread::spawn(move || {
                    for i in 0..50 {
                        q.push(t * 100 + i).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let mut got: Vec<_> = std::iter::from_fn(|| q.pop()).collect();
        got.sort_unstable();
        let mut want: Vec<_> = (0..50).chain(100..150).collect();
        want.sort_unstable();
        assert_eq!(got, want);
    }
}
