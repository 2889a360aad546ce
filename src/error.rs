//! Error types returned by the queues.

use std::collections::TryReserveError;
use thiserror::Error;

/// Failure to build or resize a queue's backing store.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The power-of-two exponent is outside `1..=max`.
    #[error("power-of-two exponent {p2size} is outside 1..={max}")]
    InvalidPow2 {
        /// Exponent that was asked for.
        p2size: u32,
        /// Largest exponent the queue supports.
        max: u32,
    },

    /// The requested capacity cannot be addressed by the queue's cursors.
    #[error("capacity of {requested} slots cannot be addressed")]
    CapacityOverflow {
        /// Slots that were asked for.
        requested: usize,
    },

    /// The allocator refused the new backing store.
    #[error("failed to allocate {slots} slots")]
    Alloc {
        /// Size of the store that could not be allocated.
        slots: usize,
        /// The allocator's own report.
        #[source]
        source: TryReserveError,
    },
}

/// A bounded push found the queue full. The rejected value is handed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("queue is full")]
pub struct PushError<T>(pub T);

impl<T> PushError<T> {
    /// Recover the value that could not be pushed.
    pub fn into_inner(self) -> T {
        self.0
    }
}

/// An unbounded push needed more room and growing the queue failed.
///
/// The queue is left exactly as it was before the push; `value` is returned.
#[derive(Debug, Error)]
#[error("queue could not grow: {source}")]
pub struct GrowError<T> {
    /// The value that was not pushed.
    pub value: T,
    /// Why the queue could not grow.
    #[source]
    pub source: QueueError,
}

impl<T> GrowError<T> {
    /// Recover the value that could not be pushed.
    pub fn into_inner(self) -> T {
        self.value
    }
}
