//! Atomic shim so the queue core can be model-checked under `--cfg loom`.

#[cfg(not(loom))]
pub(crate) use std::sync::atomic::{AtomicIsize, AtomicU64, AtomicU8, AtomicUsize, Ordering};

#[cfg(loom)]
pub(crate) use loom::sync::atomic::{AtomicIsize, AtomicU64, AtomicU8, AtomicUsize, Ordering};

use std::time::Duration;

/// One busy-wait iteration.
#[inline(always)]
pub(crate) fn spin_hint() {
    #[cfg(not(loom))]
    core::hint::spin_loop();
    #[cfg(loom)]
    loom::thread::yield_now();
}

/// Give up the CPU for `dur`; a zero duration only yields.
#[inline]
pub(crate) fn pause(dur: Duration) {
    #[cfg(not(loom))]
    {
        if dur.is_zero() {
            std::thread::yield_now();
        } else {
            std::thread::sleep(dur);
        }
    }
    #[cfg(loom)]
    {
        let _ = dur;
        loom::thread::yield_now();
    }
}
