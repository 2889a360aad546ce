//! Spin-then-sleep retry policy for the growth lock.

use std::time::Duration;

use crate::sync::{pause, spin_hint};

const DEFAULT_SPIN_LIMIT: u32 = 40;
const DEFAULT_SLEEP: Duration = Duration::from_micros(100);

/// How a waiter behaves while the growth lock is unavailable.
///
/// A waiter spins `spin_limit` times, then sleeps for `sleep` and starts
/// spinning again. A zero `sleep` yields the thread instead of sleeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    spin_limit: u32,
    sleep: Duration,
}

impl Backoff {
    /// Spin `spin_limit` times between sleeps of `sleep`.
    pub const fn new(spin_limit: u32, sleep: Duration) -> Self {
        Backoff { spin_limit, sleep }
    }

    /// Spin, then yield; never sleeps. Handy for tests.
    pub const fn spin_only() -> Self {
        Backoff::new(DEFAULT_SPIN_LIMIT, Duration::ZERO)
    }

    /// Spins before each sleep.
    pub const fn spin_limit(&self) -> u32 {
        self.spin_limit
    }

    /// Length of each sleep; zero means yield.
    pub const fn sleep(&self) -> Duration {
        self.sleep
    }

    /// Wait once. `step` is the caller's loop counter, starting at zero.
    #[inline]
    pub(crate) fn snooze(&self, step: &mut u32) {
        if *step < self.spin_limit {
            *step += 1;
            spin_hint();
        } else {
            *step = 0;
            pause(self.sleep);
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::new(DEFAULT_SPIN_LIMIT, DEFAULT_SLEEP)
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn snooze_resets_after_limit() {
        let backoff = Backoff::new(3, Duration::ZERO);
        let mut step = 0;
        for expected in 1..=3 {
            backoff.snooze(&mut step);
            assert_eq!(step, expected);
        }
        backoff.snooze(&mut step);
        assert_eq!(step, 0);
    }

    #[test]
    fn default_policy() {
        let backoff = Backoff::default();
        assert_eq!(backoff.spin_limit(), 40);
        assert_eq!(backoff.sleep(), Duration::from_micros(100));
        assert_eq!(Backoff::spin_only().sleep(), Duration::ZERO);
    }
}
