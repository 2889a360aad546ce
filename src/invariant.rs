//! Invariant checks.
//!
//! `invariant!` is a `debug_assert!` unless the `checked` feature is on, in
//! which case it is a full `assert!` in every build profile.

#[cfg(feature = "checked")]
macro_rules! invariant {
    ($($arg:tt)*) => { assert!($($arg)*) };
}

#[cfg(not(feature = "checked"))]
macro_rules! invariant {
    ($($arg:tt)*) => { debug_assert!($($arg)*) };
}

pub(crate) use invariant;
