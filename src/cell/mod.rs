//! Thread-safe guarded smart pointer.
//!
//! A [`GuardedCell`] owns a heap value together with a readers-writer
//! mutex and a per-cell [`CellTraits`] policy. Guards are the sole safe
//! path to the value:
//!
//! - [`ReadGuard`]: shared access, any number may coexist.
//! - [`WriteGuard`]: exclusive access, excludes every other guard.
//!
//! Blocking acquisition ([`GuardedCell::read`], [`GuardedCell::write`])
//! either returns a guard or fails with [`LockFailed`] after the
//! traits-configured timeout; the non-blocking variants
//! ([`GuardedCell::try_read`], [`GuardedCell::try_write`]) return
//! `None` instead and never construct an error.
//!
//! # Hooks
//!
//! The traits policy observes every successful acquisition:
//! `on_locked` runs once after the lock is taken, `on_unlocked` once
//! before it is released. The [`WatchedTraits`] extension uses the pair
//! to warn when a guard is held longer than expected; the
//! [`BacktraceTraits`] extension attaches a backtrace to `LockFailed`.

mod error;
mod extensions;
mod guarded;
mod traits;

pub use error::LockFailed;
pub use extensions::{BacktraceTraits, HeldReport, HeldTooLong, WatchedTraits};
pub use guarded::{
    ConstCell, GuardedCell, ReadGuard, WeakCell, WeakConstCell, WriteGuard,
};
pub use traits::{CellId, CellOf, CellTraits, DefaultTraits, HasCellTraits, LockTimeout};
