//! Cross-platform systems-programming primitives built around a
//! thread-safe guarded smart pointer.
//!
//! The centerpiece is [`GuardedCell`], a reference-counted handle to a
//! shared mutable value that cannot be read or written without first
//! acquiring a lock. The lock discipline is enforced at compile time
//! through guard types, and lock-acquisition failures are reported at
//! runtime with enough diagnostic information (timeouts, deadlock-probe
//! results, optional backtraces and held-time warnings) to make
//! concurrency bugs actionable.
//!
//! # In a nutshell
//!
//! ```
//! use guardcell::GuardedCell;
//!
//! let cell = GuardedCell::new(vec![1, 2, 3]);
//!
//! // Mutually exclusive write access.
//! cell.write().unwrap().push(4);
//!
//! // Shared read access; any number of readers may coexist.
//! let r = cell.read().unwrap();
//! assert_eq!(r.len(), 4);
//! ```
//!
//! # Modules
//!
//! - [`cell`]: the guarded pointer, its guards, per-type traits and the
//!   [`LockFailed`] error.
//! - [`sync`]: spinning and locking barriers for N-way rendezvous.
//! - [`time`]: a monotonic elapsed timer, a scoped execution-time watch,
//!   and a task-logging timer.
//! - [`trace`]: backtrace capture with deferred symbolization.
//! - [`assert`]: a structured assertion error and the [`ensure!`] macro.
//!
//! # Lock discipline
//!
//! The only safe paths to the protected value are [`GuardedCell::read`],
//! [`GuardedCell::write`] and their `try_` variants; each returns a
//! guard that borrows the cell and releases the lock on drop, even
//! during unwinding. Recursive acquisition from one thread is a bug:
//! it either deadlocks (with [`LockTimeout::Forever`]) or surfaces as a
//! [`LockFailed`] after the configured timeout. Never lock the same
//! cell more than once on the same thread at the same time.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod assert;
pub mod cell;
pub mod sync;
pub mod time;
pub mod trace;

#[cfg(test)]
pub mod test_utils;

pub use cell::{
    BacktraceTraits, CellId, CellOf, CellTraits, ConstCell, DefaultTraits, GuardedCell,
    HasCellTraits, HeldReport, HeldTooLong, LockFailed, LockTimeout, ReadGuard, WatchedTraits,
    WeakCell, WeakConstCell, WriteGuard,
};
