//! Per-type lock policy for [`GuardedCell`](super::GuardedCell).
//!
//! Every cell carries a [`CellTraits`] instance by value. The policy
//! decides how long acquisition may wait, how a timeout is reported,
//! and what happens around each successful lock/unlock pair. The
//! library default is [`DefaultTraits`] (100 ms timeout, no-op hooks);
//! a type can nominate its own policy via [`HasCellTraits`] and the
//! [`CellOf`] alias, or callers can pass any policy explicitly through
//! `GuardedCell::with_traits`.

use std::fmt;
use std::time::Duration;

use super::error::LockFailed;

/// How long a blocking acquisition may wait for the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockTimeout {
    /// Block indefinitely. Acquisition cannot fail, and the deadlock
    /// probe never runs.
    Forever,
    /// Wait at most this long, then fail with [`LockFailed`].
    ///
    /// `Duration::ZERO` is a guaranteed fast-fail that still goes
    /// through the timed path: it runs the deadlock probe and builds
    /// the error, which is orders of magnitude slower than `try_read` /
    /// `try_write`. Use the `try_` accessors for the low-latency path.
    After(Duration),
}

impl LockTimeout {
    /// The library default: wait 100 ms before failing.
    pub const DEFAULT: Self = Self::After(Duration::from_millis(100));
}

impl Default for LockTimeout {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<Duration> for LockTimeout {
    fn from(timeout: Duration) -> Self {
        Self::After(timeout)
    }
}

impl fmt::Display for LockTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forever => write!(f, "forever"),
            Self::After(d) => write!(f, "{d:?}"),
        }
    }
}

/// Identity of a cell: the address of its shared allocation plus the
/// protected type's name.
///
/// Copies of a cell and guards on it all report the same `CellId`.
/// The id is stable for the lifetime of the allocation and is handed to
/// the [`CellTraits`] hooks so diagnostics can name the cell they
/// concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellId {
    addr: usize,
    type_name: &'static str,
}

impl CellId {
    pub(crate) fn new(addr: usize, type_name: &'static str) -> Self {
        Self { addr, type_name }
    }

    /// Address of the cell's shared allocation.
    #[must_use]
    pub fn addr(&self) -> usize {
        self.addr
    }

    /// Name of the protected type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:#x}", self.type_name, self.addr)
    }
}

/// Per-cell lock policy.
///
/// Carried by value inside each cell. All methods must be callable
/// without help from the cell they belong to; in particular
/// [`timeout`](Self::timeout) is read once at the start of every
/// blocking acquisition, before any lock is taken.
///
/// # Hooks
///
/// `on_locked` and `on_unlocked` are called exactly once per successful
/// acquisition, paired, while the caller owns the lock. `on_locked`
/// produces a [`Held`](Self::Held) value that travels inside the guard
/// and is given back to `on_unlocked`; policies that need no per-guard
/// state use `Held = ()`.
///
/// `on_unlocked` runs from guard destructors and must not panic.
pub trait CellTraits: Send + Sync {
    /// Per-guard state produced on lock and consumed on unlock.
    type Held;

    /// How long `read()` / `write()` may wait for the lock.
    fn timeout(&self) -> LockTimeout {
        LockTimeout::DEFAULT
    }

    /// Builds the error surfaced after a timed acquisition failed.
    ///
    /// `timeout` is the duration that was exceeded and `try_again` the
    /// outcome of the deadlock probe's second attempt. Implementations
    /// may block for an additional duration or attach a captured
    /// backtrace before returning; the returned error is always
    /// surfaced to the caller.
    fn on_timeout(&self, timeout: Duration, try_again: bool) -> LockFailed {
        LockFailed::new(timeout, try_again)
    }

    /// Runs once after the lock is acquired, before the caller sees the
    /// guard.
    fn on_locked(&self, cell: CellId) -> Self::Held;

    /// Runs once from the guard destructor, before the lock is
    /// released. Must not panic.
    fn on_unlocked(&self, cell: CellId, held: Self::Held) {
        let _ = (cell, held);
    }
}

/// The library-default policy: 100 ms timeout, plain [`LockFailed`],
/// no-op hooks.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DefaultTraits;

impl CellTraits for DefaultTraits {
    type Held = ();

    fn on_locked(&self, _cell: CellId) {}
}

/// Nominates a [`CellTraits`] policy for a type.
///
/// Implement this on the protected type itself to make [`CellOf`]
/// resolve the policy automatically:
///
/// ```
/// use std::time::Duration;
/// use guardcell::{CellId, CellOf, CellTraits, HasCellTraits, LockTimeout};
///
/// struct Index(Vec<u32>);
///
/// #[derive(Default)]
/// struct IndexTraits;
///
/// impl CellTraits for IndexTraits {
///     type Held = ();
///
///     fn timeout(&self) -> LockTimeout {
///         LockTimeout::After(Duration::from_millis(10))
///     }
///
///     fn on_locked(&self, _cell: CellId) {}
/// }
///
/// impl HasCellTraits for Index {
///     type Traits = IndexTraits;
/// }
///
/// let index: CellOf<Index> = CellOf::new(Index(Vec::new()));
/// index.write().unwrap().0.push(7);
/// ```
pub trait HasCellTraits {
    /// The policy to use for cells of this type.
    type Traits: CellTraits + Default;
}

/// A cell whose policy is resolved through [`HasCellTraits`].
pub type CellOf<T> = super::GuardedCell<T, <T as HasCellTraits>::Traits>;
