//! The guarded cell, its guards, and the lock-acquisition protocol.
//!
//! A [`GuardedCell`] is a reference-counted handle to one shared
//! allocation holding the protected value, a readers-writer mutex, and
//! the per-cell [`CellTraits`] policy. Copies of a cell alias the same
//! allocation; the allocation is freed when the last cell and the last
//! weak handle are gone.
//!
//! # Acquisition
//!
//! `try_read` / `try_write` are the fast path: one non-blocking attempt,
//! no timer, no error construction. `read` / `write` are the timed
//! path: a non-blocking attempt, then (depending on the policy's
//! [`LockTimeout`]) either an indefinite block or a timed wait followed
//! by the deadlock probe. The probe repeats the timed wait once before
//! failing, so that every participant of a mutual-wait cycle observes
//! its own [`LockFailed`] instead of exactly one of them.
//!
//! # Fairness
//!
//! Ordering between waiting readers and writers is inherited from
//! `parking_lot`'s raw lock (writer-preferring, eventually fair);
//! nothing is added on top. Two consecutive read guards from one
//! thread are not guaranteed to both succeed: a writer arriving
//! between them may cause the second to time out.
//!
//! # Reentrancy
//!
//! Not supported. A thread that already holds a guard on a cell and
//! acquires again on the same cell either deadlocks (`Forever`) or
//! gets a `LockFailed` (timed). Treat recursive locking as a bug.

#![allow(unsafe_code)]

use std::cell::UnsafeCell;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Weak};

use parking_lot::lock_api::{RawRwLock as RawLockOps, RawRwLockTimed};
use parking_lot::RawRwLock;

use super::error::LockFailed;
use super::traits::{CellId, CellTraits, DefaultTraits, LockTimeout};

/// The shared allocation behind a cell: policy, lock, value.
struct CellCore<T, Tr> {
    traits: Tr,
    lock: RawRwLock,
    value: UnsafeCell<T>,
}

// Safety: access to `value` is mediated by `lock`; the bounds mirror
// std::sync::RwLock<T>.
unsafe impl<T: Send, Tr: Send + Sync> Send for CellCore<T, Tr> {}
unsafe impl<T: Send + Sync, Tr: Send + Sync> Sync for CellCore<T, Tr> {}

impl<T, Tr: CellTraits> CellCore<T, Tr> {
    fn new(value: T, traits: Tr) -> Self {
        Self {
            traits,
            lock: RawRwLock::INIT,
            value: UnsafeCell::new(value),
        }
    }

    fn id(&self) -> CellId {
        CellId::new(self as *const Self as usize, std::any::type_name::<T>())
    }

    /// Timed-path shared acquisition. See the module docs for the
    /// decision tree; `timeout` is read exactly once, up front.
    fn acquire_shared(&self) -> Result<(), LockFailed> {
        let timeout = self.traits.timeout();
        if self.lock.try_lock_shared() {
            return Ok(());
        }
        match timeout {
            LockTimeout::Forever => {
                self.lock.lock_shared();
                Ok(())
            }
            LockTimeout::After(timeout) => {
                if self.lock.try_lock_shared_for(timeout) {
                    return Ok(());
                }
                // Deadlock probe: wait one more interval so a thread
                // deadlocking against this one also hits its timeout.
                let try_again = self.lock.try_lock_shared_for(timeout);
                if try_again {
                    // Safety: the probe acquisition above succeeded on
                    // this thread and has not been released.
                    unsafe { self.lock.unlock_shared() };
                }
                Err(self.traits.on_timeout(timeout, try_again))
            }
        }
    }

    /// Timed-path exclusive acquisition; same tree as `acquire_shared`.
    fn acquire_exclusive(&self) -> Result<(), LockFailed> {
        let timeout = self.traits.timeout();
        if self.lock.try_lock_exclusive() {
            return Ok(());
        }
        match timeout {
            LockTimeout::Forever => {
                self.lock.lock_exclusive();
                Ok(())
            }
            LockTimeout::After(timeout) => {
                if self.lock.try_lock_exclusive_for(timeout) {
                    return Ok(());
                }
                let try_again = self.lock.try_lock_exclusive_for(timeout);
                if try_again {
                    // Safety: see `acquire_shared`.
                    unsafe { self.lock.unlock_exclusive() };
                }
                Err(self.traits.on_timeout(timeout, try_again))
            }
        }
    }
}

/// A reference-counted handle to a lock-protected value.
///
/// The only safe access paths are [`read`](Self::read),
/// [`write`](Self::write) and their `try_` variants; each hands out a
/// guard that borrows this cell and releases the lock on drop.
/// Construction never takes the lock.
///
/// Cells compare, order, and hash by identity (the shared allocation's
/// address), so they can key maps and sets.
pub struct GuardedCell<T, Tr: CellTraits = DefaultTraits> {
    core: Arc<CellCore<T, Tr>>,
}

impl<T, Tr: CellTraits> GuardedCell<T, Tr> {
    /// Creates a cell protecting `value` with a default-initialized
    /// policy.
    #[must_use]
    pub fn new(value: T) -> Self
    where
        Tr: Default,
    {
        Self::with_traits(value, Tr::default())
    }

    /// Creates a cell protecting `value` with a pre-built policy
    /// instance.
    #[must_use]
    pub fn with_traits(value: T, traits: Tr) -> Self {
        Self {
            core: Arc::new(CellCore::new(value, traits)),
        }
    }

    /// Acquires shared access, waiting up to the policy's timeout.
    pub fn read(&self) -> Result<ReadGuard<'_, T, Tr>, LockFailed> {
        self.core.acquire_shared()?;
        Ok(ReadGuard::new(&self.core))
    }

    /// Acquires exclusive access, waiting up to the policy's timeout.
    pub fn write(&self) -> Result<WriteGuard<'_, T, Tr>, LockFailed> {
        self.core.acquire_exclusive()?;
        Ok(WriteGuard::new(&self.core))
    }

    /// Acquires shared access only if the lock is readily available.
    ///
    /// A single non-blocking attempt: no timer, no deadlock probe, no
    /// error construction. This fails much faster than `read()` with a
    /// zero timeout.
    #[must_use]
    pub fn try_read(&self) -> Option<ReadGuard<'_, T, Tr>> {
        self.core
            .lock
            .try_lock_shared()
            .then(|| ReadGuard::new(&self.core))
    }

    /// Acquires exclusive access only if the lock is readily available.
    /// See [`try_read`](Self::try_read).
    #[must_use]
    pub fn try_write(&self) -> Option<WriteGuard<'_, T, Tr>> {
        self.core
            .lock
            .try_lock_exclusive()
            .then(|| WriteGuard::new(&self.core))
    }

    /// Borrows the per-cell policy instance.
    #[must_use]
    pub fn traits(&self) -> &Tr {
        &self.core.traits
    }

    /// This cell's identity token.
    #[must_use]
    pub fn id(&self) -> CellId {
        self.core.id()
    }

    /// Creates a non-owning handle to the shared allocation.
    #[must_use]
    pub fn weak(&self) -> WeakCell<T, Tr> {
        WeakCell {
            core: Arc::downgrade(&self.core),
        }
    }

    /// A read-only projection of this cell over the same allocation.
    #[must_use]
    pub fn as_const(&self) -> ConstCell<T, Tr> {
        ConstCell {
            core: Arc::clone(&self.core),
        }
    }

    /// Raw pointer to the protected value, without locking.
    #[must_use]
    pub fn data_ptr(&self) -> *mut T {
        self.core.value.get()
    }

    /// Direct shared access without taking the lock.
    ///
    /// # Safety
    ///
    /// The caller must guarantee that no thread mutates the value for
    /// the lifetime of the returned reference (through a `WriteGuard`,
    /// [`unprotected_mut`](Self::unprotected_mut) or the raw pointer).
    #[must_use]
    pub unsafe fn unprotected(&self) -> &T {
        &*self.core.value.get()
    }

    /// Direct exclusive access without taking the lock.
    ///
    /// # Safety
    ///
    /// The caller must guarantee that no other access to the value
    /// (guarded or not, from any thread) overlaps the lifetime of the
    /// returned reference.
    #[allow(clippy::mut_from_ref)]
    #[must_use]
    pub unsafe fn unprotected_mut(&self) -> &mut T {
        &mut *self.core.value.get()
    }
}

impl<T, Tr: CellTraits> Clone for GuardedCell<T, Tr> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T, Tr: CellTraits> PartialEq for GuardedCell<T, Tr> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }
}

impl<T, Tr: CellTraits> Eq for GuardedCell<T, Tr> {}

impl<T, Tr: CellTraits> PartialOrd for GuardedCell<T, Tr> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T, Tr: CellTraits> Ord for GuardedCell<T, Tr> {
    fn cmp(&self, other: &Self) -> Ordering {
        (Arc::as_ptr(&self.core) as usize).cmp(&(Arc::as_ptr(&other.core) as usize))
    }
}

impl<T, Tr: CellTraits> Hash for GuardedCell<T, Tr> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.core) as usize).hash(state);
    }
}

impl<T, Tr: CellTraits> fmt::Debug for GuardedCell<T, Tr> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardedCell")
            .field("id", &self.id())
            .field("locked", &self.core.lock.is_locked())
            .finish_non_exhaustive()
    }
}

/// A read-only cell over the same allocation as a [`GuardedCell`].
///
/// Constructible from a mutable cell but not the reverse; only yields
/// read guards, so the absence of `write` is checked at compile time.
pub struct ConstCell<T, Tr: CellTraits = DefaultTraits> {
    core: Arc<CellCore<T, Tr>>,
}

impl<T, Tr: CellTraits> ConstCell<T, Tr> {
    /// Acquires shared access, waiting up to the policy's timeout.
    pub fn read(&self) -> Result<ReadGuard<'_, T, Tr>, LockFailed> {
        self.core.acquire_shared()?;
        Ok(ReadGuard::new(&self.core))
    }

    /// Acquires shared access only if the lock is readily available.
    #[must_use]
    pub fn try_read(&self) -> Option<ReadGuard<'_, T, Tr>> {
        self.core
            .lock
            .try_lock_shared()
            .then(|| ReadGuard::new(&self.core))
    }

    /// Borrows the per-cell policy instance.
    #[must_use]
    pub fn traits(&self) -> &Tr {
        &self.core.traits
    }

    /// This cell's identity token (shared with the originating cell).
    #[must_use]
    pub fn id(&self) -> CellId {
        self.core.id()
    }

    /// Creates a non-owning handle to the shared allocation.
    #[must_use]
    pub fn weak(&self) -> WeakConstCell<T, Tr> {
        WeakConstCell {
            core: Arc::downgrade(&self.core),
        }
    }

    /// Direct shared access without taking the lock.
    ///
    /// # Safety
    ///
    /// Same contract as [`GuardedCell::unprotected`].
    #[must_use]
    pub unsafe fn unprotected(&self) -> &T {
        &*self.core.value.get()
    }
}

impl<T, Tr: CellTraits> From<GuardedCell<T, Tr>> for ConstCell<T, Tr> {
    fn from(cell: GuardedCell<T, Tr>) -> Self {
        Self { core: cell.core }
    }
}

impl<T, Tr: CellTraits> Clone for ConstCell<T, Tr> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T, Tr: CellTraits> PartialEq for ConstCell<T, Tr> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }
}

impl<T, Tr: CellTraits> Eq for ConstCell<T, Tr> {}

impl<T, Tr: CellTraits> fmt::Debug for ConstCell<T, Tr> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstCell")
            .field("id", &self.id())
            .finish_non_exhaustive()
    }
}

/// A non-owning observer of a [`GuardedCell`].
///
/// The value, lock and policy live in one allocation, so either all of
/// them are still alive at upgrade time or none is; `upgrade` never
/// yields a cell with a missing half.
pub struct WeakCell<T, Tr: CellTraits = DefaultTraits> {
    core: Weak<CellCore<T, Tr>>,
}

impl<T, Tr: CellTraits> WeakCell<T, Tr> {
    /// Creates an empty handle that never upgrades.
    #[must_use]
    pub fn new() -> Self {
        Self { core: Weak::new() }
    }

    /// Recovers an owning cell if the allocation is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<GuardedCell<T, Tr>> {
        self.core.upgrade().map(|core| GuardedCell { core })
    }
}

impl<T, Tr: CellTraits> Default for WeakCell<T, Tr> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, Tr: CellTraits> Clone for WeakCell<T, Tr> {
    fn clone(&self) -> Self {
        Self {
            core: Weak::clone(&self.core),
        }
    }
}

/// A non-owning observer of a [`ConstCell`]. See [`WeakCell`].
pub struct WeakConstCell<T, Tr: CellTraits = DefaultTraits> {
    core: Weak<CellCore<T, Tr>>,
}

impl<T, Tr: CellTraits> WeakConstCell<T, Tr> {
    /// Creates an empty handle that never upgrades.
    #[must_use]
    pub fn new() -> Self {
        Self { core: Weak::new() }
    }

    /// Recovers a read-only cell if the allocation is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<ConstCell<T, Tr>> {
        self.core.upgrade().map(|core| ConstCell { core })
    }
}

impl<T, Tr: CellTraits> Default for WeakConstCell<T, Tr> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, Tr: CellTraits> Clone for WeakConstCell<T, Tr> {
    fn clone(&self) -> Self {
        Self {
            core: Weak::clone(&self.core),
        }
    }
}

/// Shared-access guard. Exists only while the lock is held in shared
/// mode; dereferences to `&T`.
#[must_use = "guard will be immediately released if not held"]
pub struct ReadGuard<'a, T, Tr: CellTraits> {
    core: &'a CellCore<T, Tr>,
    held: Option<Tr::Held>,
    // Guards release on the acquiring thread.
    _not_send: PhantomData<*const ()>,
}

impl<'a, T, Tr: CellTraits> ReadGuard<'a, T, Tr> {
    fn new(core: &'a CellCore<T, Tr>) -> Self {
        let mut guard = Self {
            core,
            held: None,
            _not_send: PhantomData,
        };
        // Guard first, hook second: if on_locked unwinds, the drop
        // below still releases the lock.
        guard.held = Some(core.traits.on_locked(core.id()));
        guard
    }
}

impl<T, Tr: CellTraits> Deref for ReadGuard<'_, T, Tr> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // Safety: the shared lock is held for the guard's lifetime, so
        // no exclusive access can exist concurrently.
        unsafe { &*self.core.value.get() }
    }
}

impl<T, Tr: CellTraits> Drop for ReadGuard<'_, T, Tr> {
    fn drop(&mut self) {
        if let Some(held) = self.held.take() {
            self.core.traits.on_unlocked(self.core.id(), held);
        }
        // Safety: this guard's construction acquired the shared lock
        // on this thread and nothing has released it.
        unsafe { self.core.lock.unlock_shared() };
    }
}

impl<T: fmt::Debug, Tr: CellTraits> fmt::Debug for ReadGuard<'_, T, Tr> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

/// Exclusive-access guard. Exists only while the lock is held
/// exclusively; dereferences to `&T` and `&mut T`.
#[must_use = "guard will be immediately released if not held"]
pub struct WriteGuard<'a, T, Tr: CellTraits> {
    core: &'a CellCore<T, Tr>,
    held: Option<Tr::Held>,
    _not_send: PhantomData<*const ()>,
}

impl<'a, T, Tr: CellTraits> WriteGuard<'a, T, Tr> {
    fn new(core: &'a CellCore<T, Tr>) -> Self {
        let mut guard = Self {
            core,
            held: None,
            _not_send: PhantomData,
        };
        guard.held = Some(core.traits.on_locked(core.id()));
        guard
    }
}

impl<T, Tr: CellTraits> Deref for WriteGuard<'_, T, Tr> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // Safety: the exclusive lock is held for the guard's lifetime.
        unsafe { &*self.core.value.get() }
    }
}

impl<T, Tr: CellTraits> DerefMut for WriteGuard<'_, T, Tr> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        // Safety: the exclusive lock is held, and this guard is the
        // only access path while it lives.
        unsafe { &mut *self.core.value.get() }
    }
}

impl<T, Tr: CellTraits> Drop for WriteGuard<'_, T, Tr> {
    fn drop(&mut self) {
        if let Some(held) = self.held.take() {
            self.core.traits.on_unlocked(self.core.id(), held);
        }
        // Safety: this guard's construction acquired the exclusive
        // lock on this thread and nothing has released it.
        unsafe { self.core.lock.unlock_exclusive() };
    }
}

impl<T: fmt::Debug, Tr: CellTraits> fmt::Debug for WriteGuard<'_, T, Tr> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}
