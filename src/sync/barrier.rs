//! Barriers for N-way rendezvous.
//!
//! Both variants trip when `parties` callers have arrived; exactly one
//! caller per generation observes `true` from `wait()` (the leader).
//! [`SpinningBarrier`] busy-waits and suits short rendezvous with at
//! most one thread per core; [`LockingBarrier`] parks waiters on a
//! condition variable and suits oversubscribed hosts.

use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::{Condvar, Mutex};

/// Lock-free spinning barrier.
#[derive(Debug)]
pub struct SpinningBarrier {
    parties: u32,
    arrived: AtomicU32,
    generation: AtomicU32,
    yield_while_spinning: bool,
}

impl SpinningBarrier {
    /// Creates a barrier for `parties` threads.
    ///
    /// Spins with `yield_now` when `parties` exceeds the host's
    /// available parallelism, and spins hot otherwise.
    ///
    /// # Panics
    /// Panics if `parties == 0`.
    #[must_use]
    pub fn new(parties: u32) -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(1);
        Self::with_yield(parties, parties > cores)
    }

    /// Creates a barrier with an explicit spin strategy.
    ///
    /// # Panics
    /// Panics if `parties == 0`.
    #[must_use]
    pub fn with_yield(parties: u32, yield_while_spinning: bool) -> Self {
        assert!(parties > 0, "barrier requires at least 1 party");
        Self {
            parties,
            arrived: AtomicU32::new(0),
            generation: AtomicU32::new(0),
            yield_while_spinning,
        }
    }

    /// Number of parties required to trip the barrier.
    #[must_use]
    pub fn parties(&self) -> u32 {
        self.parties
    }

    /// Waits until all parties have arrived. Returns `true` for exactly
    /// one caller per generation.
    pub fn wait(&self) -> bool {
        let generation = self.generation.load(Ordering::Acquire);

        if self.arrived.fetch_add(1, Ordering::AcqRel) == self.parties - 1 {
            // Last to arrive: reset the count and release the rest.
            self.arrived.store(0, Ordering::Release);
            self.generation.fetch_add(1, Ordering::Release);
            return true;
        }

        // Generation counter wraps; inequality is the release signal.
        while self.generation.load(Ordering::Acquire) == generation {
            if self.yield_while_spinning {
                std::thread::yield_now();
            } else {
                std::hint::spin_loop();
            }
        }
        false
    }
}

#[derive(Debug)]
struct LockingState {
    arrived: u32,
    generation: u32,
}

/// Non-spinning barrier; waiters park on a condition variable.
#[derive(Debug)]
pub struct LockingBarrier {
    parties: u32,
    state: Mutex<LockingState>,
    released: Condvar,
}

impl LockingBarrier {
    /// Creates a barrier for `parties` threads.
    ///
    /// # Panics
    /// Panics if `parties == 0`.
    #[must_use]
    pub fn new(parties: u32) -> Self {
        assert!(parties > 0, "barrier requires at least 1 party");
        Self {
            parties,
            state: Mutex::new(LockingState {
                arrived: 0,
                generation: 0,
            }),
            released: Condvar::new(),
        }
    }

    /// Number of parties required to trip the barrier.
    #[must_use]
    pub fn parties(&self) -> u32 {
        self.parties
    }

    /// Waits until all parties have arrived. Returns `true` for exactly
    /// one caller per generation.
    pub fn wait(&self) -> bool {
        let mut state = self.state.lock();
        let generation = state.generation;
        state.arrived += 1;

        if state.arrived == self.parties {
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            self.released.notify_all();
            return true;
        }

        while state.generation == generation {
            self.released.wait(&mut state);
        }
        false
    }
}
