//! Thread-rendezvous primitives used to coordinate test scenarios.

mod barrier;

pub use barrier::{LockingBarrier, SpinningBarrier};
