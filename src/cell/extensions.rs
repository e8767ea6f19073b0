//! Ready-made [`CellTraits`] policies beyond the default.
//!
//! [`BacktraceTraits`] attaches a captured backtrace to every
//! [`LockFailed`], pointing at the acquisition that lost the race.
//! [`WatchedTraits`] adds a held-time watch on top: every guard starts
//! an [`ExecutionTimeWatch`] on lock and stops it on unlock, so a guard
//! held longer than the configured threshold is reported exactly once.

use std::sync::Arc;
use std::time::Duration;

use super::error::LockFailed;
use super::traits::{CellId, CellTraits, LockTimeout};
use crate::time::ExecutionTimeWatch;
use crate::trace::CapturedBacktrace;

/// Policy that captures a backtrace when acquisition times out.
///
/// ```
/// use std::time::Duration;
/// use guardcell::{BacktraceTraits, GuardedCell, LockTimeout};
///
/// let cell = GuardedCell::with_traits(
///     0u32,
///     BacktraceTraits::new(LockTimeout::After(Duration::from_millis(1))),
/// );
///
/// let _held = cell.write().unwrap();
/// // Same-thread reacquisition is a bug; here it demonstrates the
/// // diagnostic: the error carries where the failed lock came from.
/// let err = cell.write().unwrap_err();
/// assert!(err.backtrace().is_some());
/// ```
#[derive(Debug, Clone)]
pub struct BacktraceTraits {
    timeout: LockTimeout,
}

impl BacktraceTraits {
    /// Creates the policy with the given acquisition timeout.
    #[must_use]
    pub fn new(timeout: LockTimeout) -> Self {
        Self { timeout }
    }
}

impl Default for BacktraceTraits {
    fn default() -> Self {
        Self::new(LockTimeout::DEFAULT)
    }
}

impl CellTraits for BacktraceTraits {
    type Held = ();

    fn timeout(&self) -> LockTimeout {
        self.timeout
    }

    fn on_timeout(&self, timeout: Duration, try_again: bool) -> LockFailed {
        LockFailed::new(timeout, try_again).with_backtrace(CapturedBacktrace::force_capture())
    }

    fn on_locked(&self, _cell: CellId) {}
}

/// Report invoked when a guard outlived its expected hold time.
pub type HeldReport = Arc<dyn Fn(&HeldTooLong) + Send + Sync>;

/// Payload handed to a [`HeldReport`].
#[derive(Debug, Clone)]
pub struct HeldTooLong {
    /// The configured hold-time threshold.
    pub expected: Duration,
    /// How long the guard was actually held.
    pub observed: Duration,
    /// Identity of the cell whose guard overstayed.
    pub cell: CellId,
}

/// Policy that warns when a guard is held longer than expected.
///
/// Locks that are kept too long make it likely that simultaneous
/// acquisitions on other threads will time out; this policy surfaces
/// them. Without a custom report the warning goes to `tracing::warn!`.
pub struct WatchedTraits {
    timeout: LockTimeout,
    warn_after: Duration,
    report: Option<HeldReport>,
}

impl WatchedTraits {
    /// Creates the policy: acquisitions wait up to `timeout`, and a
    /// guard held longer than `warn_after` is reported on release.
    #[must_use]
    pub fn new(timeout: LockTimeout, warn_after: Duration) -> Self {
        Self {
            timeout,
            warn_after,
            report: None,
        }
    }

    /// Replaces the default `tracing` warning with a custom report.
    #[must_use]
    pub fn with_report(mut self, report: HeldReport) -> Self {
        self.report = Some(report);
        self
    }

    /// The configured hold-time threshold.
    #[must_use]
    pub fn warn_after(&self) -> Duration {
        self.warn_after
    }
}

impl Default for WatchedTraits {
    fn default() -> Self {
        Self::new(LockTimeout::DEFAULT, Duration::from_millis(50))
    }
}

impl std::fmt::Debug for WatchedTraits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchedTraits")
            .field("timeout", &self.timeout)
            .field("warn_after", &self.warn_after)
            .field("report", &self.report.as_ref().map(|_| "custom"))
            .finish()
    }
}

impl CellTraits for WatchedTraits {
    type Held = ExecutionTimeWatch;

    fn timeout(&self) -> LockTimeout {
        self.timeout
    }

    fn on_locked(&self, cell: CellId) -> ExecutionTimeWatch {
        match self.report.clone() {
            Some(report) => {
                ExecutionTimeWatch::with_report(self.warn_after, move |expected, observed| {
                    report(&HeldTooLong {
                        expected,
                        observed,
                        cell,
                    });
                })
            }
            None => ExecutionTimeWatch::with_report(self.warn_after, move |expected, observed| {
                tracing::warn!(
                    cell = %cell,
                    expected_ms = expected.as_secs_f64() * 1e3,
                    observed_ms = observed.as_secs_f64() * 1e3,
                    "guard held longer than expected"
                );
            }),
        }
    }

    fn on_unlocked(&self, _cell: CellId, held: ExecutionTimeWatch) {
        // The watch reports (at most once) as it drops here, while the
        // guard is still releasing.
        drop(held);
    }
}
