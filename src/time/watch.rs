//! Scoped execution-time verification.
//!
//! An [`ExecutionTimeWatch`] measures the wall time of a scope and
//! invokes a report when the scope took longer than expected. It stays
//! silent while the thread is unwinding from a panic, so a failing
//! scope does not also complain about being slow.

use std::time::Duration;

use parking_lot::RwLock;

use super::timer::Timer;

/// Report shared by every watch that was started without its own.
pub type DefaultReport = std::sync::Arc<dyn Fn(Duration, Duration) + Send + Sync>;

static DEFAULT_REPORT: RwLock<Option<DefaultReport>> = RwLock::new(None);

/// Replaces the process-wide default report. `None` restores the
/// built-in behavior of logging through `tracing::warn!`.
pub fn set_default_report(report: Option<DefaultReport>) {
    *DEFAULT_REPORT.write() = report;
}

/// Warns when a scope takes longer than expected to execute.
///
/// Construct with [`start`](Self::start) (report through the
/// process-wide default) or [`with_report`](Self::with_report); on
/// drop, if the elapsed wall time exceeded the expected duration and
/// the thread is not panicking, the report is invoked exactly once
/// with `(expected, observed)`.
///
/// Never panic from a report; it runs inside a destructor.
///
/// ```
/// use std::time::Duration;
/// use guardcell::time::ExecutionTimeWatch;
///
/// let slow = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
/// {
///     let flag = std::sync::Arc::clone(&slow);
///     let _watch = ExecutionTimeWatch::with_report(
///         Duration::from_millis(1),
///         move |_expected, _observed| flag.store(true, std::sync::atomic::Ordering::SeqCst),
///     );
///     std::thread::sleep(Duration::from_millis(5));
/// }
/// assert!(slow.load(std::sync::atomic::Ordering::SeqCst));
/// ```
pub struct ExecutionTimeWatch {
    timer: Timer,
    expected: Duration,
    report: Option<Box<dyn FnOnce(Duration, Duration) + Send>>,
}

impl ExecutionTimeWatch {
    /// Starts a watch that reports through the process-wide default.
    #[must_use]
    pub fn start(expected: Duration) -> Self {
        Self::with_report(expected, |expected, observed| {
            let default = DEFAULT_REPORT.read().clone();
            match default {
                Some(report) => report(expected, observed),
                None => tracing::warn!(
                    expected_ms = expected.as_secs_f64() * 1e3,
                    observed_ms = observed.as_secs_f64() * 1e3,
                    "scope exceeded its expected execution time"
                ),
            }
        })
    }

    /// Starts a watch with its own report.
    #[must_use]
    pub fn with_report(
        expected: Duration,
        report: impl FnOnce(Duration, Duration) + Send + 'static,
    ) -> Self {
        Self {
            timer: Timer::new(),
            expected,
            report: Some(Box::new(report)),
        }
    }

    /// Elapsed time since the watch started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.timer.elapsed()
    }

    /// The configured expectation.
    #[must_use]
    pub fn expected(&self) -> Duration {
        self.expected
    }
}

impl std::fmt::Debug for ExecutionTimeWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionTimeWatch")
            .field("expected", &self.expected)
            .field("elapsed", &self.elapsed())
            .finish_non_exhaustive()
    }
}

impl Drop for ExecutionTimeWatch {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }
        let observed = self.timer.elapsed();
        if observed <= self.expected {
            return;
        }
        if let Some(report) = self.report.take() {
            report(self.expected, observed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn reports_when_scope_overruns() {
        let fired = Arc::new(AtomicUsize::new(0));
        {
            let fired = Arc::clone(&fired);
            let _watch =
                ExecutionTimeWatch::with_report(Duration::from_millis(1), move |expected, observed| {
                    assert_eq!(expected, Duration::from_millis(1));
                    assert!(observed >= Duration::from_millis(5));
                    fired.fetch_add(1, Ordering::SeqCst);
                });
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn silent_when_scope_is_fast() {
        let fired = Arc::new(AtomicUsize::new(0));
        {
            let fired = Arc::clone(&fired);
            let _watch = ExecutionTimeWatch::with_report(Duration::from_secs(10), move |_, _| {
                fired.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn silent_while_unwinding() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_in_thread = Arc::clone(&fired);
        let result = thread::spawn(move || {
            let _watch = ExecutionTimeWatch::with_report(Duration::ZERO, move |_, _| {
                fired_in_thread.fetch_add(1, Ordering::SeqCst);
            });
            thread::sleep(Duration::from_millis(2));
            panic!("unwind through the watch");
        })
        .join();
        assert!(result.is_err());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn default_report_can_be_replaced() {
        let fired = Arc::new(AtomicUsize::new(0));
        {
            let fired = Arc::clone(&fired);
            set_default_report(Some(Arc::new(move |_, _| {
                fired.fetch_add(1, Ordering::SeqCst);
            })));
        }

        {
            let _watch = ExecutionTimeWatch::start(Duration::from_millis(1));
            thread::sleep(Duration::from_millis(5));
        }

        set_default_report(None);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn exposes_expected_and_elapsed() {
        let watch = ExecutionTimeWatch::with_report(Duration::from_secs(1), |_, _| {});
        assert_eq!(watch.expected(), Duration::from_secs(1));
        let _ = watch.elapsed();
    }
}
