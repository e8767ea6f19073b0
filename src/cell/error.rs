//! The error produced when a blocking acquisition times out.

use std::fmt;
use std::time::Duration;

use crate::trace::CapturedBacktrace;

/// Error returned by `read()` / `write()` when the lock could not be
/// acquired within the traits-configured timeout.
///
/// After the first timed attempt fails, the acquiring thread blocks for
/// one more timeout interval before reporting failure. If two threads
/// are in a mutual-wait deadlock, that second interval forces every
/// participant in the cycle to also hit its timeout, so all of them
/// observe a `LockFailed` instead of exactly one. [`try_again`]
/// records whether the second attempt succeeded; the error is raised
/// either way.
///
/// [`try_again`]: LockFailed::try_again
#[derive(Debug)]
pub struct LockFailed {
    timeout: Duration,
    try_again: bool,
    backtrace: Option<CapturedBacktrace>,
}

impl LockFailed {
    /// Creates an error for an acquisition that exceeded `timeout`.
    #[must_use]
    pub fn new(timeout: Duration, try_again: bool) -> Self {
        Self {
            timeout,
            try_again,
            backtrace: None,
        }
    }

    /// Attaches a captured backtrace.
    #[must_use]
    pub fn with_backtrace(mut self, backtrace: CapturedBacktrace) -> Self {
        self.backtrace = Some(backtrace);
        self
    }

    /// The timeout value that was exceeded.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether the deadlock probe's second attempt succeeded.
    ///
    /// `true` means the lock became available during the probe: the
    /// counterpart released it (typically because it failed its own
    /// acquisition), so retrying may succeed.
    #[must_use]
    pub fn try_again(&self) -> bool {
        self.try_again
    }

    /// The backtrace attached by a traits extension, if any.
    #[must_use]
    pub fn backtrace(&self) -> Option<&CapturedBacktrace> {
        self.backtrace.as_ref()
    }
}

impl fmt::Display for LockFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lock not acquired within {:?} (try_again={})",
            self.timeout, self.try_again
        )?;
        if let Some(backtrace) = &self.backtrace {
            write!(f, "\n{backtrace}")?;
        }
        Ok(())
    }
}

impl std::error::Error for LockFailed {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carries_timeout_and_try_again() {
        let err = LockFailed::new(Duration::from_millis(10), false);
        assert_eq!(err.timeout(), Duration::from_millis(10));
        assert!(!err.try_again());
        assert!(err.backtrace().is_none());
    }

    #[test]
    fn display_names_both_fields() {
        let err = LockFailed::new(Duration::from_millis(10), true);
        let s = err.to_string();
        assert!(s.contains("10ms"));
        assert!(s.contains("try_again=true"));
    }

    #[test]
    fn backtrace_is_attached_and_rendered() {
        let err = LockFailed::new(Duration::ZERO, false)
            .with_backtrace(CapturedBacktrace::force_capture());
        assert!(err.backtrace().is_some());
        // Rendering must include the trace, not just the summary line.
        assert!(err.to_string().len() > "lock not acquired".len());
    }

    #[test]
    fn is_error() {
        let err = LockFailed::new(Duration::ZERO, false);
        let _: &dyn std::error::Error = &err;
    }
}
