//! Backtrace capture with deferred symbolization.
//!
//! Capturing frames is cheap; resolving them to function names, files
//! and lines is not. [`CapturedBacktrace`] therefore records the raw
//! frames at the point of interest and symbolizes only when the trace
//! is actually rendered, so captures can sit on error values that are
//! usually handled without ever being printed.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;

/// An opaque handle to a captured stack trace.
///
/// Rendering through `Display` produces the human-readable multi-frame
/// trace; until then the capture stays unresolved.
pub struct CapturedBacktrace {
    inner: Backtrace,
}

impl CapturedBacktrace {
    /// Captures the current stack if backtraces are enabled in the
    /// environment (`RUST_BACKTRACE` / `RUST_LIB_BACKTRACE`), and
    /// records a disabled placeholder otherwise.
    #[must_use]
    pub fn capture() -> Self {
        Self {
            inner: Backtrace::capture(),
        }
    }

    /// Captures the current stack regardless of the environment.
    #[must_use]
    pub fn force_capture() -> Self {
        Self {
            inner: Backtrace::force_capture(),
        }
    }

    /// Whether frames were actually recorded.
    #[must_use]
    pub fn is_captured(&self) -> bool {
        self.inner.status() == BacktraceStatus::Captured
    }
}

impl fmt::Display for CapturedBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Symbolization happens here, not at capture time.
        fmt::Display::fmt(&self.inner, f)
    }
}

impl fmt::Debug for CapturedBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedBacktrace")
            .field("status", &self.inner.status())
            .finish_non_exhaustive()
    }
}
