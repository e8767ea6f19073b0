//! Diagnostic backtrace capture.

mod backtrace;

pub use backtrace::CapturedBacktrace;
