//! Shared helpers for the crate's unit tests.

use std::sync::Once;

/// Initializes a `tracing` subscriber once per test binary.
///
/// The filter defaults to `info` and can be overridden with the
/// standard `RUST_LOG` variable. Output goes through the test writer so
/// it is captured per test and shown only on failure.
pub fn init_test_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Marks the beginning of a named test phase in the log.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = $name, "test phase");
    };
}

/// Marks a test as completed in the log.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = $name, "test complete");
    };
}

/// Asserts a condition, logging the labelled expectation before
/// panicking so failures are self-describing in captured output.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $label:expr, $expected:expr, $actual:expr) => {
        if !$cond {
            tracing::error!(
                label = $label,
                expected = ?$expected,
                actual = ?$actual,
                "assertion failed"
            );
            panic!(
                "assertion failed: {} (expected {:?}, got {:?})",
                $label, $expected, $actual
            );
        }
    };
}
