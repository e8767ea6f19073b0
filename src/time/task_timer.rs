//! Task-logging timer.

use std::time::Duration;

use super::timer::Timer;

/// Logs how long a labelled task took.
///
/// The start is logged at debug level when the timer is created and the
/// elapsed time at info level when it is dropped. Intermediate progress
/// can be recorded with [`checkpoint`](Self::checkpoint).
#[derive(Debug)]
pub struct TaskTimer {
    label: String,
    timer: Timer,
}

impl TaskTimer {
    /// Starts timing a task.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        tracing::debug!(task = %label, "task started");
        Self {
            label,
            timer: Timer::new(),
        }
    }

    /// Elapsed time since the task started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.timer.elapsed()
    }

    /// Logs an intermediate step with the running elapsed time.
    pub fn checkpoint(&self, note: &str) {
        tracing::debug!(
            task = %self.label,
            note,
            elapsed_ms = self.timer.elapsed().as_secs_f64() * 1e3,
            "task checkpoint"
        );
    }
}

impl Drop for TaskTimer {
    fn drop(&mut self) {
        tracing::info!(
            task = %self.label,
            elapsed_ms = self.timer.elapsed().as_secs_f64() * 1e3,
            "task finished"
        );
    }
}
