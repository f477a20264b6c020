//! Fire-and-forget progress notifications from a report run.

use tracing::info;

/// Receives `(message, percent complete)` updates. Percent is in `0..=100`.
pub trait ProgressSink: Send + Sync {
    fn set_progress(&self, message: &str, percent: f64);
}

impl<F> ProgressSink for F
where
    F: Fn(&str, f64) + Send + Sync,
{
    fn set_progress(&self, message: &str, percent: f64) {
        self(message, percent)
    }
}

/// Forwards progress to the `tracing` subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn set_progress(&self, message: &str, percent: f64) {
        info!(percent = format_args!("{percent:.0}"), "{message}");
    }
}
