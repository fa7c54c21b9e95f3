use std::sync::atomic::{AtomicU64, Ordering};

use tracing::info;

use crate::core::types::ScanStatus;

/// Receives progress notifications from the aggregator. Purely an observer.
pub trait ProgressSink: Send + Sync {
    /// Called once before any result is aggregated
    fn start(&self, _total: u64) {}

    /// Called with the number of newly aggregated results
    fn increment(&self, delta: u64);

    /// Called on every scan state transition
    fn status(&self, _status: ScanStatus) {}
}

#[derive(Default)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn increment(&self, _delta: u64) {}
}

/// Logs scan progress each time another percent of the range has been processed
#[derive(Default)]
pub struct LogProgress {
    total: AtomicU64,
    step: AtomicU64,
    processed: AtomicU64,
}

impl LogProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    fn step_for(total: u64) -> u64 {
        (total / 100).max(1)
    }
}

impl ProgressSink for LogProgress {
    fn start(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
        self.step.store(Self::step_for(total), Ordering::Relaxed);
        self.processed.store(0, Ordering::Relaxed);
    }

    fn increment(&self, delta: u64) {
        let before = self.processed.fetch_add(delta, Ordering::Relaxed);
        let after = before + delta;
        let step = self.step.load(Ordering::Relaxed).max(1);
        if before / step == after / step {
            return;
        }

        let total = self.total.load(Ordering::Relaxed);
        let percent = if total == 0 {
            100.0
        } else {
            after as f64 / total as f64 * 100.0
        };
        info!(processed = after, total, "⏳ Processing blocks {:.0}%", percent);
    }

    fn status(&self, status: ScanStatus) {
        if status.is_terminal() {
            info!(
                processed = self.processed(),
                total = self.total.load(Ordering::Relaxed),
                "📊 Scan {}",
                status.as_str()
            );
        }
    }
}
