use std::sync::Arc;

use crate::{
    core::source::BlockSource,
    utils::{
        metrics::{NoopScanMetrics, ScanMetrics},
        progress::{NoopProgress, ProgressSink},
    },
};

/// Collaborators shared by the dispatcher, every worker and the aggregator
#[derive(Clone)]
pub struct ScanContext {
    pub source: Arc<dyn BlockSource>,
    pub metrics: Arc<dyn ScanMetrics>,
    pub progress: Arc<dyn ProgressSink>,
}

impl ScanContext {
    pub fn new(
        source: Arc<dyn BlockSource>,
        metrics: Arc<dyn ScanMetrics>,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            source,
            metrics,
            progress,
        }
    }

    /// Context with no-op metrics and progress
    pub fn with_source(source: Arc<dyn BlockSource>) -> Self {
        Self::new(
            source,
            Arc::new(NoopScanMetrics::new()),
            Arc::new(NoopProgress),
        )
    }
}
