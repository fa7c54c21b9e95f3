use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::core::types::ScanStatus;

/// Categorizes block fetch failures for metrics reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockFetchFailureReason {
    NotFound,
    Rpc,
    Timeout,
}

impl BlockFetchFailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockFetchFailureReason::NotFound => "not_found",
            BlockFetchFailureReason::Rpc => "rpc_error",
            BlockFetchFailureReason::Timeout => "timeout",
        }
    }
}

/// Observer of per-block and per-scan events, allowing a no-op implementation when disabled.
///
/// Workers call the fetch hooks, the aggregator calls the rest. Implementations must not
/// influence the scan.
pub trait ScanMetrics: Send + Sync {
    fn record_block_fetch_success(&self);
    fn record_block_fetch_failure(&self, reason: BlockFetchFailureReason);
    fn record_block_aggregated(&self, distinct_keys: usize);
    fn record_scan_finished(&self, duration: Duration, processed: u64, status: ScanStatus);
}

#[derive(Default)]
pub struct NoopScanMetrics;

impl NoopScanMetrics {
    pub fn new() -> Self {
        Self
    }
}

impl ScanMetrics for NoopScanMetrics {
    fn record_block_fetch_success(&self) {}

    fn record_block_fetch_failure(&self, _reason: BlockFetchFailureReason) {}

    fn record_block_aggregated(&self, _distinct_keys: usize) {}

    fn record_scan_finished(&self, _duration: Duration, _processed: u64, _status: ScanStatus) {}
}

pub struct PrometheusScanMetrics {
    chain: String,
}

impl PrometheusScanMetrics {
    pub fn new(chain: impl Into<String>) -> Self {
        Self {
            chain: chain.into(),
        }
    }
}

impl ScanMetrics for PrometheusScanMetrics {
    fn record_block_fetch_success(&self) {
        let chain = self.chain.clone();
        metrics::counter!(
            "extradata_block_fetch_success_total",
            1,
            "chain" => chain
        );
    }

    fn record_block_fetch_failure(&self, reason: BlockFetchFailureReason) {
        let chain = self.chain.clone();
        metrics::counter!(
            "extradata_block_fetch_failure_total",
            1,
            "chain" => chain,
            "reason" => reason.as_str()
        );
    }

    fn record_block_aggregated(&self, distinct_keys: usize) {
        let chain = self.chain.clone();
        metrics::counter!(
            "extradata_blocks_processed_total",
            1,
            "chain" => chain.clone()
        );
        metrics::gauge!(
            "extradata_distinct_values",
            distinct_keys as f64,
            "chain" => chain
        );
    }

    fn record_scan_finished(&self, duration: Duration, processed: u64, status: ScanStatus) {
        let chain = self.chain.clone();
        metrics::histogram!(
            "extradata_scan_duration_seconds",
            duration.as_secs_f64(),
            "chain" => chain.clone(),
            "status" => status.as_str()
        );
        metrics::gauge!(
            "extradata_scan_processed_blocks",
            processed as f64,
            "chain" => chain
        );
    }
}

/// Serve `/metrics` on `0.0.0.0:<port>`. Must be called from within a tokio runtime.
pub fn install_prometheus_exporter(port: u16) -> Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install prometheus exporter on {addr}: {e}"))
}
