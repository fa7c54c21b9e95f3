use std::time::Duration;

use thiserror::Error;

use crate::{
    core::types::{BlockNumber, ScanResult},
    utils::metrics::BlockFetchFailureReason,
};

/// Failure of a single block fetch. Never fatal to the scan.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("block {0} not found")]
    NotFound(BlockNumber),

    #[error("fetching block {block_number} timed out after {timeout:?}")]
    Timeout {
        block_number: BlockNumber,
        timeout: Duration,
    },

    #[error("rpc error fetching block {block_number}: {source}")]
    Rpc {
        block_number: BlockNumber,
        #[source]
        source: anyhow::Error,
    },

    #[error("fetch cancelled")]
    Cancelled,
}

impl FetchError {
    /// Metrics label for the failure; `None` for cancellation, which is not a failure
    pub fn failure_reason(&self) -> Option<BlockFetchFailureReason> {
        match self {
            FetchError::NotFound(_) => Some(BlockFetchFailureReason::NotFound),
            FetchError::Timeout { .. } => Some(BlockFetchFailureReason::Timeout),
            FetchError::Rpc { .. } => Some(BlockFetchFailureReason::Rpc),
            FetchError::Cancelled => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid block range: start {start} is greater than end {end}")]
    InvalidRange { start: BlockNumber, end: BlockNumber },

    #[error(
        "scan cancelled after processing {} of {} blocks",
        .partial.total_processed,
        .partial.total_requested
    )]
    Cancelled { partial: ScanResult },
}

impl ScanError {
    /// Result accumulated before cancellation, if any
    pub fn partial(&self) -> Option<&ScanResult> {
        match self {
            ScanError::Cancelled { partial } => Some(partial),
            ScanError::InvalidRange { .. } => None,
        }
    }

    pub fn into_partial(self) -> Option<ScanResult> {
        match self {
            ScanError::Cancelled { partial } => Some(partial),
            ScanError::InvalidRange { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{BlockRange, Histogram};

    #[test]
    fn failure_reasons() {
        assert!(matches!(
            FetchError::NotFound(1).failure_reason(),
            Some(BlockFetchFailureReason::NotFound)
        ));
        assert!(matches!(
            FetchError::Timeout {
                block_number: 1,
                timeout: Duration::from_secs(1)
            }
            .failure_reason(),
            Some(BlockFetchFailureReason::Timeout)
        ));
        assert!(matches!(
            FetchError::Rpc {
                block_number: 1,
                source: anyhow::anyhow!("connection reset")
            }
            .failure_reason(),
            Some(BlockFetchFailureReason::Rpc)
        ));
        assert!(FetchError::Cancelled.failure_reason().is_none());
    }

    #[test]
    fn cancelled_error_carries_partial_result() {
        let range = BlockRange::new(0, 9).unwrap();
        let partial = ScanResult {
            total_requested: range.len(),
            total_processed: 4,
            histogram: [("0x01", 4u64)].into_iter().collect::<Histogram>(),
        };
        let err = ScanError::Cancelled { partial };

        assert_eq!(
            err.to_string(),
            "scan cancelled after processing 4 of 10 blocks"
        );
        assert_eq!(err.partial().map(|p| p.total_processed), Some(4));
        assert_eq!(err.into_partial().map(|p| p.histogram.total()), Some(4));
    }

    #[test]
    fn invalid_range_has_no_partial() {
        let err = ScanError::InvalidRange { start: 5, end: 1 };
        assert!(err.partial().is_none());
        assert!(err.to_string().contains("start 5 is greater than end 1"));
    }
}
