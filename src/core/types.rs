use std::collections::HashMap;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::{core::error::ScanError, utils::format::encode_extra_data};

pub type BlockNumber = u64;

/// Histogram key recorded for blocks whose fetch failed
pub const ERROR_KEY: &str = "(error)";

/// Scan status enumeration, one state machine per scan invocation
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    /// Not started yet
    Idle,
    /// Dispatcher and workers are running
    Running,
    /// Result stream closed without cancellation
    Completed,
    /// Cancellation fired before every block was processed
    Cancelled,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Idle => "idle",
            ScanStatus::Running => "running",
            ScanStatus::Completed => "completed",
            ScanStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanStatus::Completed | ScanStatus::Cancelled)
    }
}

/// Closed interval `[start, end]` of block numbers
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(try_from = "RawBlockRange")]
pub struct BlockRange {
    start: BlockNumber,
    end: BlockNumber,
}

impl BlockRange {
    pub fn new(start: BlockNumber, end: BlockNumber) -> Result<Self, ScanError> {
        if start > end {
            return Err(ScanError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> BlockNumber {
        self.start
    }

    pub fn end(&self) -> BlockNumber {
        self.end
    }

    /// Number of blocks in the range. Saturates for `[0, u64::MAX]`.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start).saturating_add(1)
    }

    pub fn contains(&self, block_number: BlockNumber) -> bool {
        (self.start..=self.end).contains(&block_number)
    }

    pub fn iter(&self) -> RangeInclusive<BlockNumber> {
        self.start..=self.end
    }
}

#[derive(Deserialize)]
struct RawBlockRange {
    start: BlockNumber,
    end: BlockNumber,
}

impl TryFrom<RawBlockRange> for BlockRange {
    type Error = ScanError;

    fn try_from(raw: RawBlockRange) -> Result<Self, Self::Error> {
        Self::new(raw.start, raw.end)
    }
}

/// Outcome of processing one block, produced by exactly one worker
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BlockResult {
    pub block_number: BlockNumber,
    pub extra_key: String,
    pub succeeded: bool,
}

impl BlockResult {
    pub fn success(block_number: BlockNumber, extra_data: &[u8]) -> Self {
        Self {
            block_number,
            extra_key: encode_extra_data(extra_data),
            succeeded: true,
        }
    }

    pub fn failure(block_number: BlockNumber) -> Self {
        Self {
            block_number,
            extra_key: ERROR_KEY.to_string(),
            succeeded: false,
        }
    }
}

/// Occurrence count per distinct extra-data key
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct Histogram {
    counts: HashMap<String, u64>,
}

impl Histogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, key: &str) {
        match self.counts.get_mut(key) {
            Some(count) => *count += 1,
            None => {
                self.counts.insert(key.to_string(), 1);
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<u64> {
        self.counts.get(key).copied()
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(key, count)| (key.as_str(), *count))
    }

    /// Entries ordered by count descending, ties broken by key
    pub fn sorted_by_count(&self) -> Vec<(&str, u64)> {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries
    }
}

impl<K: Into<String>> FromIterator<(K, u64)> for Histogram {
    fn from_iter<I: IntoIterator<Item = (K, u64)>>(iter: I) -> Self {
        Self {
            counts: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    /// Number of blocks in the requested range
    pub total_requested: u64,

    /// Number of block results aggregated (successes and failures)
    pub total_processed: u64,

    pub histogram: Histogram,
}

impl ScanResult {
    pub fn empty(range: &BlockRange) -> Self {
        Self {
            total_requested: range.len(),
            total_processed: 0,
            histogram: Histogram::new(),
        }
    }

    /// Blocks whose fetch failed
    pub fn failed(&self) -> u64 {
        self.histogram.get(ERROR_KEY).unwrap_or(0)
    }

    pub fn distinct(&self) -> usize {
        self.histogram.len()
    }

    pub fn is_complete(&self) -> bool {
        self.total_processed == self.total_requested
    }
}
