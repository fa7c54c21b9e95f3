use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::{error::FetchError, types::BlockNumber};

/// Header fields the scanner reads from a fetched block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedBlock {
    pub number: BlockNumber,
    pub extra_data: Vec<u8>,
}

/// Read-only access to blocks by number.
///
/// Implementations are shared by every worker and must tolerate concurrent calls.
/// They should return `FetchError::Cancelled` promptly once `cancel` fires.
#[async_trait]
pub trait BlockSource: Send + Sync {
    async fn fetch_block(
        &self,
        cancel: &CancellationToken,
        block_number: BlockNumber,
    ) -> Result<FetchedBlock, FetchError>;
}
