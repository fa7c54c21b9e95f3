use std::{sync::Arc, time::Duration};

use alloy::{
    providers::{Provider, ProviderBuilder, RootProvider},
    transports::http::{Client, Http},
};
use anyhow::Result;
use async_trait::async_trait;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::{
    error::FetchError,
    source::{BlockSource, FetchedBlock},
    types::BlockNumber,
};

/// JSON-RPC block source. The underlying HTTP client pools connections, so one
/// instance can serve every worker.
pub struct EvmClient {
    pub provider: Arc<RootProvider<Http<Client>>>,
    request_timeout: Duration,
}

impl EvmClient {
    pub fn new(rpc_url: &str, request_timeout: Duration) -> Result<Self> {
        let provider = Arc::new(ProviderBuilder::new().on_http(rpc_url.parse()?));
        Ok(Self {
            provider,
            request_timeout,
        })
    }

    pub async fn get_latest_block_number(&self) -> Result<u64> {
        let latest_block_number = timeout(self.request_timeout, self.provider.get_block_number())
            .await
            .map_err(|_| {
                anyhow::anyhow!(
                    "eth_blockNumber timed out after {:?}",
                    self.request_timeout
                )
            })??;
        Ok(latest_block_number)
    }
}

#[async_trait]
impl BlockSource for EvmClient {
    async fn fetch_block(
        &self,
        cancel: &CancellationToken,
        block_number: BlockNumber,
    ) -> Result<FetchedBlock, FetchError> {
        // Header only, transactions are not hydrated
        let request = self
            .provider
            .get_block_by_number(block_number.into(), false);

        let response = tokio::select! {
            biased;

            _ = cancel.cancelled() => return Err(FetchError::Cancelled),

            response = timeout(self.request_timeout, request) => response,
        };

        let block = match response {
            Err(_) => {
                return Err(FetchError::Timeout {
                    block_number,
                    timeout: self.request_timeout,
                });
            }
            Ok(Err(e)) => {
                return Err(FetchError::Rpc {
                    block_number,
                    source: e.into(),
                });
            }
            Ok(Ok(None)) => return Err(FetchError::NotFound(block_number)),
            Ok(Ok(Some(block))) => block,
        };

        let extra_data = block.header.extra_data.to_vec();
        debug!(
            block = block_number,
            bytes = extra_data.len(),
            "🖨️ Fetched block extra-data"
        );

        Ok(FetchedBlock {
            number: block_number,
            extra_data,
        })
    }
}
