//! Chain connection context.
//!
//! A [`ChainClient`] is the one explicitly-passed handle to the RPC endpoint:
//! it resolves the chain id once at startup and is threaded through every
//! component that reads or writes the chain. No global connection state.

use crate::error::ChainError;
use alloy::providers::{Provider, ProviderBuilder};
use tracing::info;

/// Resolved chain connection: RPC URL plus the chain id reported by the node.
#[derive(Debug, Clone)]
pub struct ChainClient {
    rpc_url: String,
    chain_id: u64,
}

impl ChainClient {
    /// Connect to an RPC endpoint and resolve its chain id.
    ///
    /// Fails if the URL is invalid or the node is unreachable; callers
    /// treat this as a startup configuration failure.
    pub async fn connect(rpc_url: &str) -> Result<Self, ChainError> {
        let provider = ProviderBuilder::new().on_http(
            rpc_url
                .parse()
                .map_err(|_| ChainError::InvalidUrl(rpc_url.to_string()))?,
        );

        let chain_id = provider
            .get_chain_id()
            .await
            .map_err(|e| ChainError::Rpc(format!("getChainId: {e}")))?;
        let block = provider
            .get_block_number()
            .await
            .map_err(|e| ChainError::Rpc(format!("getBlockNumber: {e}")))?;

        info!(rpc = rpc_url, chain_id, block, "Chain connection verified");

        Ok(Self {
            rpc_url: rpc_url.to_string(),
            chain_id,
        })
    }

    /// Build a client without probing the endpoint. Used by tests and by
    /// callers that already know the chain id.
    pub fn with_known_chain_id(rpc_url: impl Into<String>, chain_id: u64) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            chain_id,
        }
    }

    /// The chain id reported by the node at connect time.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// The RPC URL this context talks to.
    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Current block number.
    pub async fn block_number(&self) -> Result<u64, ChainError> {
        let provider = ProviderBuilder::new().on_http(
            self.rpc_url
                .parse()
                .map_err(|_| ChainError::InvalidUrl(self.rpc_url.clone()))?,
        );
        provider
            .get_block_number()
            .await
            .map_err(|e| ChainError::Rpc(format!("getBlockNumber: {e}")))
    }

    /// Current node gas price in wei.
    pub async fn gas_price(&self) -> Result<u128, ChainError> {
        let provider = ProviderBuilder::new().on_http(
            self.rpc_url
                .parse()
                .map_err(|_| ChainError::InvalidUrl(self.rpc_url.clone()))?,
        );
        provider
            .get_gas_price()
            .await
            .map_err(|e| ChainError::Rpc(format!("gasPrice: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_chain_id_constructor() {
        let client = ChainClient::with_known_chain_id("http://localhost:8545", 146);
        assert_eq!(client.chain_id(), 146);
        assert_eq!(client.rpc_url(), "http://localhost:8545");
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_url() {
        let err = ChainClient::connect("not a url").await.unwrap_err();
        assert!(matches!(err, ChainError::InvalidUrl(_)));
    }
}
