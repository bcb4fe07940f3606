//! ERC-20 token metadata resolution with a process-lifetime cache.

use crate::client::ChainClient;
use crate::error::ChainError;
use alloy::primitives::Address;
use alloy::providers::ProviderBuilder;
use alloy::sol;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

sol! {
    #[sol(rpc)]
    interface IERC20Metadata {
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
    }
}

/// Immutable metadata of a deployed token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenInfo {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
}

/// Resolves token decimals and symbols through the chain connection.
///
/// Results are cached keyed by `(chain_id, token)` and never invalidated;
/// decimals are immutable for a deployed token.
#[derive(Debug)]
pub struct TokenMetadataResolver {
    chain: Arc<ChainClient>,
    cache: DashMap<(u64, Address), TokenInfo>,
}

impl TokenMetadataResolver {
    pub fn new(chain: Arc<ChainClient>) -> Self {
        Self {
            chain,
            cache: DashMap::new(),
        }
    }

    /// Resolve metadata for a token, hitting the chain only on first use.
    pub async fn resolve(&self, token: Address) -> Result<TokenInfo, ChainError> {
        let key = (self.chain.chain_id(), token);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached.clone());
        }

        let provider = ProviderBuilder::new().on_http(
            self.chain
                .rpc_url()
                .parse()
                .map_err(|_| ChainError::InvalidUrl(self.chain.rpc_url().to_string()))?,
        );
        let contract = IERC20Metadata::new(token, &provider);

        let decimals_call = contract.decimals();
        let symbol_call = contract.symbol();
        let (decimals, symbol) = tokio::join!(decimals_call.call(), symbol_call.call());

        let decimals = decimals
            .map_err(|e| ChainError::ContractCall(format!("decimals() on {token}: {e}")))?
            ._0;
        let symbol = symbol
            .map_err(|e| ChainError::ContractCall(format!("symbol() on {token}: {e}")))?
            ._0;

        let info = TokenInfo {
            address: token,
            symbol,
            decimals,
        };

        debug!(token = %token, symbol = %info.symbol, decimals, "Token metadata resolved");
        self.cache.insert(key, info.clone());
        Ok(info)
    }

    /// Resolve only the decimals of a token.
    pub async fn decimals(&self, token: Address) -> Result<u8, ChainError> {
        Ok(self.resolve(token).await?.decimals)
    }

    /// Look up cached metadata without touching the chain.
    pub fn cached(&self, token: Address) -> Option<TokenInfo> {
        self.cache
            .get(&(self.chain.chain_id(), token))
            .map(|entry| entry.clone())
    }

    /// Number of cached tokens.
    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_starts_empty() {
        let chain = Arc::new(ChainClient::with_known_chain_id("http://localhost:8545", 146));
        let resolver = TokenMetadataResolver::new(chain);
        assert_eq!(resolver.cache_size(), 0);
        assert!(resolver.cached(Address::ZERO).is_none());
    }

    #[test]
    fn test_cache_is_keyed_by_chain() {
        // Two resolvers on different chains never see each other's entries.
        let token = Address::repeat_byte(7);
        let chain_a = Arc::new(ChainClient::with_known_chain_id("http://localhost:8545", 1));
        let resolver_a = TokenMetadataResolver::new(chain_a);
        resolver_a.cache.insert(
            (1, token),
            TokenInfo {
                address: token,
                symbol: "TKN".to_string(),
                decimals: 18,
            },
        );

        assert!(resolver_a.cached(token).is_some());

        let chain_b = Arc::new(ChainClient::with_known_chain_id("http://localhost:8545", 146));
        let resolver_b = TokenMetadataResolver::new(chain_b);
        assert!(resolver_b.cached(token).is_none());
    }
}
