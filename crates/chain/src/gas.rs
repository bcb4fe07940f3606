//! Gas price queries and USD cost estimation.

use crate::error::ChainError;
use alloy::providers::{Provider, ProviderBuilder};

/// Gas limit budgeted for a flash liquidation with an aggregator swap.
pub const LIQUIDATION_GAS_LIMIT: u64 = 1_600_000;

/// Fetch the node's current gas price in wei.
pub async fn fetch_gas_price(rpc_url: &str) -> Result<u128, ChainError> {
    let provider = ProviderBuilder::new().on_http(
        rpc_url
            .parse()
            .map_err(|_| ChainError::InvalidUrl(rpc_url.to_string()))?,
    );
    provider
        .get_gas_price()
        .await
        .map_err(|e| ChainError::Rpc(format!("gasPrice: {e}")))
}

/// Estimated USD cost of a transaction: `gas_limit * gas_price` converted
/// through the native token's USD price.
pub fn estimate_gas_cost_usd(gas_limit: u64, gas_price_wei: u128, native_price_usd: f64) -> f64 {
    let gas_wei = gas_limit as u128 * gas_price_wei;
    (gas_wei as f64 / 1e18) * native_price_usd
}
