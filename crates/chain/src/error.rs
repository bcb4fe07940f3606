//! Chain-layer error types.

use std::time::Duration;

/// Errors from RPC interaction, contract reads, and transaction submission.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("invalid rpc url '{0}'")]
    InvalidUrl(String),

    #[error("invalid signer key: {0}")]
    InvalidKey(String),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("contract call failed: {0}")]
    ContractCall(String),

    #[error("transaction {tx_hash} reverted: {}", .reason.as_deref().unwrap_or("no reason given"))]
    TransactionReverted {
        tx_hash: String,
        reason: Option<String>,
    },

    #[error("transaction confirmation timed out after {0:?}")]
    TransactionTimeout(Duration),
}
