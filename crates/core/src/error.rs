//! Bot error taxonomy.
//!
//! The split matters operationally: configuration errors abort the whole run
//! before any batch work, while everything else is caught at the scheduler
//! boundary and isolated to the borrower that raised it. An unprofitable
//! plan is not an error at all; it surfaces as a skip outcome.

use dlend_api::OdosError;
use dlend_chain::ChainError;
use std::time::Duration;

#[derive(Debug, Clone, thiserror::Error)]
pub enum BotError {
    /// Missing or invalid required configuration. Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A chain read (decimals, health factor, reserve data) failed.
    #[error("contract call error: {0}")]
    ContractCall(String),

    /// The aggregator returned a failure or a malformed response.
    #[error("aggregator error: {message}")]
    Aggregator { message: String, transient: bool },

    /// The liquidation transaction was included but reverted.
    #[error("transaction reverted: {0}")]
    TransactionReverted(String),

    /// No receipt arrived within the confirmation window.
    #[error("transaction confirmation timed out after {0:?}")]
    TransactionTimeout(Duration),
}

impl BotError {
    /// Whether this is an aggregator failure a bounded retry may clear.
    pub fn is_transient_aggregator(&self) -> bool {
        matches!(self, Self::Aggregator { transient: true, .. })
    }
}

impl From<OdosError> for BotError {
    fn from(err: OdosError) -> Self {
        match err {
            OdosError::ChainIdMismatch { .. } => Self::Configuration(err.to_string()),
            _ => Self::Aggregator {
                transient: err.is_transient(),
                message: err.to_string(),
            },
        }
    }
}

impl From<ChainError> for BotError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::InvalidUrl(_) | ChainError::InvalidKey(_) => {
                Self::Configuration(err.to_string())
            }
            ChainError::Rpc(_) | ChainError::ContractCall(_) => {
                Self::ContractCall(err.to_string())
            }
            ChainError::TransactionReverted { .. } => Self::TransactionReverted(err.to_string()),
            ChainError::TransactionTimeout(timeout) => Self::TransactionTimeout(timeout),
        }
    }
}
