//! dLEND chain interaction layer.
//!
//! This crate provides:
//! - An explicitly-passed chain connection context ([`ChainClient`])
//! - ERC-20 token metadata resolution with a process-lifetime cache
//! - Lending pool reads: account health, reserve balances, oracle prices
//! - Flash-mint / flash-loan liquidator contract bindings
//! - Transaction signing and sending with cached nonce management
//! - Gas price queries and USD cost estimation

mod client;
mod error;
pub mod gas;
mod liquidator;
mod pool;
mod sender;
mod tokens;

pub use client::ChainClient;
pub use error::ChainError;
pub use liquidator::{FundingMode, LiquidatorContract};
pub use pool::{
    usd_value, AccountData, BorrowerPosition, LendingPool, ReserveConfig, ReserveSnapshot,
    PRICE_DECIMALS,
};
pub use sender::{NonceManager, TransactionSender, TxConfirmation};
pub use tokens::{TokenInfo, TokenMetadataResolver};
