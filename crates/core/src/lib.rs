//! dLEND liquidation bot core logic.
//!
//! This crate provides the decision and execution pipeline:
//! - Error taxonomy (fatal configuration vs isolated per-borrower failures)
//! - Bot configuration with startup validation
//! - Fixed-point sizing math (close factor, liquidation bonus, slippage)
//! - Borrower evaluation (health gate, sizing, aggregator quote, profit)
//! - Liquidation execution adapter over the flash liquidator contracts
//! - The sequential batch scheduler and its result reporting

pub mod config;
mod error;
mod evaluator;
mod executor;
pub mod math;
mod report;
mod scheduler;

pub use config::{
    AggregatorConfig, BatchConfig, BotConfig, ContractsConfig, ExecutionConfig, FundingModeConfig,
};
pub use error::BotError;
pub use evaluator::{
    expected_profit_usd, size_liquidation, Evaluation, Evaluator, LiquidationPlan,
    SizedLiquidation, Sizing,
};
pub use executor::{ExecutionAdapter, TxOutcome};
pub use report::BatchSummary;
pub use scheduler::{
    partition_batches, run_bot_batch, BatchOutcome, BatchResult, EvaluateBorrower,
    ExecuteLiquidation, SkipReason,
};
