//! Bot configuration.
//!
//! Everything the pipeline needs is declared here and validated up front:
//! a bad config aborts the run before any batch work starts, while runtime
//! failures stay isolated per borrower.

use crate::error::BotError;
use alloy::primitives::Address;
use dlend_chain::FundingMode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Main configuration for a liquidation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// RPC endpoint of the target chain.
    pub rpc_url: String,

    /// Expected chain id. Guards against pointing the bot at the wrong
    /// network; the aggregator client rejects mismatched requests before
    /// any I/O.
    pub chain_id: u64,

    /// Reserve tokens scanned when assembling borrower positions.
    pub reserves: Vec<Address>,

    /// Protocol contract addresses.
    pub contracts: ContractsConfig,

    /// Aggregator client parameters.
    #[serde(default)]
    pub aggregator: AggregatorConfig,

    /// Batch scheduling parameters.
    #[serde(default)]
    pub batch: BatchConfig,

    /// Execution parameters.
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Proxy contracts for tokens that cannot be transferred directly
    /// (wrapped/rebasing assets), registered on the liquidator at startup.
    #[serde(default)]
    pub token_proxies: HashMap<Address, Address>,
}

/// Protocol contract addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractsConfig {
    /// Lending pool.
    pub pool: Address,
    /// Protocol data provider (reserve balances + configuration).
    pub data_provider: Address,
    /// Base-currency price oracle.
    pub price_oracle: Address,
    /// Wrapped native token, used to price gas in USD.
    pub wrapped_native: Address,
    /// Flash-mint-funded liquidator, if deployed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flash_mint_liquidator: Option<Address>,
    /// Flash-loan-funded liquidator, if deployed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flash_loan_liquidator: Option<Address>,
}

/// Aggregator client parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Odos API base URL.
    #[serde(default = "default_aggregator_url")]
    pub base_url: String,

    /// Router the assembled swap must target; assembled calldata pointing
    /// anywhere else is rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router: Option<Address>,

    /// Slippage tolerance passed to quote requests, in percent.
    #[serde(default = "default_slippage_pct")]
    pub slippage_tolerance_pct: f64,

    /// Per-request timeout in seconds.
    #[serde(default = "default_quote_timeout")]
    pub quote_timeout_secs: u64,

    /// Bounded retries for transient aggregator failures (5xx, timeout).
    /// Malformed responses are never retried.
    #[serde(default = "default_quote_retries")]
    pub max_quote_retries: u32,

    /// Base backoff between retries, doubled per attempt.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_aggregator_url() -> String {
    "https://api.odos.xyz".to_string()
}
fn default_slippage_pct() -> f64 {
    0.5
}
fn default_quote_timeout() -> u64 {
    10
}
fn default_quote_retries() -> u32 {
    2
}
fn default_retry_backoff_ms() -> u64 {
    250
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            base_url: default_aggregator_url(),
            router: None,
            slippage_tolerance_pct: default_slippage_pct(),
            quote_timeout_secs: default_quote_timeout(),
            max_quote_retries: default_quote_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl AggregatorConfig {
    pub fn quote_timeout(&self) -> Duration {
        Duration::from_secs(self.quote_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Batch scheduling parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Borrowers per batch chunk.
    #[serde(default = "default_batch_size")]
    pub health_factor_batch_size: usize,

    /// Positions at or above this health factor are not eligible.
    #[serde(default = "default_hf_threshold")]
    pub health_factor_threshold: f64,

    /// Minimum expected net profit in USD to execute.
    #[serde(default = "default_profit_threshold")]
    pub profitable_threshold_usd: f64,
}

fn default_batch_size() -> usize {
    10
}
fn default_hf_threshold() -> f64 {
    1.0
}
fn default_profit_threshold() -> f64 {
    1.0
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            health_factor_batch_size: default_batch_size(),
            health_factor_threshold: default_hf_threshold(),
            profitable_threshold_usd: default_profit_threshold(),
        }
    }
}

/// Execution parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Which liquidator variant funds the repayment.
    #[serde(default = "default_funding_mode")]
    pub funding_mode: FundingModeConfig,

    /// Fraction of the debt liquidatable in one call, in basis points.
    #[serde(default = "default_close_factor")]
    pub close_factor_bps: u32,

    /// Flash premium of the funding source, in basis points. Defaults per
    /// funding mode when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flash_premium_bps: Option<u32>,

    /// Gas limit budgeted per liquidation transaction.
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,

    /// Seconds to wait for transaction confirmation.
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,
}

fn default_funding_mode() -> FundingModeConfig {
    FundingModeConfig::FlashMint
}
fn default_close_factor() -> u32 {
    5000
}
fn default_gas_limit() -> u64 {
    dlend_chain::gas::LIQUIDATION_GAS_LIMIT
}
fn default_confirmation_timeout() -> u64 {
    60
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            funding_mode: default_funding_mode(),
            close_factor_bps: default_close_factor(),
            flash_premium_bps: None,
            gas_limit: default_gas_limit(),
            confirmation_timeout_secs: default_confirmation_timeout(),
        }
    }
}

impl ExecutionConfig {
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    /// Premium applied in profitability, explicit or the mode default.
    pub fn premium_bps(&self) -> u32 {
        self.flash_premium_bps
            .unwrap_or_else(|| FundingMode::from(self.funding_mode).default_premium_bps())
    }
}

/// Serde-friendly funding mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FundingModeConfig {
    FlashMint,
    FlashLoan,
}

impl From<FundingModeConfig> for FundingMode {
    fn from(mode: FundingModeConfig) -> Self {
        match mode {
            FundingModeConfig::FlashMint => FundingMode::FlashMint,
            FundingModeConfig::FlashLoan => FundingMode::FlashLoan,
        }
    }
}

impl BotConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> Result<Self, BotError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BotError::Configuration(format!("cannot read config '{path}': {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| BotError::Configuration(format!("cannot parse config '{path}': {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the path in `DLEND_BOT_CONFIG`.
    pub fn from_env() -> Result<Self, BotError> {
        let path = std::env::var("DLEND_BOT_CONFIG").map_err(|_| {
            BotError::Configuration("DLEND_BOT_CONFIG is not set and no config path given".into())
        })?;
        Self::from_file(&path)
    }

    /// The liquidator address for the configured funding mode.
    pub fn active_liquidator(&self) -> Result<Address, BotError> {
        let (slot, name) = match self.execution.funding_mode {
            FundingModeConfig::FlashMint => {
                (self.contracts.flash_mint_liquidator, "flash_mint_liquidator")
            }
            FundingModeConfig::FlashLoan => {
                (self.contracts.flash_loan_liquidator, "flash_loan_liquidator")
            }
        };
        slot.ok_or_else(|| {
            BotError::Configuration(format!(
                "funding mode {:?} selected but contracts.{name} is not set",
                self.execution.funding_mode
            ))
        })
    }

    /// Validate invariants that must hold before any batch work starts.
    pub fn validate(&self) -> Result<(), BotError> {
        if self.rpc_url.is_empty() {
            return Err(BotError::Configuration("rpc_url is empty".into()));
        }
        if self.reserves.is_empty() {
            return Err(BotError::Configuration("reserves list is empty".into()));
        }
        if self.batch.health_factor_batch_size == 0 {
            return Err(BotError::Configuration(
                "health_factor_batch_size must be at least 1".into(),
            ));
        }
        if !(0.0..=50.0).contains(&self.aggregator.slippage_tolerance_pct) {
            return Err(BotError::Configuration(format!(
                "slippage_tolerance_pct {} out of range",
                self.aggregator.slippage_tolerance_pct
            )));
        }
        if self.execution.close_factor_bps == 0 || self.execution.close_factor_bps > 10_000 {
            return Err(BotError::Configuration(format!(
                "close_factor_bps {} out of range (1..=10000)",
                self.execution.close_factor_bps
            )));
        }
        self.active_liquidator()?;
        Ok(())
    }

    /// Log the loaded configuration.
    pub fn log_config(&self) {
        tracing::info!(
            rpc = %self.rpc_url,
            chain_id = self.chain_id,
            reserves = self.reserves.len(),
            "Bot configuration loaded"
        );
        tracing::info!(
            batch_size = self.batch.health_factor_batch_size,
            hf_threshold = self.batch.health_factor_threshold,
            profit_threshold_usd = self.batch.profitable_threshold_usd,
            "Batch parameters"
        );
        tracing::info!(
            funding_mode = ?self.execution.funding_mode,
            close_factor_bps = self.execution.close_factor_bps,
            premium_bps = self.execution.premium_bps(),
            slippage_pct = self.aggregator.slippage_tolerance_pct,
            "Execution parameters"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> BotConfig {
        BotConfig {
            rpc_url: "http://localhost:8545".to_string(),
            chain_id: 146,
            contracts: ContractsConfig {
                pool: Address::repeat_byte(1),
                data_provider: Address::repeat_byte(2),
                price_oracle: Address::repeat_byte(3),
                wrapped_native: Address::repeat_byte(4),
                flash_mint_liquidator: Some(Address::repeat_byte(5)),
                flash_loan_liquidator: None,
            },
            reserves: vec![Address::repeat_byte(6)],
            aggregator: AggregatorConfig::default(),
            batch: BatchConfig::default(),
            execution: ExecutionConfig::default(),
            token_proxies: HashMap::new(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_missing_liquidator_for_mode_fails() {
        let mut config = base_config();
        config.execution.funding_mode = FundingModeConfig::FlashLoan;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, BotError::Configuration(_)));
        assert!(err.to_string().contains("flash_loan_liquidator"));
    }

    #[test]
    fn test_zero_batch_size_fails() {
        let mut config = base_config();
        config.batch.health_factor_batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_reserves_fails() {
        let mut config = base_config();
        config.reserves.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_premium_defaults_by_mode() {
        let mut config = base_config();
        assert_eq!(config.execution.premium_bps(), 0);

        config.execution.funding_mode = FundingModeConfig::FlashLoan;
        assert_eq!(config.execution.premium_bps(), 9);

        config.execution.flash_premium_bps = Some(5);
        assert_eq!(config.execution.premium_bps(), 5);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = base_config();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: BotConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.chain_id, 146);
        assert_eq!(parsed.batch.health_factor_batch_size, 10);
    }
}
