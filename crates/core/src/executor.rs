//! Liquidation execution adapter.
//!
//! Turns a profitable plan into an on-chain transaction: assembles the
//! aggregator route into executable calldata, submits through the
//! configured liquidator contract, and classifies the result. A reverted or
//! timed-out transaction is reported, never retried in the same pass; the
//! position gets re-evaluated with fresh state on the next run.

use crate::error::BotError;
use crate::evaluator::LiquidationPlan;
use alloy::primitives::{Address, B256};
use dlend_api::OdosClient;
use dlend_chain::{ChainError, LiquidatorContract};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Classified result of an execution attempt.
#[derive(Debug, Clone)]
pub enum TxOutcome {
    /// Confirmed on-chain.
    Executed { tx_hash: B256, profit_usd: f64 },
    /// Included but reverted: health factor moved, slippage exceeded, or
    /// pool liquidity drained between quote and inclusion.
    Reverted { reason: String },
    /// No receipt within the confirmation window.
    TimedOut { waited: Duration },
}

/// Submits liquidation plans through a liquidator contract.
#[derive(Debug)]
pub struct ExecutionAdapter {
    odos: Arc<OdosClient>,
    contract: LiquidatorContract,
    /// When set, assembled calldata must target exactly this router.
    expected_router: Option<Address>,
}

impl ExecutionAdapter {
    pub fn new(odos: Arc<OdosClient>, contract: LiquidatorContract) -> Self {
        Self {
            odos,
            contract,
            expected_router: None,
        }
    }

    /// Require assembled swaps to target the configured router address.
    pub fn with_expected_router(mut self, router: Address) -> Self {
        self.expected_router = Some(router);
        self
    }

    /// The wrapped liquidator contract.
    pub fn contract(&self) -> &LiquidatorContract {
        &self.contract
    }

    /// Execute a plan and classify the outcome.
    #[instrument(skip(self, plan), fields(borrower = %plan.borrower))]
    pub async fn execute(&self, plan: &LiquidationPlan) -> Result<TxOutcome, BotError> {
        // Assemble the quoted route into calldata executable by the
        // liquidator contract itself.
        let swap = self
            .odos
            .assemble(&plan.quote.path_id, self.contract.address())
            .await
            .map_err(BotError::from)?;

        if let Some(router) = self.expected_router {
            if swap.router != router {
                return Err(BotError::Aggregator {
                    message: format!(
                        "assembled swap targets {} but configured router is {}",
                        swap.router, router
                    ),
                    transient: false,
                });
            }
        }

        info!(
            collateral = %plan.collateral_token,
            debt = %plan.debt_token,
            debt_to_cover = %plan.debt_to_cover,
            expected_profit_usd = plan.expected_profit_usd,
            mode = self.contract.mode().as_str(),
            "Executing liquidation"
        );

        let result = self
            .contract
            .execute_liquidation(
                plan.borrower,
                plan.collateral_token,
                plan.debt_token,
                plan.debt_to_cover,
                swap.router,
                swap.calldata,
            )
            .await;

        match result {
            Ok(confirmation) => Ok(TxOutcome::Executed {
                tx_hash: confirmation.tx_hash,
                profit_usd: plan.expected_profit_usd,
            }),
            Err(ChainError::TransactionReverted { tx_hash, reason }) => {
                let reason =
                    reason.unwrap_or_else(|| format!("reverted without reason ({tx_hash})"));
                warn!(reason = %reason, "Liquidation reverted");
                Ok(TxOutcome::Reverted { reason })
            }
            Err(ChainError::TransactionTimeout(waited)) => {
                warn!(waited_secs = waited.as_secs(), "Liquidation confirmation timed out");
                Ok(TxOutcome::TimedOut { waited })
            }
            Err(e) => Err(e.into()),
        }
    }
}
