//! Borrower evaluation: health gate, liquidation sizing, profitability.
//!
//! Evaluation is a funnel. The health-factor gate runs on pool state alone;
//! only positions that pass it cost an aggregator quote, and only quoted
//! plans that clear the profit threshold reach execution.

use crate::config::BotConfig;
use crate::error::BotError;
use crate::math::{apply_fraction, collateral_for_debt};
use alloy::primitives::{Address, U256};
use dlend_api::{format_units, OdosClient, QuoteResponse};
use dlend_chain::{
    gas, usd_value, BorrowerPosition, ChainClient, LendingPool, ReserveSnapshot,
    TokenMetadataResolver,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// A fully sized, quoted, and profitable liquidation, ready to execute.
#[derive(Debug, Clone)]
pub struct LiquidationPlan {
    pub borrower: Address,
    pub health_factor: f64,
    pub collateral_token: Address,
    pub debt_token: Address,
    /// Debt repaid on the borrower's behalf, in debt base units.
    pub debt_to_cover: U256,
    /// Collateral expected to be seized, in collateral base units.
    pub expected_collateral: U256,
    /// The aggregator route selling seized collateral into the debt token.
    pub quote: QuoteResponse,
    pub expected_profit_usd: f64,
}

/// Outcome of evaluating one borrower.
#[derive(Debug, Clone)]
pub enum Evaluation {
    /// Health factor at or above the threshold; nothing to do.
    NotEligible { health_factor: f64 },
    /// Below threshold but no collateral the pool would release.
    NoSeizableCollateral,
    /// Below threshold but no outstanding debt to repay.
    NoRepayableDebt,
    /// A plan was computed but its expected profit is under the threshold.
    /// This is an economic filter, not a failure.
    Unprofitable {
        collateral_token: Address,
        debt_token: Address,
        expected_profit_usd: f64,
    },
    /// Profitable plan, ready for execution.
    Plan(LiquidationPlan),
}

/// Sizing result before any aggregator traffic.
#[derive(Debug, Clone)]
pub enum Sizing {
    NotEligible { health_factor: f64 },
    NoSeizableCollateral,
    NoRepayableDebt,
    Sized(SizedLiquidation),
}

/// Position coordinates plus the close-factor-bounded amounts.
#[derive(Debug, Clone)]
pub struct SizedLiquidation {
    pub collateral: ReserveSnapshot,
    pub debt: ReserveSnapshot,
    pub debt_to_cover: U256,
    pub expected_collateral: U256,
    /// USD value of `debt_to_cover` at the oracle price.
    pub debt_value_usd: f64,
}

/// Gate and size a liquidation from a fresh position snapshot.
///
/// Pure pool state in, no network out: a position that fails the health
/// gate here can never trigger a quote request.
pub fn size_liquidation(
    position: &BorrowerPosition,
    health_factor_threshold: f64,
    close_factor_bps: u32,
) -> Sizing {
    let health_factor = position.health_factor();
    if health_factor >= health_factor_threshold {
        return Sizing::NotEligible { health_factor };
    }

    let collateral = match position.largest_collateral() {
        Some(snapshot) => snapshot.clone(),
        None => return Sizing::NoSeizableCollateral,
    };
    let debt = match position.largest_debt() {
        Some(snapshot) => snapshot.clone(),
        None => return Sizing::NoRepayableDebt,
    };

    // Close-factor bound; never exceeds the outstanding debt.
    let mut debt_to_cover = apply_fraction(debt.amount, close_factor_bps);
    if debt_to_cover.is_zero() {
        return Sizing::NoRepayableDebt;
    }

    let mut expected_collateral = collateral_for_debt(
        debt_to_cover,
        debt.price,
        debt.decimals,
        collateral.price,
        collateral.decimals,
        collateral.liquidation_bonus_bps,
    );

    // The pool releases at most the borrower's actual collateral balance;
    // scale the repayment down to what the seizure can back.
    if expected_collateral > collateral.amount {
        debt_to_cover = debt_to_cover * collateral.amount / expected_collateral;
        expected_collateral = collateral.amount;
        if debt_to_cover.is_zero() {
            return Sizing::NoSeizableCollateral;
        }
    }

    let debt_value_usd = usd_value(debt_to_cover, debt.price, debt.decimals);

    Sizing::Sized(SizedLiquidation {
        collateral,
        debt,
        debt_to_cover,
        expected_collateral,
        debt_value_usd,
    })
}

/// Expected net profit of a liquidation in USD.
///
/// `swap_output - debt_repaid - gas - flash_premium`; the aggregator's
/// implied slippage is already inside the swap output.
pub fn expected_profit_usd(
    swap_output_usd: f64,
    debt_value_usd: f64,
    gas_cost_usd: f64,
    flash_premium_bps: u32,
) -> f64 {
    let premium = debt_value_usd * flash_premium_bps as f64 / 10_000.0;
    swap_output_usd - debt_value_usd - gas_cost_usd - premium
}

/// Evaluates borrowers against pool state and aggregator quotes.
pub struct Evaluator {
    chain: Arc<ChainClient>,
    pool: Arc<LendingPool>,
    tokens: Arc<TokenMetadataResolver>,
    odos: Arc<OdosClient>,
    config: Arc<BotConfig>,
}

impl Evaluator {
    pub fn new(
        chain: Arc<ChainClient>,
        pool: Arc<LendingPool>,
        tokens: Arc<TokenMetadataResolver>,
        odos: Arc<OdosClient>,
        config: Arc<BotConfig>,
    ) -> Self {
        Self {
            chain,
            pool,
            tokens,
            odos,
            config,
        }
    }

    /// Evaluate one borrower against fresh pool state.
    #[instrument(skip(self), fields(borrower = %borrower))]
    pub async fn evaluate(&self, borrower: Address) -> Result<Evaluation, BotError> {
        let position = self
            .pool
            .snapshot(borrower, &self.config.reserves)
            .await?;
        let health_factor = position.health_factor();

        info!(
            borrower = %borrower,
            health_factor,
            collateral_reserves = position.collaterals.len(),
            debt_reserves = position.debts.len(),
            "Borrower health factor"
        );

        let sized = match size_liquidation(
            &position,
            self.config.batch.health_factor_threshold,
            self.config.execution.close_factor_bps,
        ) {
            Sizing::NotEligible { health_factor } => {
                return Ok(Evaluation::NotEligible { health_factor })
            }
            Sizing::NoSeizableCollateral => return Ok(Evaluation::NoSeizableCollateral),
            Sizing::NoRepayableDebt => return Ok(Evaluation::NoRepayableDebt),
            Sizing::Sized(sized) => sized,
        };

        debug!(
            hf = health_factor,
            collateral = %sized.collateral.asset,
            debt = %sized.debt.asset,
            debt_to_cover = %sized.debt_to_cover,
            debt_value_usd = sized.debt_value_usd,
            "Position sized for liquidation"
        );

        let quote = self.quote_with_retry(&sized).await?;

        // The route must land in the debt token we intend to repay with.
        if quote.out_tokens.first() != Some(&sized.debt.asset) {
            return Err(BotError::Aggregator {
                message: format!(
                    "quote output token {:?} does not match debt asset {}",
                    quote.out_tokens.first(),
                    sized.debt.asset
                ),
                transient: false,
            });
        }

        let swap_output_usd = usd_value(
            quote.primary_out_amount(),
            sized.debt.price,
            sized.debt.decimals,
        );
        let gas_cost_usd = self.estimate_gas_cost_usd().await?;
        let profit = expected_profit_usd(
            swap_output_usd,
            sized.debt_value_usd,
            gas_cost_usd,
            self.config.execution.premium_bps(),
        );

        debug!(
            swap_output_usd,
            debt_value_usd = sized.debt_value_usd,
            gas_cost_usd,
            premium_bps = self.config.execution.premium_bps(),
            expected_profit_usd = profit,
            "Profitability computed"
        );

        if profit < self.config.batch.profitable_threshold_usd {
            info!(
                expected_profit_usd = profit,
                threshold_usd = self.config.batch.profitable_threshold_usd,
                "Plan below profit threshold, skipping"
            );
            return Ok(Evaluation::Unprofitable {
                collateral_token: sized.collateral.asset,
                debt_token: sized.debt.asset,
                expected_profit_usd: profit,
            });
        }

        Ok(Evaluation::Plan(LiquidationPlan {
            borrower,
            health_factor,
            collateral_token: sized.collateral.asset,
            debt_token: sized.debt.asset,
            debt_to_cover: sized.debt_to_cover,
            expected_collateral: sized.expected_collateral,
            quote,
            expected_profit_usd: profit,
        }))
    }

    /// Quote the collateral→debt swap, retrying transient aggregator
    /// failures with doubling backoff. Malformed responses and 4xx are
    /// returned immediately.
    async fn quote_with_retry(&self, sized: &SizedLiquidation) -> Result<QuoteResponse, BotError> {
        // Decimals come from the token itself, not the reserve config;
        // resolving also warms the symbol cache for logs.
        let decimals = self.tokens.decimals(sized.collateral.asset).await?;
        let amount_human = format_units(sized.expected_collateral, decimals);

        let mut attempt: u32 = 0;
        loop {
            let result = self
                .odos
                .swap_quote(
                    sized.collateral.asset,
                    sized.debt.asset,
                    &amount_human,
                    decimals,
                    self.config.aggregator.slippage_tolerance_pct,
                    self.config.chain_id,
                )
                .await;

            match result {
                Ok(quote) => return Ok(quote),
                Err(e) => {
                    let err = BotError::from(e);
                    if err.is_transient_aggregator()
                        && attempt < self.config.aggregator.max_quote_retries
                    {
                        let delay = self.config.aggregator.retry_backoff() * (1 << attempt);
                        warn!(
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "Transient aggregator failure, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    } else {
                        return Err(err);
                    }
                }
            }
        }
    }

    /// USD cost of one liquidation transaction at current gas prices.
    async fn estimate_gas_cost_usd(&self) -> Result<f64, BotError> {
        let gas_price = self.chain.gas_price().await?;
        let native_price = self
            .pool
            .asset_price(self.config.contracts.wrapped_native)
            .await?;
        let native_usd = usd_value(
            U256::from(10u64).pow(U256::from(18)),
            native_price,
            18,
        );
        Ok(gas::estimate_gas_cost_usd(
            self.config.execution.gas_limit,
            gas_price,
            native_usd,
        ))
    }
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator")
            .field("chain_id", &self.chain.chain_id())
            .field("reserves", &self.config.reserves.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::pow10;

    fn wad(value: f64) -> U256 {
        U256::from((value * 1e18) as u128)
    }

    fn reserve(asset: u8, amount_whole: u64, price_usd_cents: u64, bonus_bps: u32) -> ReserveSnapshot {
        let amount = U256::from(amount_whole) * pow10(18);
        let price = U256::from(price_usd_cents) * U256::from(1_000_000u64);
        ReserveSnapshot {
            asset: Address::repeat_byte(asset),
            amount,
            price,
            decimals: 18,
            liquidation_bonus_bps: bonus_bps,
            value_usd: usd_value(amount, price, 18),
        }
    }

    fn position(hf: f64, collaterals: Vec<ReserveSnapshot>, debts: Vec<ReserveSnapshot>) -> BorrowerPosition {
        BorrowerPosition {
            borrower: Address::repeat_byte(0xAA),
            health_factor_wad: wad(hf),
            total_collateral_base: U256::ZERO,
            total_debt_base: U256::ZERO,
            collaterals: collaterals.into_iter().collect(),
            debts: debts.into_iter().collect(),
        }
    }

    #[test]
    fn test_healthy_position_is_not_eligible() {
        // HF >= threshold must short-circuit before any sizing: the quote
        // stage is unreachable for these positions.
        let pos = position(
            1.2,
            vec![reserve(1, 100, 200, 10_500)],
            vec![reserve(2, 150, 100, 10_500)],
        );
        match size_liquidation(&pos, 1.0, 5000) {
            Sizing::NotEligible { health_factor } => {
                assert!((health_factor - 1.2).abs() < 1e-9)
            }
            other => panic!("expected NotEligible, got {other:?}"),
        }

        // Exactly at the threshold is still not eligible.
        let pos = position(1.0, vec![], vec![]);
        assert!(matches!(
            size_liquidation(&pos, 1.0, 5000),
            Sizing::NotEligible { .. }
        ));
    }

    #[test]
    fn test_unhealthy_without_reserves() {
        let pos = position(0.9, vec![], vec![reserve(2, 10, 100, 10_500)]);
        assert!(matches!(
            size_liquidation(&pos, 1.0, 5000),
            Sizing::NoSeizableCollateral
        ));

        let pos = position(0.9, vec![reserve(1, 10, 100, 10_500)], vec![]);
        assert!(matches!(
            size_liquidation(&pos, 1.0, 5000),
            Sizing::NoRepayableDebt
        ));
    }

    #[test]
    fn test_sizing_applies_close_factor_and_bonus() {
        // Spec scenario: collateral 100 @ $2.00, debt 150 @ $1.00, HF 0.95.
        let pos = position(
            0.95,
            vec![reserve(1, 100, 200, 10_500)],
            vec![reserve(2, 150, 100, 10_500)],
        );

        let sized = match size_liquidation(&pos, 1.0, 5000) {
            Sizing::Sized(sized) => sized,
            other => panic!("expected Sized, got {other:?}"),
        };

        // Half the debt: 75 tokens ($75).
        assert_eq!(sized.debt_to_cover, U256::from(75u64) * pow10(18));
        assert!((sized.debt_value_usd - 75.0).abs() < 1e-6);
        // 75 * 1.05 / 2 = 39.375 collateral tokens.
        assert_eq!(
            sized.expected_collateral,
            U256::from(39_375u64) * pow10(15)
        );
    }

    #[test]
    fn test_sizing_caps_at_collateral_balance() {
        // Tiny collateral: 1 token @ $2 against 150 debt @ $1. The seizure
        // cap must scale debt_to_cover down proportionally.
        let pos = position(
            0.5,
            vec![reserve(1, 1, 200, 10_500)],
            vec![reserve(2, 150, 100, 10_500)],
        );

        let sized = match size_liquidation(&pos, 1.0, 5000) {
            Sizing::Sized(sized) => sized,
            other => panic!("expected Sized, got {other:?}"),
        };

        assert_eq!(sized.expected_collateral, U256::from(1u64) * pow10(18));
        // debt_to_cover * 1.05 / 2 == 1 → debt_to_cover ≈ 1.9047
        let expected_cover = U256::from(75u64) * pow10(18) * pow10(18)
            / (U256::from(39_375u64) * pow10(15));
        assert_eq!(sized.debt_to_cover, expected_cover);
    }

    #[test]
    fn test_expected_profit() {
        // $78.75 swap output against $75 repaid, $0.05 gas, no premium.
        let profit = expected_profit_usd(78.75, 75.0, 0.05, 0);
        assert!((profit - 3.70).abs() < 1e-9);

        // Flash-loan premium of 9 bps on the repaid value.
        let profit = expected_profit_usd(78.75, 75.0, 0.05, 9);
        assert!((profit - (3.70 - 0.0675)).abs() < 1e-9);

        // Slippage-heavy route goes negative.
        let profit = expected_profit_usd(74.0, 75.0, 0.05, 0);
        assert!(profit < 0.0);
    }
}
