//! Batch scheduler: the `run_bot_batch` loop.
//!
//! Borrowers are processed strictly sequentially: liquidation transactions
//! from one operator share a nonce sequence, and the RPC endpoint and
//! aggregator are rate-limited shared resources. The loop's one hard
//! contract is failure isolation: an error raised for one borrower becomes
//! that borrower's `Failed` entry and the batch keeps going.

use crate::error::BotError;
use crate::evaluator::{Evaluation, Evaluator, LiquidationPlan};
use crate::executor::{ExecutionAdapter, TxOutcome};
use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use tracing::{error, info, warn};

/// Evaluation seam. Implemented by [`Evaluator`]; tests substitute doubles.
#[async_trait]
pub trait EvaluateBorrower: Send + Sync {
    async fn evaluate(&self, borrower: Address) -> Result<Evaluation, BotError>;
}

#[async_trait]
impl EvaluateBorrower for Evaluator {
    async fn evaluate(&self, borrower: Address) -> Result<Evaluation, BotError> {
        Evaluator::evaluate(self, borrower).await
    }
}

/// Execution seam. Implemented by [`ExecutionAdapter`]; tests substitute
/// doubles.
#[async_trait]
pub trait ExecuteLiquidation: Send + Sync {
    async fn execute(&self, plan: &LiquidationPlan) -> Result<TxOutcome, BotError>;
}

#[async_trait]
impl ExecuteLiquidation for ExecutionAdapter {
    async fn execute(&self, plan: &LiquidationPlan) -> Result<TxOutcome, BotError> {
        ExecutionAdapter::execute(self, plan).await
    }
}

/// Why a borrower was skipped without an execution attempt.
#[derive(Debug, Clone)]
pub enum SkipReason {
    /// Health factor at or above the threshold.
    NotEligible { health_factor: f64 },
    /// No collateral the pool would release.
    NoSeizableCollateral,
    /// No outstanding debt.
    NoRepayableDebt,
    /// Expected profit under the configured threshold. Expected outcome,
    /// logged and never alarmed.
    Unprofitable {
        collateral_token: Address,
        debt_token: Address,
        expected_profit_usd: f64,
    },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotEligible { health_factor } => {
                write!(f, "not eligible (hf {health_factor:.4})")
            }
            Self::NoSeizableCollateral => write!(f, "no seizable collateral"),
            Self::NoRepayableDebt => write!(f, "no repayable debt"),
            Self::Unprofitable {
                expected_profit_usd,
                ..
            } => write!(f, "unprofitable (expected ${expected_profit_usd:.2})"),
        }
    }
}

/// Final outcome for one borrower in one scheduler pass.
#[derive(Debug, Clone)]
pub enum BatchOutcome {
    Skipped(SkipReason),
    Liquidated { tx_hash: B256, profit_usd: f64 },
    Failed(BotError),
}

/// One processed borrower.
#[derive(Debug)]
pub struct BatchResult {
    pub borrower: Address,
    pub outcome: BatchOutcome,
}

/// Partition borrowers into consecutive chunks of `batch_size`; the last
/// chunk may be shorter. Order is preserved.
pub fn partition_batches(borrowers: &[Address], batch_size: usize) -> Vec<Vec<Address>> {
    borrowers
        .chunks(batch_size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect()
}

/// Run the full borrower list through evaluation and execution.
///
/// Returns one [`BatchResult`] per borrower, in input order, after all
/// batches complete, never a partial list. Per-borrower errors are caught
/// here and recorded; only the caller's configuration errors (raised before
/// this function) abort a run.
pub async fn run_bot_batch(
    evaluator: &dyn EvaluateBorrower,
    executor: &dyn ExecuteLiquidation,
    borrowers: &[Address],
    batch_size: usize,
) -> Vec<BatchResult> {
    let batches = partition_batches(borrowers, batch_size);
    let mut results = Vec::with_capacity(borrowers.len());

    info!(
        borrowers = borrowers.len(),
        batches = batches.len(),
        batch_size,
        "Starting batch run"
    );

    for (batch_index, batch) in batches.iter().enumerate() {
        info!(batch = batch_index, size = batch.len(), "Processing batch");

        for &borrower in batch {
            let outcome = process_borrower(evaluator, executor, borrower).await;
            log_outcome(borrower, &outcome);
            results.push(BatchResult { borrower, outcome });
        }
    }

    results
}

/// Evaluate and (when a plan survives) execute a single borrower,
/// converting every error into an outcome.
async fn process_borrower(
    evaluator: &dyn EvaluateBorrower,
    executor: &dyn ExecuteLiquidation,
    borrower: Address,
) -> BatchOutcome {
    let evaluation = match evaluator.evaluate(borrower).await {
        Ok(evaluation) => evaluation,
        Err(e) => return BatchOutcome::Failed(e),
    };

    let plan = match evaluation {
        Evaluation::NotEligible { health_factor } => {
            return BatchOutcome::Skipped(SkipReason::NotEligible { health_factor })
        }
        Evaluation::NoSeizableCollateral => {
            return BatchOutcome::Skipped(SkipReason::NoSeizableCollateral)
        }
        Evaluation::NoRepayableDebt => {
            return BatchOutcome::Skipped(SkipReason::NoRepayableDebt)
        }
        Evaluation::Unprofitable {
            collateral_token,
            debt_token,
            expected_profit_usd,
        } => {
            return BatchOutcome::Skipped(SkipReason::Unprofitable {
                collateral_token,
                debt_token,
                expected_profit_usd,
            })
        }
        Evaluation::Plan(plan) => plan,
    };

    info!(
        borrower = %borrower,
        health_factor = plan.health_factor,
        expected_profit_usd = plan.expected_profit_usd,
        "Executing liquidation plan"
    );

    match executor.execute(&plan).await {
        Ok(TxOutcome::Executed {
            tx_hash,
            profit_usd,
        }) => BatchOutcome::Liquidated {
            tx_hash,
            profit_usd,
        },
        Ok(TxOutcome::Reverted { reason }) => {
            BatchOutcome::Failed(BotError::TransactionReverted(reason))
        }
        Ok(TxOutcome::TimedOut { waited }) => {
            BatchOutcome::Failed(BotError::TransactionTimeout(waited))
        }
        Err(e) => BatchOutcome::Failed(e),
    }
}

fn log_outcome(borrower: Address, outcome: &BatchOutcome) {
    match outcome {
        BatchOutcome::Skipped(reason) => {
            info!(borrower = %borrower, reason = %reason, "Borrower skipped")
        }
        BatchOutcome::Liquidated {
            tx_hash,
            profit_usd,
        } => {
            info!(
                borrower = %borrower,
                tx_hash = %tx_hash,
                profit_usd,
                "Borrower liquidated"
            )
        }
        BatchOutcome::Failed(e) => {
            if matches!(
                e,
                BotError::TransactionReverted(_) | BotError::TransactionTimeout(_)
            ) {
                warn!(borrower = %borrower, error = %e, "Liquidation deferred to next run");
            } else {
                error!(borrower = %borrower, error = %e, "Borrower processing failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;
    use dlend_api::QuoteResponse;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn borrower(index: u8) -> Address {
        Address::repeat_byte(index)
    }

    fn test_plan(target: Address) -> LiquidationPlan {
        LiquidationPlan {
            borrower: target,
            health_factor: 0.95,
            collateral_token: borrower(0xC0),
            debt_token: borrower(0xD0),
            debt_to_cover: U256::from(75u64),
            expected_collateral: U256::from(39u64),
            quote: QuoteResponse {
                path_id: "test-path".to_string(),
                out_tokens: vec![borrower(0xD0)],
                out_amounts: vec![U256::from(78u64)],
                out_values: vec![78.0],
                gas_estimate: None,
                gas_estimate_value: None,
                net_out_value: None,
                price_impact: None,
                block_number: None,
            },
            expected_profit_usd: 2.95,
        }
    }

    /// Evaluator double: yields scripted evaluations per borrower, in call
    /// order, and counts calls.
    struct ScriptedEvaluator {
        script: Mutex<Vec<Result<Evaluation, BotError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedEvaluator {
        fn new(script: Vec<Result<Evaluation, BotError>>) -> Self {
            let mut script = script;
            script.reverse();
            Self {
                script: Mutex::new(script),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EvaluateBorrower for ScriptedEvaluator {
        async fn evaluate(&self, _borrower: Address) -> Result<Evaluation, BotError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop()
                .expect("evaluator called more times than scripted")
        }
    }

    /// Executor double: returns a fixed outcome and counts calls.
    struct FixedExecutor {
        outcome: fn() -> Result<TxOutcome, BotError>,
        calls: AtomicUsize,
    }

    impl FixedExecutor {
        fn succeeding() -> Self {
            Self {
                outcome: || {
                    Ok(TxOutcome::Executed {
                        tx_hash: B256::repeat_byte(0xEE),
                        profit_usd: 2.95,
                    })
                },
                calls: AtomicUsize::new(0),
            }
        }

        fn reverting() -> Self {
            Self {
                outcome: || {
                    Ok(TxOutcome::Reverted {
                        reason: "health factor recovered".to_string(),
                    })
                },
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ExecuteLiquidation for FixedExecutor {
        async fn execute(&self, _plan: &LiquidationPlan) -> Result<TxOutcome, BotError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.outcome)()
        }
    }

    #[test]
    fn test_partitioning() {
        let borrowers: Vec<Address> = (1..=7).map(borrower).collect();

        // ceil(7/3) = 3 batches, concatenation reproduces the input.
        let batches = partition_batches(&borrowers, 3);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 3);
        assert_eq!(batches[1].len(), 3);
        assert_eq!(batches[2].len(), 1);
        let flattened: Vec<Address> = batches.into_iter().flatten().collect();
        assert_eq!(flattened, borrowers);

        // Exact division
        assert_eq!(partition_batches(&borrowers[..6], 3).len(), 2);
        // Batch larger than the list
        assert_eq!(partition_batches(&borrowers, 100).len(), 1);
        // Empty list
        assert!(partition_batches(&[], 3).is_empty());
    }

    #[tokio::test]
    async fn test_healthy_borrower_skipped_without_execution() {
        let evaluator = ScriptedEvaluator::new(vec![Ok(Evaluation::NotEligible {
            health_factor: 1.2,
        })]);
        let executor = FixedExecutor::succeeding();

        let results = run_bot_batch(&evaluator, &executor, &[borrower(1)], 10).await;

        assert_eq!(results.len(), 1);
        assert!(matches!(
            results[0].outcome,
            BatchOutcome::Skipped(SkipReason::NotEligible { .. })
        ));
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unprofitable_plan_is_skipped_never_executed() {
        let evaluator = ScriptedEvaluator::new(vec![Ok(Evaluation::Unprofitable {
            collateral_token: borrower(0xC0),
            debt_token: borrower(0xD0),
            expected_profit_usd: 0.10,
        })]);
        let executor = FixedExecutor::succeeding();

        let results = run_bot_batch(&evaluator, &executor, &[borrower(1)], 10).await;

        match &results[0].outcome {
            BatchOutcome::Skipped(SkipReason::Unprofitable {
                collateral_token,
                debt_token,
                expected_profit_usd,
            }) => {
                assert_eq!(*collateral_token, borrower(0xC0));
                assert_eq!(*debt_token, borrower(0xD0));
                assert!((expected_profit_usd - 0.10).abs() < 1e-9);
            }
            other => panic!("expected Unprofitable skip, got {other:?}"),
        }
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_isolation_across_batch() {
        // Borrower 2 of 3 fails evaluation; 1 and 3 must still be
        // processed and reported.
        let evaluator = ScriptedEvaluator::new(vec![
            Ok(Evaluation::NotEligible { health_factor: 1.5 }),
            Err(BotError::ContractCall("getUserAccountData timed out".to_string())),
            Ok(Evaluation::Plan(test_plan(borrower(3)))),
        ]);
        let executor = FixedExecutor::succeeding();

        let borrowers = [borrower(1), borrower(2), borrower(3)];
        let results = run_bot_batch(&evaluator, &executor, &borrowers, 3).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].borrower, borrower(1));
        assert!(matches!(results[0].outcome, BatchOutcome::Skipped(_)));
        assert_eq!(results[1].borrower, borrower(2));
        assert!(matches!(
            results[1].outcome,
            BatchOutcome::Failed(BotError::ContractCall(_))
        ));
        assert_eq!(results[2].borrower, borrower(3));
        assert!(matches!(
            results[2].outcome,
            BatchOutcome::Liquidated { .. }
        ));
        assert_eq!(evaluator.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_profitable_plan_executes_and_records_liquidation() {
        // End-to-end shape of the happy path: HF 0.95 position produces a
        // positive-profit plan, execution succeeds, result records the hash.
        let evaluator = ScriptedEvaluator::new(vec![Ok(Evaluation::Plan(test_plan(borrower(9))))]);
        let executor = FixedExecutor::succeeding();

        let results = run_bot_batch(&evaluator, &executor, &[borrower(9)], 1).await;

        match &results[0].outcome {
            BatchOutcome::Liquidated {
                tx_hash,
                profit_usd,
            } => {
                assert_eq!(*tx_hash, B256::repeat_byte(0xEE));
                assert!((profit_usd - 2.95).abs() < 1e-9);
            }
            other => panic!("expected Liquidated, got {other:?}"),
        }
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reverted_execution_becomes_failed_entry() {
        let evaluator = ScriptedEvaluator::new(vec![
            Ok(Evaluation::Plan(test_plan(borrower(1)))),
            Ok(Evaluation::NotEligible { health_factor: 1.1 }),
        ]);
        let executor = FixedExecutor::reverting();

        let borrowers = [borrower(1), borrower(2)];
        let results = run_bot_batch(&evaluator, &executor, &borrowers, 1).await;

        // The revert is isolated; the second borrower still processed.
        assert!(matches!(
            results[0].outcome,
            BatchOutcome::Failed(BotError::TransactionReverted(_))
        ));
        assert!(matches!(results[1].outcome, BatchOutcome::Skipped(_)));
    }

    #[tokio::test]
    async fn test_timeout_execution_becomes_failed_entry() {
        let evaluator = ScriptedEvaluator::new(vec![Ok(Evaluation::Plan(test_plan(borrower(1))))]);
        let executor = FixedExecutor {
            outcome: || {
                Ok(TxOutcome::TimedOut {
                    waited: Duration::from_secs(60),
                })
            },
            calls: AtomicUsize::new(0),
        };

        let results = run_bot_batch(&evaluator, &executor, &[borrower(1)], 1).await;
        assert!(matches!(
            results[0].outcome,
            BatchOutcome::Failed(BotError::TransactionTimeout(_))
        ));
    }
}
