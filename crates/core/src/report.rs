//! Batch run reporting.

use crate::scheduler::{BatchOutcome, BatchResult};
use chrono::{DateTime, Utc};
use tracing::info;

/// Aggregated outcome of one scheduler pass.
#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub liquidated: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Sum of expected profit over confirmed liquidations.
    pub realized_profit_usd: f64,
}

impl BatchSummary {
    /// Aggregate per-borrower results.
    pub fn from_results(
        results: &[BatchResult],
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        let mut summary = Self {
            started_at,
            finished_at,
            total: results.len(),
            liquidated: 0,
            skipped: 0,
            failed: 0,
            realized_profit_usd: 0.0,
        };

        for result in results {
            match &result.outcome {
                BatchOutcome::Skipped(_) => summary.skipped += 1,
                BatchOutcome::Liquidated { profit_usd, .. } => {
                    summary.liquidated += 1;
                    summary.realized_profit_usd += profit_usd;
                }
                BatchOutcome::Failed(_) => summary.failed += 1,
            }
        }

        summary
    }

    /// Wall-clock duration of the pass.
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Emit the summary as a structured log line.
    pub fn log(&self) {
        info!(
            total = self.total,
            liquidated = self.liquidated,
            skipped = self.skipped,
            failed = self.failed,
            realized_profit_usd = self.realized_profit_usd,
            elapsed_ms = self.elapsed().num_milliseconds(),
            "Batch run complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BotError;
    use crate::scheduler::SkipReason;
    use alloy::primitives::{Address, B256};

    #[test]
    fn test_summary_aggregation() {
        let started = Utc::now();
        let results = vec![
            BatchResult {
                borrower: Address::repeat_byte(1),
                outcome: BatchOutcome::Skipped(SkipReason::NotEligible { health_factor: 1.3 }),
            },
            BatchResult {
                borrower: Address::repeat_byte(2),
                outcome: BatchOutcome::Liquidated {
                    tx_hash: B256::repeat_byte(0xEE),
                    profit_usd: 2.5,
                },
            },
            BatchResult {
                borrower: Address::repeat_byte(3),
                outcome: BatchOutcome::Liquidated {
                    tx_hash: B256::repeat_byte(0xEF),
                    profit_usd: 1.5,
                },
            },
            BatchResult {
                borrower: Address::repeat_byte(4),
                outcome: BatchOutcome::Failed(BotError::ContractCall("boom".to_string())),
            },
        ];

        let summary = BatchSummary::from_results(&results, started, Utc::now());
        assert_eq!(summary.total, 4);
        assert_eq!(summary.liquidated, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
        assert!((summary.realized_profit_usd - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_summary() {
        let now = Utc::now();
        let summary = BatchSummary::from_results(&[], now, now);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.realized_profit_usd, 0.0);
    }
}
