//! Earning statistics over persisted cycle summaries

use bakepay_core::engines::Reporter;
use bakepay_core::{summarize_cycles, CyclePayoutSummary};
use tracing::warn;

/// Summaries found among the `cycles` cycles ending at `last_cycle`
pub struct CycleStatistics {
    pub first_cycle: i64,
    pub last_cycle: i64,
    /// Cycles that had a summary, newest first
    pub collected_cycles: Vec<i64>,
    pub total: CyclePayoutSummary,
}

impl CycleStatistics {
    pub fn header(&self) -> String {
        if self.first_cycle == self.last_cycle {
            format!("Statistics #{}", self.last_cycle)
        } else {
            format!("Statistics #{} - #{}", self.first_cycle, self.last_cycle)
        }
    }
}

pub fn collect_statistics(reporter: &dyn Reporter, last_cycle: i64, cycles: u32) -> CycleStatistics {
    let first_cycle = last_cycle - i64::from(cycles) + 1;
    let mut collected_cycles = Vec::new();
    let mut summaries = Vec::new();
    for cycle in (first_cycle..=last_cycle).rev() {
        match reporter.get_existing_cycle_summary(cycle) {
            Ok(Some(summary)) => {
                collected_cycles.push(cycle);
                summaries.push(summary);
            }
            Ok(None) => warn!(cycle, "No summary for cycle"),
            Err(e) => warn!(cycle, error = %e, "Failed to read cycle summary"),
        }
    }

    CycleStatistics {
        first_cycle,
        last_cycle,
        collected_cycles,
        total: summarize_cycles(&summaries),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bakepay_core::Mutez;
    use bakepay_engines::MemoryReporter;

    fn summary(cycle: i64, fee_income: i64) -> CyclePayoutSummary {
        CyclePayoutSummary {
            cycle,
            delegators: 4,
            paid_delegators: 3,
            fee_income: Mutez::from(fee_income),
            ..Default::default()
        }
    }

    #[test]
    fn test_statistics_skip_missing_cycles() {
        let reporter = MemoryReporter::new();
        for (cycle, fee_income) in [(97, 1_000), (99, 2_000), (100, 3_000), (101, 9_000)] {
            reporter.report_cycle_summary(&summary(cycle, fee_income)).unwrap();
        }

        let statistics = collect_statistics(&reporter, 100, 4);
        assert_eq!(statistics.header(), "Statistics #97 - #100");
        assert_eq!(statistics.collected_cycles, vec![100, 99, 97]);
        assert_eq!(statistics.total.fee_income, Mutez::new(6_000));
        assert_eq!(statistics.total.delegators, 4);
        assert_eq!(statistics.total.paid_delegators, 9);
    }

    #[test]
    fn test_single_cycle_header() {
        let statistics = collect_statistics(&MemoryReporter::new(), 42, 1);
        assert_eq!(statistics.header(), "Statistics #42");
        assert!(statistics.collected_cycles.is_empty());
        assert_eq!(statistics.total, CyclePayoutSummary::default());
    }
}
