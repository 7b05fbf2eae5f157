use super::{recipes_by_cycle, reports_by_cycle};
use bakepay_core::engines::Reporter;
use bakepay_core::{CyclePayoutSummary, PayoutRecipe, PayoutReport, Result};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Clone, Debug, Default)]
struct CycleRecords {
    payouts: Vec<PayoutReport>,
    invalid: Vec<PayoutRecipe>,
    summary: Option<CyclePayoutSummary>,
}

/// Reporter keeping every record in memory
pub struct MemoryReporter {
    cycles: RwLock<HashMap<i64, CycleRecords>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self {
            cycles: RwLock::new(HashMap::new()),
        }
    }

    pub fn invalid_payouts(&self, cycle: i64) -> Vec<PayoutRecipe> {
        self.cycles
            .read()
            .get(&cycle)
            .map(|records| records.invalid.clone())
            .unwrap_or_default()
    }

    /// Cycles with at least one record
    pub fn cycles(&self) -> Vec<i64> {
        let mut cycles: Vec<i64> = self.cycles.read().keys().copied().collect();
        cycles.sort_unstable();
        cycles
    }
}

impl Default for MemoryReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for MemoryReporter {
    fn get_existing_reports(&self, cycle: i64) -> Result<Vec<PayoutReport>> {
        Ok(self
            .cycles
            .read()
            .get(&cycle)
            .map(|records| records.payouts.clone())
            .unwrap_or_default())
    }

    fn report_payouts(&self, reports: &[PayoutReport]) -> Result<()> {
        let mut cycles = self.cycles.write();
        for (cycle, reports) in reports_by_cycle(reports) {
            cycles.entry(cycle).or_default().payouts.extend(reports);
        }
        Ok(())
    }

    fn report_invalid_payouts(&self, recipes: &[PayoutRecipe]) -> Result<()> {
        let mut cycles = self.cycles.write();
        for (cycle, recipes) in recipes_by_cycle(recipes) {
            cycles.entry(cycle).or_default().invalid.extend(recipes);
        }
        Ok(())
    }

    fn report_cycle_summary(&self, summary: &CyclePayoutSummary) -> Result<()> {
        self.cycles.write().entry(summary.cycle).or_default().summary = Some(summary.clone());
        Ok(())
    }

    fn get_existing_cycle_summary(&self, cycle: i64) -> Result<Option<CyclePayoutSummary>> {
        Ok(self.cycles.read().get(&cycle).and_then(|records| records.summary.clone()))
    }
}
