use bakepay_core::engines::Reporter;
use bakepay_core::{CyclePayoutSummary, PayoutRecipe, PayoutReport, PayoutError, Result};
use parking_lot::Mutex;
use std::io::{self, Write};

/// Reporter printing one line per record; nothing is persisted, so every
/// cycle looks unpaid to reconciliation.
pub struct StdioReporter<W: Write + Send = io::Stdout> {
    out: Mutex<W>,
}

impl StdioReporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> StdioReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out) }
    }

    fn write_lines<I: IntoIterator<Item = String>>(&self, lines: I) -> Result<()> {
        let mut out = self.out.lock();
        for line in lines {
            writeln!(out, "{}", line).map_err(|e| PayoutError::Reporter(e.to_string()))?;
        }
        out.flush().map_err(|e| PayoutError::Reporter(e.to_string()))
    }
}

fn report_line(report: &PayoutReport) -> String {
    let status = if report.is_success { "OK" } else { "FAILED" };
    format!(
        "cycle {} | {} -> {} | {} | fee {} | {} | {}",
        report.cycle,
        report.kind,
        report.recipient,
        report.amount.to_tez_string(),
        report.fee.to_tez_string(),
        report.op_hash,
        status
    )
}

impl<W: Write + Send> Reporter for StdioReporter<W> {
    fn get_existing_reports(&self, _cycle: i64) -> Result<Vec<PayoutReport>> {
        Ok(Vec::new())
    }

    fn report_payouts(&self, reports: &[PayoutReport]) -> Result<()> {
        self.write_lines(reports.iter().map(report_line))
    }

    fn report_invalid_payouts(&self, recipes: &[PayoutRecipe]) -> Result<()> {
        self.write_lines(recipes.iter().map(|recipe| {
            format!(
                "cycle {} | {} | INVALID {}",
                recipe.cycle, recipe.recipient, recipe.note
            )
        }))
    }

    fn report_cycle_summary(&self, summary: &CyclePayoutSummary) -> Result<()> {
        self.write_lines([format!(
            "cycle {} | {} of {} delegators paid | distributed {} | income {} | donated {}",
            summary.cycle,
            summary.paid_delegators,
            summary.delegators,
            summary.distributed_rewards.to_tez_string(),
            summary.income_total.to_tez_string(),
            summary.donated_total.to_tez_string()
        )])
    }

    fn get_existing_cycle_summary(&self, _cycle: i64) -> Result<Option<CyclePayoutSummary>> {
        Ok(None)
    }
}
