//! Terminal output

use crate::statistics::CycleStatistics;
use bakepay_core::{CyclePayoutBlueprint, CyclePayoutSummary, ExecutePayoutsResult, PayoutRecipe, PreparePayoutsResult};
use std::fmt::Write;

fn recipe_row(out: &mut String, recipe: &PayoutRecipe) {
    let _ = writeln!(
        out,
        "  {:<6} {:<17} {:<37} {:>22} {:>18}  {}",
        recipe.cycle,
        recipe.kind.to_string(),
        recipe.recipient.to_string(),
        recipe.amount.to_tez_string(),
        recipe.fee.to_tez_string(),
        recipe.note
    );
}

fn recipe_header(out: &mut String) {
    let _ = writeln!(
        out,
        "  {:<6} {:<17} {:<37} {:>22} {:>18}  {}",
        "CYCLE", "KIND", "RECIPIENT", "AMOUNT", "FEE", "NOTE"
    );
}

fn summary_rows(out: &mut String, summary: &CyclePayoutSummary) {
    let _ = writeln!(out, "  delegators       {} ({} paid)", summary.delegators, summary.paid_delegators);
    let _ = writeln!(out, "  earned rewards   {}", summary.earned_rewards.to_tez_string());
    let _ = writeln!(out, "  earned fees      {}", summary.earned_fees.to_tez_string());
    let _ = writeln!(out, "  distributed      {}", summary.distributed_rewards.to_tez_string());
    let _ = writeln!(out, "  bond income      {}", summary.bond_income.to_tez_string());
    let _ = writeln!(out, "  fee income       {}", summary.fee_income.to_tez_string());
    let _ = writeln!(out, "  donated          {}", summary.donated_total.to_tez_string());
}

/// Per-cycle figures of a generated blueprint
pub fn blueprint_table(blueprint: &CyclePayoutBlueprint) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Cycle {}", blueprint.cycle);
    summary_rows(&mut out, &blueprint.summary);
    out
}

/// Aggregated figures over several cycles
pub fn statistics_table(statistics: &CycleStatistics) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", statistics.header());
    let _ = writeln!(out, "  cycles found     {}", statistics.collected_cycles.len());
    summary_rows(&mut out, &statistics.total);
    out
}

/// Outcome of a pay run: payouts per batch, then what was left out
pub fn payout_table(preparation: &PreparePayoutsResult, result: &ExecutePayoutsResult) -> String {
    let mut out = String::new();
    for (i, batch) in result.batch_results.iter().enumerate() {
        let status = match (&batch.error, batch.is_success) {
            (_, true) => "applied".to_string(),
            (Some(error), false) => format!("failed: {}", error),
            (None, false) => "failed".to_string(),
        };
        let op_hash = if batch.op_hash.is_empty() {
            "-".to_string()
        } else {
            batch.op_hash.to_string()
        };
        let _ = writeln!(out, "Batch {} | {} | {} payouts | {}", i + 1, op_hash, batch.payouts.len(), status);
        recipe_header(&mut out);
        for recipe in &batch.payouts {
            recipe_row(&mut out, recipe);
        }
    }

    if !preparation.accumulated_payouts.is_empty() {
        let _ = writeln!(out, "Accumulated into later payouts: {}", preparation.accumulated_payouts.len());
    }
    if !preparation.reports_of_past_successful_payouts.is_empty() {
        let _ = writeln!(
            out,
            "Already paid: {}",
            preparation.reports_of_past_successful_payouts.len()
        );
    }
    if !preparation.invalid_payouts.is_empty() {
        let _ = writeln!(out, "Not paid:");
        recipe_header(&mut out);
        for recipe in &preparation.invalid_payouts {
            recipe_row(&mut out, recipe);
        }
    }
    let _ = writeln!(
        out,
        "Batches: {} succeeded, {} failed | delegators paid: {}",
        result.success_count(),
        result.failed_count(),
        result.paid_delegators
    );
    out
}
