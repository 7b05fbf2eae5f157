use super::{ExecuteContext, ExecutePayoutsOptions, STAGE};
use crate::engines::PayoutEngines;
use bakepay_core::batch::{BatchResult, RecipeBatch};
use bakepay_core::enums::PayoutKind;
use bakepay_core::error::Result;
use bakepay_core::operation::{Limits, Operation};
use bakepay_core::recipe::PayoutRecipe;
use bakepay_core::report::PayoutReport;
use std::collections::{HashMap, HashSet};
use tracing::{debug, error, info, warn};

/// Per-content limits; the first content also carries the operation's
/// metadata deserialization gas
pub(crate) fn content_limits(batch: &[PayoutRecipe], metadata_gas: i64) -> Vec<Limits> {
    batch
        .iter()
        .enumerate()
        .map(|(i, payout)| {
            let op_limits = payout.op_limits.unwrap_or_default();
            let mut gas_limit = op_limits.gas_limit + op_limits.deserialization_gas_limit;
            if i == 0 {
                gas_limit += metadata_gas;
            }
            Limits {
                fee: op_limits.transaction_fee,
                gas_limit,
                storage_limit: op_limits.storage_limit,
            }
        })
        .collect()
}

fn build_operation(engines: &PayoutEngines, batch: &[PayoutRecipe], metadata_gas: i64) -> Result<Operation> {
    let signer = engines.signer()?;
    let mut op = Operation::new(signer.pkh());
    for payout in batch {
        op.inject_transfer(payout)?;
    }
    op.inject_limits(&content_limits(batch, metadata_gas))?;
    signer.sign(&mut op)?;
    Ok(op)
}

fn execute_batch(engines: &PayoutEngines, batch: RecipeBatch, metadata_gas: i64) -> BatchResult {
    let op = match build_operation(engines, &batch, metadata_gas) {
        Ok(op) => op,
        Err(e) => return BatchResult::failed(batch, e),
    };
    let dispatched = engines.transactor().and_then(|transactor| transactor.dispatch(&op));
    let op_result = match dispatched {
        Ok(op_result) => op_result,
        Err(e) => return BatchResult::failed(batch, e),
    };

    let op_hash = op_result.op_hash();
    info!(stage = STAGE, op_hash = %op_hash, payouts = batch.len(), "batch dispatched, waiting for apply");
    match op_result.wait_for_apply() {
        Ok(()) => BatchResult::success(batch, op_hash),
        Err(e) => BatchResult::failed_with_op_hash(batch, op_hash, e),
    }
}

/// Reports of a finished batch, including payouts folded into its members
pub(crate) fn batch_reports(result: &BatchResult, accumulated: &[PayoutRecipe]) -> Vec<PayoutReport> {
    let anchors: HashSet<String> = result.payouts.iter().map(|p| p.short_identifier()).collect();
    let mut reports = result.to_reports();
    reports.extend(
        accumulated
            .iter()
            .filter(|p| {
                p.accumulated_details()
                    .is_some_and(|(anchor, _)| anchors.contains(&anchor))
            })
            .map(|p| PayoutReport {
                op_hash: result.op_hash.clone(),
                is_success: result.is_success,
                ..p.to_report()
            }),
    );
    reports
}

fn is_paid_delegator(report: &PayoutReport) -> bool {
    report.is_success && report.kind.normalized() == PayoutKind::DelegatorReward
}

/// Delegators paid per cycle, counting earlier runs too
fn paid_delegators_by_cycle<'a>(reports: impl Iterator<Item = &'a PayoutReport>) -> HashMap<i64, usize> {
    let mut paid: HashMap<i64, HashSet<&'a str>> = HashMap::new();
    for report in reports.filter(|r| is_paid_delegator(r)) {
        paid.entry(report.cycle).or_default().insert(report.delegator.as_str());
    }
    paid.into_iter().map(|(cycle, delegators)| (cycle, delegators.len())).collect()
}

/// Delegators paid by this run, each counted once
fn distinct_paid_delegators<'a>(reports: impl Iterator<Item = &'a PayoutReport>) -> usize {
    reports
        .filter(|r| is_paid_delegator(r))
        .map(|r| r.delegator.as_str())
        .collect::<HashSet<_>>()
        .len()
}

fn report_run(ctx: &ExecuteContext, reports: &[PayoutReport]) {
    let Ok(reporter) = ctx.engines.reporter() else {
        return;
    };
    if let Err(e) = reporter.report_invalid_payouts(&ctx.invalid_payouts) {
        warn!(stage = STAGE, error = %e, "failed to report invalid payouts");
    }

    let paid = paid_delegators_by_cycle(
        reports
            .iter()
            .chain(ctx.stage_data.reports_of_past_successful_payouts.iter()),
    );
    for blueprint in &ctx.blueprints {
        let mut summary = blueprint.summary.clone();
        summary.paid_delegators = paid.get(&blueprint.cycle).copied().unwrap_or_default();
        if let Err(e) = reporter.report_cycle_summary(&summary) {
            warn!(stage = STAGE, cycle = blueprint.cycle, error = %e, "failed to report cycle summary");
        }
    }
}

pub fn execute_payouts(ctx: &mut ExecuteContext, options: &ExecutePayoutsOptions) -> Result<()> {
    let batches = std::mem::take(&mut ctx.stage_data.batches);
    info!(stage = STAGE, phase = "execute_payouts", batches = batches.len(), dry_run = options.dry_run, "executing payouts");
    let metadata_gas = ctx.batch_metadata_deserialization_gas_limit();
    let total = batches.len();

    let mut results = Vec::with_capacity(total);
    let mut reports = Vec::new();
    for (index, batch) in batches.into_iter().enumerate() {
        if ctx.engines.cancellation().is_cancelled() {
            warn!(stage = STAGE, remaining = total - index, "cancelled, remaining batches are not executed");
            break;
        }
        if options.dry_run {
            debug!(stage = STAGE, batch = index + 1, total, payouts = batch.len(), "dry run, batch not broadcast");
            results.push(BatchResult::dry_run(batch));
            continue;
        }

        let result = execute_batch(&ctx.engines, batch, metadata_gas);
        match &result.error {
            None => info!(stage = STAGE, batch = index + 1, total, op_hash = %result.op_hash, "batch applied"),
            Some(e) => error!(stage = STAGE, batch = index + 1, total, op_hash = %result.op_hash, error = %e, "batch failed"),
        }

        let batch_reports = batch_reports(&result, &ctx.accumulated_payouts);
        if let Err(e) = ctx.engines.reporter().and_then(|r| r.report_payouts(&batch_reports)) {
            warn!(stage = STAGE, batch = index + 1, error = %e, "failed to report batch payouts");
        }
        reports.extend(batch_reports);
        results.push(result);
    }

    let paid_delegators = if options.dry_run {
        let reports: Vec<PayoutReport> = results
            .iter()
            .flat_map(|r| batch_reports(r, &ctx.accumulated_payouts))
            .collect();
        distinct_paid_delegators(reports.iter())
    } else {
        report_run(ctx, &reports);
        distinct_paid_delegators(reports.iter())
    };

    ctx.stage_data.paid_delegators = paid_delegators;
    ctx.stage_data.batch_results = results;
    Ok(())
}
