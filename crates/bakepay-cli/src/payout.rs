//! Prepare, execute and notify for a set of blueprints

use bakepay_core::{
    CyclePayoutBlueprint, ExecutePayoutsResult, PayoutError, PreparePayoutsResult, Result,
    RuntimeConfiguration,
};
use bakepay_pipeline::{execute_prepared_payouts, prepare_payouts_of, ExecutePayoutsOptions, PayoutEngines, PreparePayoutsOptions};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone, Debug, Default)]
pub struct PayOptions {
    pub prepare: PreparePayoutsOptions,
    pub execute: ExecutePayoutsOptions,
}

/// What a pay run did, including a failure after some batches went out
pub struct PayOutcome {
    pub preparation: PreparePayoutsResult,
    pub result: ExecutePayoutsResult,
    pub error: Option<PayoutError>,
}

impl PayOutcome {
    pub fn is_complete(&self) -> bool {
        self.error.is_none() && self.result.failed_count() == 0
    }
}

pub fn pay_blueprints(
    blueprints: Vec<CyclePayoutBlueprint>,
    configuration: Arc<RuntimeConfiguration>,
    engines: PayoutEngines,
    options: &PayOptions,
) -> Result<PayOutcome> {
    let preparation = prepare_payouts_of(blueprints, configuration.clone(), engines.clone(), &options.prepare)?;
    info!(
        valid = preparation.valid_payouts.len(),
        accumulated = preparation.accumulated_payouts.len(),
        invalid = preparation.invalid_payouts.len(),
        already_paid = preparation.reports_of_past_successful_payouts.len(),
        "Payouts prepared"
    );

    let (result, status) = execute_prepared_payouts(
        preparation.clone(),
        configuration.clone(),
        engines.clone(),
        &options.execute,
    );
    if !options.execute.dry_run && !result.batch_results.is_empty() {
        notify_summaries(&preparation.blueprints, &configuration, &engines);
    }
    Ok(PayOutcome {
        preparation,
        result,
        error: status.err(),
    })
}

/// Send the stored summary of every paid cycle to the notifier
fn notify_summaries(blueprints: &[CyclePayoutBlueprint], configuration: &RuntimeConfiguration, engines: &PayoutEngines) {
    let Some(notifier) = engines.notifier() else {
        return;
    };
    let additional = HashMap::from([("Baker".to_string(), configuration.baker.to_string())]);
    for blueprint in blueprints {
        let summary = engines
            .reporter()
            .ok()
            .and_then(|reporter| reporter.get_existing_cycle_summary(blueprint.cycle).ok().flatten())
            .unwrap_or_else(|| blueprint.summary.clone());
        if let Err(e) = notifier.payout_summary_notify(&summary, &additional) {
            warn!(cycle = blueprint.cycle, error = %e, "Payout summary notification failed");
        }
    }
}
