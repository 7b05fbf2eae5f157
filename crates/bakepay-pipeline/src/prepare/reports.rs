use super::{PrepareContext, PreparePayoutsOptions, STAGE};
use crate::hooks::{run_hook, AfterPayoutsPreparedData};
use crate::reconcile::filter_recipes_by_reports;
use bakepay_core::error::{PayoutError, Result};
use bakepay_core::recipe::{only_invalid, only_valid};
use bakepay_core::report::filter_reports_by_baker;
use tracing::{debug, info};

/// Drop recipes that past reports prove paid
pub fn prepare_payouts(ctx: &mut PrepareContext, _options: &PreparePayoutsOptions) -> Result<()> {
    info!(stage = STAGE, phase = "prepare_payouts", blueprints = ctx.blueprints.len(), "preparing payouts");
    if ctx.blueprints.is_empty() {
        return Err(PayoutError::MissingPayoutBlueprint);
    }

    let reporter = ctx.engines.reporter()?;
    // a collector is optional here; without one the stored flags decide
    let collector = ctx.engines.collector().ok();
    let baker = &ctx.configuration.baker;

    let mut payouts = Vec::new();
    let mut past_reports = Vec::new();
    for blueprint in &ctx.blueprints {
        let reports = reporter
            .get_existing_reports(blueprint.cycle)
            .map_err(|e| PayoutError::ReportsLoadFailed {
                cycle: blueprint.cycle,
                message: e.to_string(),
            })?;
        let reports = filter_reports_by_baker(reports, baker);
        debug!(stage = STAGE, cycle = blueprint.cycle, reports = reports.len(), "loaded existing reports");

        // invalid recipes are matched too, they may have been paid under other conditions
        let (unpaid, paid) = filter_recipes_by_reports(blueprint.payouts.clone(), &reports, collector);
        payouts.extend(unpaid);
        past_reports.extend(paid);
    }

    let mut hook_data = AfterPayoutsPreparedData {
        recipes: ctx.blueprints.iter().flat_map(|b| b.payouts.iter().cloned()).collect(),
        valid_payouts: only_valid(&payouts),
        invalid_payouts: only_invalid(&payouts),
        reports_of_past_successful_payouts: past_reports,
    };
    run_hook(ctx.engines.extensions(), &mut hook_data)?;

    info!(
        stage = STAGE,
        valid = hook_data.valid_payouts.len(),
        invalid = hook_data.invalid_payouts.len(),
        already_paid = hook_data.reports_of_past_successful_payouts.len(),
        "payouts prepared"
    );
    ctx.stage_data.valid_payouts = hook_data.valid_payouts;
    ctx.stage_data.invalid_payouts = hook_data.invalid_payouts;
    ctx.stage_data.reports_of_past_successful_payouts = hook_data.reports_of_past_successful_payouts;
    Ok(())
}
