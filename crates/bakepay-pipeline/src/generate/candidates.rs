use super::{GenerateContext, GeneratePayoutsOptions, STAGE};
use crate::candidates::PayoutCandidate;
use crate::hooks::{run_hook, AfterCandidatesGeneratedData};
use crate::validation::{validate, CANDIDATE_VALIDATORS};
use bakepay_core::error::Result;
use tracing::{debug, info};

/// Fetch the cycle's delegators and turn each into a validated candidate
pub fn generate_payout_candidates(ctx: &mut GenerateContext, options: &GeneratePayoutsOptions) -> Result<()> {
    info!(stage = STAGE, phase = "generate_payout_candidates", cycle = options.cycle, "generating payout candidates");
    let configuration = ctx.configuration.clone();

    let cycle_data = ctx
        .engines
        .collector()?
        .get_cycle_staking_data(&configuration.baker, options.cycle)?;
    debug!(
        stage = STAGE,
        cycle = options.cycle,
        delegators = cycle_data.delegators.len(),
        "cycle data collected"
    );

    let candidates = cycle_data
        .delegators
        .iter()
        .map(|delegator| PayoutCandidate::from_delegator(delegator, &configuration))
        .map(|candidate| validate(candidate, &configuration, CANDIDATE_VALIDATORS))
        .collect();

    let mut hook_data = AfterCandidatesGeneratedData {
        cycle: options.cycle,
        candidates,
    };
    run_hook(ctx.engines.extensions(), &mut hook_data)?;

    ctx.stage_data.cycle_data = cycle_data;
    ctx.stage_data.candidates = hook_data.candidates;
    Ok(())
}
