use super::{GenerateContext, GeneratePayoutsOptions, STAGE};
use crate::candidates::PayoutCandidateSimulated;
use crate::validation::{validate, SIMULATED_VALIDATORS};
use bakepay_core::config::RuntimeConfiguration;
use bakepay_core::error::Result;
use bakepay_core::money::Mutez;
use tracing::{debug, info};

/// Amount the baker keeps when `candidate` is not paid: its bonds plus the
/// costs that were charged for a transfer that will not happen
fn forfeit(candidate: &mut PayoutCandidateSimulated) -> Mutez {
    let limits = candidate.simulation_result.unwrap_or_default();
    let mut amount = candidate.bonds_amount;
    if candidate.tx_fee_collected {
        amount = amount.add_i64(limits.fees_without_allocation());
        candidate.tx_fee_collected = false;
    }
    if candidate.allocation_fee_collected {
        amount = amount.add_i64(limits.allocation_fee());
        candidate.allocation_fee_collected = false;
    }
    let amount = amount.max(Mutez::ZERO);
    candidate.fee += amount;
    candidate.bonds_amount = Mutez::ZERO;
    amount
}

/// Validate the net amounts; returns what newly invalid candidates forfeit
pub(crate) fn validate_simulated(
    candidates: Vec<PayoutCandidateSimulated>,
    configuration: &RuntimeConfiguration,
) -> (Vec<PayoutCandidateSimulated>, Mutez) {
    let mut forfeited = Mutez::ZERO;
    let candidates = candidates
        .into_iter()
        .map(|candidate| {
            if candidate.is_invalid() {
                return candidate;
            }
            let mut validated = validate(candidate, configuration, SIMULATED_VALIDATORS);
            if validated.is_invalid() {
                let amount = forfeit(&mut validated);
                debug!(stage = STAGE, delegator = %validated.source, amount = %amount, "payout below minimum, amount goes to baker");
                forfeited += amount;
            }
            validated
        })
        .collect();
    (candidates, forfeited)
}

pub fn validate_simulated_payouts(ctx: &mut GenerateContext, options: &GeneratePayoutsOptions) -> Result<()> {
    info!(stage = STAGE, phase = "validate_simulated_payouts", cycle = options.cycle, "validating simulated payout candidates");
    let candidates = std::mem::take(&mut ctx.stage_data.candidates_simulated);
    let (candidates, forfeited) = validate_simulated(candidates, &ctx.configuration);
    ctx.stage_data.baker_fees_amount += forfeited;
    ctx.stage_data.candidates_simulated = candidates;
    Ok(())
}
