use super::{GenerateContext, GeneratePayoutsOptions, STAGE};
use crate::candidates::{PayoutCandidateWithBondAmount, PayoutCandidateWithBondAmountAndFee};
use crate::hooks::{run_hook, OnFeesCollectionData};
use bakepay_core::enums::InvalidReason;
use bakepay_core::error::Result;
use bakepay_core::money::{Mutez, Portion};
use tracing::{debug, info};

/// Take the baker fee out of one candidate's bonds
pub(crate) fn collect_fee(mut candidate: PayoutCandidateWithBondAmount) -> PayoutCandidateWithBondAmountAndFee {
    if candidate.is_invalid() {
        return candidate.with_fee(Mutez::ZERO);
    }
    if candidate.tx_kind.is_fa() {
        debug!(stage = STAGE, delegator = %candidate.source, tx_kind = %candidate.tx_kind, "skipping fee collection for token payout");
        return candidate.with_fee(Mutez::ZERO);
    }

    let fee = candidate.bonds_amount.portion(candidate.fee_rate);
    candidate.bonds_amount -= fee;
    if !candidate.bonds_amount.is_positive() {
        candidate.mark_invalid(InvalidReason::BelowMinimum);
    }
    candidate.with_fee(fee)
}

/// Collected fees, split into the baker's part and the donated part
pub(crate) fn split_collected_fees(
    candidates: &[PayoutCandidateWithBondAmountAndFee],
    donate_fees: Portion,
) -> (Mutez, Mutez) {
    let collected: Mutez = candidates.iter().map(|c| c.fee).sum();
    let donated = collected.portion(donate_fees);
    (collected - donated, donated)
}

pub fn collect_baker_fee(ctx: &mut GenerateContext, options: &GeneratePayoutsOptions) -> Result<()> {
    info!(stage = STAGE, phase = "collect_baker_fee", cycle = options.cycle, "collecting baker fee");
    let candidates = std::mem::take(&mut ctx.stage_data.candidates_with_bonds)
        .into_iter()
        .map(collect_fee)
        .collect();

    let mut hook_data = OnFeesCollectionData {
        cycle: options.cycle,
        candidates,
    };
    run_hook(ctx.engines.extensions(), &mut hook_data)?;

    let (baker_fees, donated) =
        split_collected_fees(&hook_data.candidates, ctx.configuration.income_recipients.donate_fees);
    ctx.stage_data.baker_fees_amount = baker_fees;
    ctx.stage_data.donate_fees_amount = donated;
    ctx.stage_data.candidates_with_fees = hook_data.candidates;
    Ok(())
}
