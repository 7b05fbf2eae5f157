use super::{GenerateContext, GeneratePayoutsOptions, STAGE};
use crate::estimate::{estimate_transaction_fees, EstimateResult};
use bakepay_core::address::Address;
use bakepay_core::config::IncomeShare;
use bakepay_core::enums::{InvalidReason, PayoutKind, TxKind};
use bakepay_core::error::Result;
use bakepay_core::money::Mutez;
use bakepay_core::recipe::PayoutRecipe;
use tracing::{debug, info, warn};

/// Recipes paying `amount` out to `shares`. Zero amounts and transfers to
/// the payout address itself are skipped.
pub(crate) fn income_recipes(
    baker: &Address,
    payout_address: &Address,
    cycle: i64,
    kind: PayoutKind,
    amount: Mutez,
    shares: &[IncomeShare],
) -> Vec<PayoutRecipe> {
    shares
        .iter()
        .filter(|share| &share.address != payout_address)
        .map(|share| (share, amount.portion(share.share)))
        .filter(|(_, amount)| amount.is_positive())
        .map(|(share, amount)| PayoutRecipe {
            baker: baker.clone(),
            cycle,
            recipient: share.address.clone(),
            kind,
            tx_kind: TxKind::Native,
            amount,
            is_valid: true,
            ..Default::default()
        })
        .collect()
}

fn mark_invalid(recipe: &mut PayoutRecipe, reason: InvalidReason) {
    recipe.kind = PayoutKind::Invalid;
    recipe.is_valid = false;
    recipe.note = reason.to_string();
}

/// Income payouts always carry their own costs
fn net_of_costs(estimate: EstimateResult<PayoutRecipe>) -> PayoutRecipe {
    let mut recipe = estimate.transaction;
    match estimate.result {
        Ok(limits) => {
            recipe.amount = recipe.amount.sub_i64(limits.total_fees());
            recipe.op_limits = Some(limits);
            recipe.tx_fee_collected = true;
            recipe.allocation_fee_collected = true;
            if !recipe.amount.is_positive() {
                mark_invalid(&mut recipe, InvalidReason::BelowMinimum);
            }
        }
        Err(e) => {
            warn!(stage = STAGE, recipient = %recipe.recipient, kind = %recipe.kind, error = %e, "failed to estimate income payout");
            mark_invalid(&mut recipe, InvalidReason::FailedToEstimateTxCosts);
        }
    }
    recipe
}

/// Candidates become recipes; bond, fee and donation income is paid out to
/// the configured recipients
pub fn finalize_payouts(ctx: &mut GenerateContext, options: &GeneratePayoutsOptions) -> Result<()> {
    info!(stage = STAGE, phase = "finalize_payouts", cycle = options.cycle, "finalizing payouts");
    let configuration = ctx.configuration.clone();
    let baker = &configuration.baker;
    let data = &ctx.stage_data;

    let mut payouts: Vec<PayoutRecipe> = data
        .candidates_simulated
        .iter()
        .map(|candidate| candidate.to_recipe(baker, options.cycle, PayoutKind::DelegatorReward))
        .collect();
    let paid_delegators = payouts
        .iter()
        .filter(|p| p.is_valid && p.kind == PayoutKind::DelegatorReward)
        .count();

    let income = &configuration.income_recipients;
    let donated = data.donate_bonds_amount + data.donate_fees_amount;
    let mut incomes = [
        (PayoutKind::BakerReward, data.baker_bonds_amount, &income.bonds),
        (PayoutKind::FeeIncome, data.baker_fees_amount, &income.fees),
        (PayoutKind::Donation, donated, &income.donations),
    ]
    .into_iter()
    .flat_map(|(kind, amount, shares)| {
        income_recipes(baker, &ctx.payout_address, options.cycle, kind, amount, shares)
    })
    .collect::<Vec<_>>();
    incomes.sort_by(|a, b| a.recipient.cmp(&b.recipient));

    if !incomes.is_empty() {
        debug!(stage = STAGE, count = incomes.len(), "estimating income payouts");
        let estimates = estimate_transaction_fees(incomes, &ctx.estimation_context()?);
        payouts.extend(estimates.into_iter().map(net_of_costs));
    }

    ctx.stage_data.payouts = payouts;
    ctx.stage_data.paid_delegators = paid_delegators;
    Ok(())
}
