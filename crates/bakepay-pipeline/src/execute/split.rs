use super::{ExecuteContext, ExecutePayoutsOptions, STAGE};
use bakepay_core::batch::{BatchBlueprint, OperationLimits, RecipeBatch};
use bakepay_core::error::{PayoutError, Result};
use bakepay_core::recipe::PayoutRecipe;
use tracing::{debug, info};

/// Fill batches in order, opening a new one whenever the next payout does
/// not fit. A payout that does not fit an empty batch is an error.
pub fn split_payouts(
    payouts: Vec<PayoutRecipe>,
    limits: OperationLimits,
    metadata_deserialization_gas: i64,
) -> Result<Vec<RecipeBatch>> {
    let mut batches = Vec::new();
    let mut current = BatchBlueprint::new(limits, metadata_deserialization_gas);

    for payout in payouts {
        if current.add_payout(payout.clone()) {
            continue;
        }
        let full = std::mem::replace(&mut current, BatchBlueprint::new(limits, metadata_deserialization_gas));
        if !full.is_empty() {
            batches.push(full.into_batch());
        }
        let recipient = payout.recipient.to_string();
        if !current.add_payout(payout) {
            return Err(PayoutError::PayoutDidNotFitTheBatch { recipient });
        }
    }
    if !current.is_empty() {
        batches.push(current.into_batch());
    }
    Ok(batches)
}

/// Token transfers and contract calls get batches of their own unless mixed
/// in; implicit recipients come last.
fn group_payouts(payouts: Vec<PayoutRecipe>, options: &ExecutePayoutsOptions) -> Vec<Vec<PayoutRecipe>> {
    let (fa, native): (Vec<_>, Vec<_>) = payouts.into_iter().partition(|p| p.tx_kind.is_fa());
    let (contracts, mut implicit): (Vec<_>, Vec<_>) =
        native.into_iter().partition(|p| p.recipient.is_contract());

    let mut groups = Vec::with_capacity(3);
    if options.mix_in_fa_transfers {
        implicit.extend(fa);
    } else {
        groups.push(fa);
    }
    if options.mix_in_contract_calls {
        implicit.extend(contracts);
    } else {
        groups.push(contracts);
    }
    groups.push(implicit);
    groups
}

pub fn split_into_batches(ctx: &mut ExecuteContext, options: &ExecutePayoutsOptions) -> Result<()> {
    info!(stage = STAGE, phase = "split_into_batches", payouts = ctx.valid_payouts.len(), "splitting into batches");
    let limits = ctx
        .engines
        .transactor()?
        .get_limits()
        .map_err(|e| PayoutError::GetChainLimitsFailed(e.to_string()))?;
    let metadata_gas = ctx.batch_metadata_deserialization_gas_limit();

    let mut batches = Vec::new();
    for group in group_payouts(ctx.valid_payouts.clone(), options) {
        batches.extend(split_payouts(group, limits, metadata_gas)?);
    }
    debug!(stage = STAGE, batches = batches.len(), metadata_gas, "payouts split");

    ctx.stage_data.limits = Some(limits);
    ctx.stage_data.batches = batches;
    Ok(())
}
