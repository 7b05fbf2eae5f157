use super::{GenerateContext, GenerateStageData, GeneratePayoutsOptions, STAGE};
use crate::hooks::run_hook;
use bakepay_core::blueprint::{CyclePayoutBlueprint, CyclePayoutSummary};
use bakepay_core::enums::PayoutMode;
use bakepay_core::error::Result;
use bakepay_core::money::Mutez;
use chrono::Utc;
use tracing::info;

fn summarize(cycle: i64, data: &GenerateStageData, mode: PayoutMode) -> CyclePayoutSummary {
    let cycle_data = &data.cycle_data;
    CyclePayoutSummary {
        cycle,
        delegators: cycle_data.delegators.len(),
        paid_delegators: data.paid_delegators,
        own_staked_balance: cycle_data.own_staked_balance,
        own_delegated_balance: cycle_data.own_delegated_balance,
        external_staked_balance: cycle_data.external_staked_balance,
        external_delegated_balance: cycle_data.external_delegated_balance,
        earned_fees: cycle_data.block_delegated_fees,
        earned_rewards: cycle_data.total_delegated_rewards(mode),
        distributed_rewards: data.payouts.iter().filter(|p| p.is_valid).map(|p| p.amount).sum::<Mutez>(),
        bond_income: data.baker_bonds_amount,
        fee_income: data.baker_fees_amount,
        income_total: data.baker_bonds_amount + data.baker_fees_amount,
        donated_bonds: data.donate_bonds_amount,
        donated_fees: data.donate_fees_amount,
        donated_total: data.donate_bonds_amount + data.donate_fees_amount,
        timestamp: Utc::now(),
    }
}

pub fn create_blueprint(ctx: &mut GenerateContext, options: &GeneratePayoutsOptions) -> Result<()> {
    info!(stage = STAGE, phase = "create_blueprint", cycle = options.cycle, "creating payout blueprint");
    let data = &ctx.stage_data;
    let mut blueprint = CyclePayoutBlueprint {
        cycle: options.cycle,
        payouts: data.payouts.clone(),
        summary: summarize(options.cycle, data, ctx.configuration.payouts.payout_mode),
        batch_metadata_deserialization_gas_limit: data.batch_metadata_deserialization_gas_limit,
    };

    // read-only, the blueprint is left as is
    run_hook(ctx.engines.extensions(), &mut blueprint)?;

    ctx.stage_data.blueprint = Some(blueprint);
    Ok(())
}
