use super::{GenerateContext, GeneratePayoutsOptions, STAGE};
use crate::candidates::PayoutCandidate;
use crate::hooks::{run_hook, AfterBondsDistributedData};
use bakepay_core::config::RuntimeConfiguration;
use bakepay_core::constants::DELEGATION_CAPACITY_FACTOR;
use bakepay_core::cycle::BakersCycleData;
use bakepay_core::enums::{InvalidReason, RewardDestination};
use bakepay_core::error::Result;
use bakepay_core::money::Mutez;
use tracing::{debug, info};

/// Baker's share of the cycle rewards.
///
/// With overdelegation protection the denominator is capped at
/// `own_staked * 9`; delegation above the cap dilutes the delegators, not
/// the baker. A zero denominator gives the baker everything.
pub fn baker_bonds_amount(
    cycle_data: &BakersCycleData,
    delegators_delegated_balance: Mutez,
    configuration: &RuntimeConfiguration,
) -> Mutez {
    let baker_delegated_balance = cycle_data.own_delegated_balance;
    let total_rewards = cycle_data.total_delegated_rewards(configuration.payouts.payout_mode);

    let mut total_delegated_balance = delegators_delegated_balance + baker_delegated_balance;
    let maximum_delegated = cycle_data.own_staked_balance.mul_i64(DELEGATION_CAPACITY_FACTOR);
    if configuration.overdelegation.protection_enabled && total_delegated_balance > maximum_delegated {
        total_delegated_balance = maximum_delegated;
    }

    if !total_delegated_balance.is_positive() {
        return total_rewards;
    }
    total_rewards
        .mul_div(baker_delegated_balance, total_delegated_balance)
        .min(total_rewards)
}

/// Ignored delegators never count; low-balance delegators drop out when
/// their rewards go to everyone else.
fn counts_towards_total(candidate: &PayoutCandidate, configuration: &RuntimeConfiguration) -> bool {
    match candidate.invalid_because {
        Some(InvalidReason::Ignored) => false,
        Some(InvalidReason::BalanceTooLow) => {
            configuration.delegators.requirements.below_minimum_balance_reward_destination
                != RewardDestination::Everyone
        }
        _ => true,
    }
}

/// Split the cycle rewards between the baker and valid candidates
pub fn distribute_bonds(ctx: &mut GenerateContext, options: &GeneratePayoutsOptions) -> Result<()> {
    info!(stage = STAGE, phase = "distribute_bonds", cycle = options.cycle, "distributing bonds");
    let configuration = ctx.configuration.clone();
    let candidates = std::mem::take(&mut ctx.stage_data.candidates);
    let cycle_data = &ctx.stage_data.cycle_data;

    let delegators_delegated_balance: Mutez = candidates
        .iter()
        .filter(|c| counts_towards_total(c, &configuration))
        .map(|c| c.delegated_balance)
        .sum();

    let baker_bonds = baker_bonds_amount(cycle_data, delegators_delegated_balance, &configuration);
    let available_rewards = cycle_data.total_delegated_rewards(configuration.payouts.payout_mode) - baker_bonds;
    debug!(
        stage = STAGE,
        baker_bonds = %baker_bonds,
        available_rewards = %available_rewards,
        delegated_balance = %delegators_delegated_balance,
        "rewards split"
    );

    let candidates = candidates
        .into_iter()
        .map(|candidate| {
            if candidate.is_invalid() {
                return candidate.with_bond_amount(Mutez::ZERO);
            }
            let bonds = available_rewards.mul_div(candidate.delegated_balance, delegators_delegated_balance);
            candidate.with_bond_amount(bonds)
        })
        .collect();

    let donated = baker_bonds.portion(configuration.income_recipients.donate_bonds);
    ctx.stage_data.baker_bonds_amount = baker_bonds - donated;
    ctx.stage_data.donate_bonds_amount = donated;

    let mut hook_data = AfterBondsDistributedData {
        cycle: options.cycle,
        candidates,
    };
    run_hook(ctx.engines.extensions(), &mut hook_data)?;
    ctx.stage_data.candidates_with_bonds = hook_data.candidates;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cycle_data(own_staked: i64, own_delegated: i64, external_delegated: i64) -> BakersCycleData {
        BakersCycleData {
            own_staked_balance: Mutez::from(own_staked),
            own_delegated_balance: Mutez::from(own_delegated),
            external_delegated_balance: Mutez::from(external_delegated),
            block_delegated_rewards: Mutez::new(1_000),
            endorsement_delegated_rewards: Mutez::new(10_000),
            ..Default::default()
        }
    }

    fn configuration(protection_enabled: bool) -> RuntimeConfiguration {
        let mut configuration = RuntimeConfiguration::default();
        configuration.overdelegation.protection_enabled = protection_enabled;
        configuration
    }

    #[test]
    fn test_baker_bonds_amount() {
        let protected = configuration(true);
        let unprotected = configuration(false);

        let data = cycle_data(500_000, 500_000, 19_000_000);
        assert_eq!(baker_bonds_amount(&data, Mutez::new(19_000_000), &protected), Mutez::new(1_222));
        assert_eq!(baker_bonds_amount(&data, Mutez::new(19_000_000), &unprotected), Mutez::new(282));
        assert_eq!(baker_bonds_amount(&data, Mutez::new(9_000_000), &protected), Mutez::new(1_222));
        assert_eq!(baker_bonds_amount(&data, Mutez::new(9_000_000), &unprotected), Mutez::new(578));

        let data = cycle_data(600_000, 400_000, 9_000_000);
        assert_eq!(baker_bonds_amount(&data, Mutez::new(9_000_000), &protected), Mutez::new(814));
        assert_eq!(baker_bonds_amount(&data, Mutez::new(9_000_000), &unprotected), Mutez::new(468));
    }

    #[test]
    fn test_zero_delegation_pays_baker_everything() {
        let data = cycle_data(0, 0, 0);
        assert_eq!(baker_bonds_amount(&data, Mutez::ZERO, &configuration(false)), Mutez::new(11_000));
        assert_eq!(baker_bonds_amount(&data, Mutez::ZERO, &configuration(true)), Mutez::new(11_000));
    }

    #[test]
    fn test_low_balance_counting() {
        let mut configuration = RuntimeConfiguration::default();
        let mut candidate = PayoutCandidate::default();
        candidate.mark_invalid(InvalidReason::BalanceTooLow);
        assert!(counts_towards_total(&candidate, &configuration));

        configuration.delegators.requirements.below_minimum_balance_reward_destination = RewardDestination::Everyone;
        assert!(!counts_towards_total(&candidate, &configuration));

        candidate.mark_invalid(InvalidReason::Ignored);
        assert!(!counts_towards_total(&candidate, &RuntimeConfiguration::default()));
    }
}
