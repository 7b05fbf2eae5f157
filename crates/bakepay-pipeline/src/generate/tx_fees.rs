use super::{GenerateContext, GeneratePayoutsOptions, STAGE};
use crate::candidates::{PayoutCandidateSimulated, PayoutCandidateWithBondAmountAndFee};
use crate::estimate::{estimate_transaction_fees, EstimateResult};
use bakepay_core::enums::InvalidReason;
use bakepay_core::error::Result;
use bakepay_core::recipe::OpLimits;
use tracing::{debug, info};

/// Charge the simulated costs to the candidate unless the baker pays them.
/// Token payouts never carry their costs.
pub(crate) fn deduct_costs(
    mut candidate: PayoutCandidateWithBondAmountAndFee,
    limits: OpLimits,
) -> PayoutCandidateSimulated {
    if !candidate.tx_kind.is_fa() {
        if !candidate.is_baker_paying_tx_fee {
            candidate.bonds_amount = candidate.bonds_amount.sub_i64(limits.fees_without_allocation());
            candidate.tx_fee_collected = true;
        }
        if !candidate.is_baker_paying_allocation_tx_fee {
            candidate.bonds_amount = candidate.bonds_amount.sub_i64(limits.allocation_fee());
            candidate.allocation_fee_collected = true;
        }
    }
    candidate.simulated(Some(limits))
}

fn apply_estimate(estimate: EstimateResult<PayoutCandidateWithBondAmountAndFee>) -> PayoutCandidateSimulated {
    match estimate.result {
        Ok(limits) => deduct_costs(estimate.transaction, limits),
        Err(_) => {
            let mut candidate = estimate.transaction;
            candidate.mark_invalid(InvalidReason::FailedToEstimateTxCosts);
            candidate.simulated(None)
        }
    }
}

/// Estimate costs of every valid candidate and deduct them
pub fn collect_transaction_fees(ctx: &mut GenerateContext, options: &GeneratePayoutsOptions) -> Result<()> {
    info!(stage = STAGE, phase = "collect_transaction_fees", cycle = options.cycle, "collecting transaction fees");
    let candidates = std::mem::take(&mut ctx.stage_data.candidates_with_fees);
    let (invalid, valid): (Vec<_>, Vec<_>) = candidates
        .into_iter()
        .enumerate()
        .partition(|(_, c)| c.is_invalid());

    let (positions, valid): (Vec<usize>, Vec<_>) = valid.into_iter().unzip();
    debug!(stage = STAGE, count = valid.len(), "estimating transaction costs");
    let estimates = estimate_transaction_fees(valid, &ctx.estimation_context()?);

    let mut simulated: Vec<(usize, PayoutCandidateSimulated)> = invalid
        .into_iter()
        .map(|(i, c)| (i, c.simulated(None)))
        .chain(positions.into_iter().zip(estimates.into_iter().map(apply_estimate)))
        .collect();
    simulated.sort_by_key(|(i, _)| *i);

    ctx.stage_data.candidates_simulated = simulated.into_iter().map(|(_, c)| c).collect();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidates::PayoutCandidate;
    use bakepay_core::enums::TxKind;
    use bakepay_core::money::Mutez;

    fn limits() -> OpLimits {
        OpLimits {
            transaction_fee: 400,
            storage_burn: 100,
            allocation_burn: 64_250,
            ..Default::default()
        }
    }

    #[test]
    fn test_delegator_pays_everything() {
        let candidate = PayoutCandidate::default()
            .with_bond_amount(Mutez::new(1_000_000))
            .with_fee(Mutez::ZERO);
        let simulated = deduct_costs(candidate, limits());
        assert_eq!(simulated.bonds_amount, Mutez::new(1_000_000 - 500 - 64_250));
        assert!(simulated.tx_fee_collected);
        assert!(simulated.allocation_fee_collected);
    }

    #[test]
    fn test_baker_pays_allocation() {
        let candidate = PayoutCandidate {
            is_baker_paying_allocation_tx_fee: true,
            ..Default::default()
        }
        .with_bond_amount(Mutez::new(1_000_000))
        .with_fee(Mutez::ZERO);
        let simulated = deduct_costs(candidate, limits());
        assert_eq!(simulated.bonds_amount, Mutez::new(1_000_000 - 500));
        assert!(!simulated.allocation_fee_collected);
    }

    #[test]
    fn test_token_payouts_keep_amount() {
        let mut candidate = PayoutCandidate::default().with_bond_amount(Mutez::new(1_000));
        candidate.tx_kind = TxKind::Fa1_2;
        let simulated = deduct_costs(candidate.with_fee(Mutez::ZERO), limits());
        assert_eq!(simulated.bonds_amount, Mutez::new(1_000));
        assert!(!simulated.tx_fee_collected);
        assert_eq!(simulated.simulation_result, Some(limits()));
    }
}
