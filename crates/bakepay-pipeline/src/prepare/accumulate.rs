use super::{PrepareContext, PreparePayoutsOptions, SignerIdentity, STAGE};
use crate::estimate::{estimate_transaction_fees, EstimateResult};
use bakepay_core::enums::{InvalidReason, PayoutKind};
use bakepay_core::error::Result;
use bakepay_core::recipe::{OpLimits, PayoutRecipe};
use indexmap::IndexMap;
use tracing::{debug, info, warn};

/// Fold payouts sharing an identity into the first of them. Each entry's
/// collected costs go back into the merged amount. Returns the remaining
/// payouts and the absorbed ones, both in first-seen order.
pub(crate) fn group_and_combine(payouts: Vec<PayoutRecipe>) -> Result<(Vec<PayoutRecipe>, Vec<PayoutRecipe>)> {
    let mut grouped: IndexMap<String, Vec<PayoutRecipe>> = IndexMap::new();
    for payout in payouts {
        grouped.entry(payout.identifier()).or_default().push(payout);
    }

    let mut combined = Vec::with_capacity(grouped.len());
    let mut accumulated = Vec::new();
    for (identifier, group) in grouped {
        let mut group = group.into_iter();
        let Some(mut anchor) = group.next() else {
            continue;
        };
        let mut refund = anchor.collected_costs();
        for mut payout in group {
            refund += payout.collected_costs();
            anchor.combine(&mut payout)?;
            accumulated.push(payout);
        }
        anchor.amount = anchor.amount.add_i64(refund);
        debug!(stage = STAGE, identifier = %identifier, amount = %anchor.amount, "payout group combined");
        combined.push(anchor);
    }
    Ok((combined, accumulated))
}

/// Charge the fresh estimate on a payout whose old costs were refunded
pub(crate) fn apply_new_limits(mut payout: PayoutRecipe, limits: OpLimits) -> PayoutRecipe {
    payout.op_limits = Some(limits);
    payout.amount = payout.amount.sub_i64(payout.collected_costs());
    payout
}

fn mark_failed_estimate(mut payout: PayoutRecipe) -> PayoutRecipe {
    payout.is_valid = false;
    payout.kind = PayoutKind::Invalid;
    payout.note = InvalidReason::FailedToEstimateTxCosts.to_string();
    payout
}

pub fn accumulate_payouts(ctx: &mut PrepareContext, options: &PreparePayoutsOptions) -> Result<()> {
    if !options.accumulate {
        return Ok(());
    }
    info!(stage = STAGE, phase = "accumulate_payouts", "accumulating payouts");

    let payouts = std::mem::take(&mut ctx.stage_data.valid_payouts);
    let (payouts, accumulated) = group_and_combine(payouts)?;
    debug!(stage = STAGE, payouts = payouts.len(), accumulated = accumulated.len(), "payouts grouped");

    let identity = SignerIdentity::of(&ctx.engines)?;
    let estimation = identity.estimation_context(&ctx.engines, &ctx.configuration)?;
    let estimates = estimate_transaction_fees(payouts, &estimation);

    let mut valid = Vec::with_capacity(estimates.len());
    for EstimateResult { transaction, result } in estimates {
        match result {
            Ok(limits) => valid.push(apply_new_limits(transaction, limits)),
            Err(e) => {
                warn!(
                    stage = STAGE,
                    recipient = %transaction.recipient,
                    delegator = %transaction.delegator,
                    amount = %transaction.amount,
                    tx_kind = %transaction.tx_kind,
                    error = %e,
                    "failed to estimate tx costs"
                );
                ctx.stage_data.invalid_payouts.push(mark_failed_estimate(transaction));
            }
        }
    }

    ctx.stage_data.valid_payouts = valid;
    ctx.stage_data.accumulated_payouts = accumulated;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bakepay_core::address::Address;
    use bakepay_core::money::Mutez;

    fn payout(cycle: i64, amount: i64, recipient: &str) -> PayoutRecipe {
        PayoutRecipe {
            delegator: Address::from(recipient),
            recipient: Address::from(recipient),
            cycle,
            kind: PayoutKind::DelegatorReward,
            amount: Mutez::new(amount as i128),
            op_limits: Some(OpLimits {
                transaction_fee: 400,
                storage_burn: 100,
                allocation_burn: 64_250,
                ..Default::default()
            }),
            is_valid: true,
            tx_fee_collected: true,
            allocation_fee_collected: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_group_and_combine() {
        let a = "tz1X7U9XxVz6NDxL4DSZhijME61PW45bYUJE";
        let b = "tz1hZvgjekGo7DmQjWh7XnY5eLQD8wNYPczE";
        let (combined, accumulated) =
            group_and_combine(vec![payout(10, 100, a), payout(10, 50, b), payout(11, 200, a)]).unwrap();

        assert_eq!(combined.len(), 2);
        assert_eq!(combined[0].amount, Mutez::new(300 + 2 * 64_750));
        assert_eq!(combined[0].cycle, 10);
        assert_eq!(combined[1].amount, Mutez::new(50 + 64_750));

        assert_eq!(accumulated.len(), 1);
        assert_eq!(accumulated[0].kind, PayoutKind::Accumulated);
        let (anchor, cycle) = accumulated[0].accumulated_details().unwrap();
        assert_eq!(anchor, combined[0].short_identifier());
        assert_eq!(cycle, 10);
    }

    #[test]
    fn test_combined_costs_are_refunded() {
        let a = "tz1X7U9XxVz6NDxL4DSZhijME61PW45bYUJE";
        let (combined, _) = group_and_combine(vec![payout(10, 100_000, a), payout(11, 100_000, a)]).unwrap();
        let combined = combined.into_iter().next().unwrap();
        assert_eq!(combined.op_limits.unwrap().total_fees(), 2 * 64_750);

        let fresh = OpLimits {
            transaction_fee: 420,
            storage_burn: 100,
            allocation_burn: 64_250,
            ..Default::default()
        };
        let paid = apply_new_limits(combined, fresh);
        // one transfer instead of two: the second charge comes back
        assert_eq!(paid.amount, Mutez::new(200_000 + 64_750 - 20));
        assert_eq!(paid.op_limits, Some(fresh));
    }

    #[test]
    fn test_uncollected_costs_are_not_refunded() {
        let mut recipe = payout(10, 1_000, "tz1X7U9XxVz6NDxL4DSZhijME61PW45bYUJE");
        recipe.tx_fee_collected = false;
        recipe.allocation_fee_collected = false;
        let (combined, _) = group_and_combine(vec![recipe]).unwrap();
        let paid = apply_new_limits(combined.into_iter().next().unwrap(), OpLimits::default());
        assert_eq!(paid.amount, Mutez::new(1_000));
    }

    #[test]
    fn test_mixed_collection_refunds_what_was_paid() {
        let a = "tz1X7U9XxVz6NDxL4DSZhijME61PW45bYUJE";
        let fee_only = |cycle: i64, collected: bool| PayoutRecipe {
            op_limits: Some(OpLimits {
                transaction_fee: 400,
                ..Default::default()
            }),
            tx_fee_collected: collected,
            allocation_fee_collected: false,
            ..payout(cycle, 100_000, a)
        };
        let fresh = OpLimits {
            transaction_fee: 420,
            ..Default::default()
        };

        for (first, second) in [(true, false), (false, true)] {
            let (combined, _) = group_and_combine(vec![fee_only(10, first), fee_only(11, second)]).unwrap();
            let combined = combined.into_iter().next().unwrap();
            assert_eq!(combined.amount, Mutez::new(200_000 + 400));

            let paid = apply_new_limits(combined, fresh);
            assert_eq!(paid.amount, Mutez::new(200_000 + 400 - 420));
        }
    }
}
