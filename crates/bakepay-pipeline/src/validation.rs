//! Candidate validation rules
//!
//! A rule looks at a [`ValidationContext`] and either accepts the payout or
//! names the [`InvalidReason`]. Rules run in order and the first rejection
//! wins. Payouts that are already invalid are returned untouched.

use crate::candidates::{AsCandidate, PayoutCandidate, PayoutCandidateSimulated};
use bakepay_core::config::{DelegatorOverride, RuntimeConfiguration};
use bakepay_core::enums::InvalidReason;
use tracing::trace;

/// Everything a rule may look at
pub struct ValidationContext<'a, P> {
    pub configuration: &'a RuntimeConfiguration,
    /// Override of the payout's delegator, if configured
    pub overrides: Option<&'a DelegatorOverride>,
    pub payout: &'a P,
}

pub type Validator<P> = fn(&ValidationContext<'_, P>) -> Result<(), InvalidReason>;

/// Run `validators` over `payout`, marking it invalid on the first rejection
pub fn validate<P: AsCandidate>(
    mut payout: P,
    configuration: &RuntimeConfiguration,
    validators: &[Validator<P>],
) -> P {
    if payout.candidate().is_invalid() {
        return payout;
    }

    let rejection = {
        let source = &payout.candidate().source;
        let ctx = ValidationContext {
            configuration,
            overrides: configuration.delegators.override_for(source),
            payout: &payout,
        };
        validators.iter().find_map(|validator| validator(&ctx).err())
    };

    if let Some(reason) = rejection {
        trace!(delegator = %payout.candidate().source, reason = %reason, "payout rejected");
        payout.candidate_mut().mark_invalid(reason);
    }
    payout
}

/// Rules applied to freshly generated candidates
pub const CANDIDATE_VALIDATORS: &[Validator<PayoutCandidate>] = &[
    ignored_validator,
    prefilter_validator,
    emptied_validator,
    low_balance_validator,
    smart_contract_validator,
];

/// Rules applied after transaction costs were deducted
pub const SIMULATED_VALIDATORS: &[Validator<PayoutCandidateSimulated>] = &[minimum_amount_validator];

pub fn ignored_validator(ctx: &ValidationContext<'_, PayoutCandidate>) -> Result<(), InvalidReason> {
    if ctx.configuration.delegators.ignore.contains(&ctx.payout.source) {
        return Err(InvalidReason::Ignored);
    }
    Ok(())
}

/// A non-empty prefilter is an allow list
pub fn prefilter_validator(ctx: &ValidationContext<'_, PayoutCandidate>) -> Result<(), InvalidReason> {
    let prefilter = &ctx.configuration.delegators.prefilter;
    if !prefilter.is_empty() && !prefilter.contains(&ctx.payout.source) {
        return Err(InvalidReason::Prefiltered);
    }
    Ok(())
}

pub fn emptied_validator(ctx: &ValidationContext<'_, PayoutCandidate>) -> Result<(), InvalidReason> {
    if ctx.payout.is_emptied && ctx.configuration.payouts.ignore_empty_accounts {
        return Err(InvalidReason::Emptied);
    }
    Ok(())
}

pub fn low_balance_validator(ctx: &ValidationContext<'_, PayoutCandidate>) -> Result<(), InvalidReason> {
    let minimum = ctx
        .overrides
        .and_then(|o| o.minimum_balance)
        .unwrap_or(ctx.configuration.delegators.requirements.minimum_balance);
    if ctx.payout.delegated_balance < minimum {
        return Err(InvalidReason::BalanceTooLow);
    }
    Ok(())
}

pub fn smart_contract_validator(ctx: &ValidationContext<'_, PayoutCandidate>) -> Result<(), InvalidReason> {
    if ctx.configuration.network.do_not_pay_smart_contracts && ctx.payout.recipient.is_contract() {
        return Err(InvalidReason::ToSmartContract);
    }
    Ok(())
}

/// Amount left after costs must be positive and above the configured minimum
pub fn minimum_amount_validator(
    ctx: &ValidationContext<'_, PayoutCandidateSimulated>,
) -> Result<(), InvalidReason> {
    let amount = ctx.payout.bonds_amount;
    if !amount.is_positive() || amount <= ctx.configuration.payouts.minimum_payout_amount {
        return Err(InvalidReason::BelowMinimum);
    }
    Ok(())
}
