use super::{GenerateContext, GeneratePayoutsOptions, STAGE};
use crate::candidates::PayoutCandidateWithBondAmountAndFee;
use crate::hooks::{run_hook, CheckBalanceData, Hook};
use bakepay_core::constants::PAYOUT_FEE_BUFFER;
use bakepay_core::error::{PayoutError, Result};
use bakepay_core::money::Mutez;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const CANCELLATION_POLL: Duration = Duration::from_millis(250);

/// Native amount the payout address must hold: bonds of valid native
/// payouts plus a fee reserve per payout
pub(crate) fn required_balance(candidates: &[PayoutCandidateWithBondAmountAndFee]) -> Mutez {
    candidates
        .iter()
        .filter(|c| !c.is_invalid() && !c.tx_kind.is_fa())
        .map(|c| c.bonds_amount.add_i64(PAYOUT_FEE_BUFFER))
        .sum()
}

/// Block for `duration` in short slices. Returns false once `cancellation`
/// fires.
pub(crate) fn sleep_unless_cancelled(cancellation: &CancellationToken, duration: Duration) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if cancellation.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep(CANCELLATION_POLL.min(deadline - now));
    }
}

pub fn check_sufficient_balance(ctx: &mut GenerateContext, options: &GeneratePayoutsOptions) -> Result<()> {
    info!(stage = STAGE, phase = "check_sufficient_balance", cycle = options.cycle, "checking for sufficient balance");
    if options.skip_balance_check {
        warn!(stage = STAGE, "balance check skipped");
        return Ok(());
    }

    let candidates = &ctx.stage_data.candidates_with_fees;
    let mut hook_data = CheckBalanceData {
        is_sufficient: true,
        skip_tez_check: false,
        message: String::new(),
        payouts: candidates.iter().filter(|c| !c.is_invalid()).cloned().collect(),
    };
    run_hook(ctx.engines.extensions(), &mut hook_data)?;
    if !hook_data.is_sufficient {
        return Err(PayoutError::Hook {
            hook: Hook::CheckBalance.name().to_string(),
            message: hook_data.message,
        });
    }
    if hook_data.skip_tez_check {
        return Ok(());
    }

    let required = required_balance(candidates);
    let collector = ctx.engines.collector()?;
    let payouts = &ctx.configuration.payouts;
    let attempts = payouts.balance_check_attempts.max(1);
    let interval = Duration::from_secs(payouts.balance_check_interval_secs);

    let mut attempt = 1;
    loop {
        let available = collector.get_balance(&ctx.payout_address)?;
        if available >= required {
            return Ok(());
        }

        let insufficient = PayoutError::InsufficientBalance { required, available };
        if !options.wait_for_sufficient_balance
            || attempt >= attempts
            || ctx.engines.cancellation().is_cancelled()
        {
            return Err(insufficient);
        }

        warn!(
            stage = STAGE,
            required = %required,
            available = %available,
            attempt,
            "insufficient balance, waiting for funds"
        );
        ctx.engines
            .admin_notify(&format!("{}, payouts of cycle {} are waiting for funds", insufficient, options.cycle));
        if !sleep_unless_cancelled(ctx.engines.cancellation(), interval) {
            warn!(stage = STAGE, "cancelled while waiting for funds");
            return Err(insufficient);
        }
        attempt += 1;
    }
}
