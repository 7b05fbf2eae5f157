use super::{GenerateContext, GeneratePayoutsOptions, STAGE};
use crate::estimate::estimate_batch_metadata_deserialization_gas;
use bakepay_core::error::{PayoutError, Result};
use tracing::{debug, info};

/// Payout address must be revealed; measures the per-operation metadata gas
pub fn check_conditions_and_prepare(ctx: &mut GenerateContext, options: &GeneratePayoutsOptions) -> Result<()> {
    info!(stage = STAGE, phase = "check_conditions_and_prepare", cycle = options.cycle, "checking conditions and preparing");

    let collector = ctx.engines.collector()?;
    let address = &ctx.payout_address;
    debug!(stage = STAGE, address = %address, "checking if payout address is revealed");
    let revealed = collector
        .is_revealed(address)
        .map_err(|e| PayoutError::RevealCheckFailed {
            address: address.to_string(),
            message: e.to_string(),
        })?;
    if !revealed {
        return Err(PayoutError::NotRevealed(address.to_string()));
    }

    debug!(stage = STAGE, "estimating serialization gas limit");
    let gas = estimate_batch_metadata_deserialization_gas(&ctx.estimation_context()?)?;
    debug!(stage = STAGE, gas, "batch metadata deserialization gas estimated");
    ctx.stage_data.batch_metadata_deserialization_gas_limit = gas;
    Ok(())
}
