//! # Prepare pipeline
//!
//! Matches generated blueprints against what was already paid and,
//! optionally, folds repeated payouts into one transfer.
//!
//! ```text
//! blueprints ──► prepare_payouts ─── reports ─► reconcile ─ hook: after_payouts_prepared
//!                  └► accumulate_payouts ─► group by identity ─► combine ─► re-estimate
//! ```

mod accumulate;
mod reports;

pub use accumulate::accumulate_payouts;
pub use reports::prepare_payouts;

use crate::engines::PayoutEngines;
use crate::estimate::EstimationContext;
use crate::stage;
use crate::stages::{Stage, StageOutcome, StageRunner};
use bakepay_core::address::Address;
use bakepay_core::blueprint::{CyclePayoutBlueprint, PreparePayoutsResult};
use bakepay_core::config::RuntimeConfiguration;
use bakepay_core::error::Result;
use bakepay_core::recipe::PayoutRecipe;
use bakepay_core::report::PayoutReport;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub(crate) const STAGE: &str = "prepare";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PreparePayoutsOptions {
    /// Fold pending payouts of the same identity into one transfer
    #[serde(default)]
    pub accumulate: bool,
}

#[derive(Clone, Debug, Default)]
pub struct PrepareStageData {
    pub valid_payouts: Vec<PayoutRecipe>,
    pub accumulated_payouts: Vec<PayoutRecipe>,
    pub invalid_payouts: Vec<PayoutRecipe>,
    pub reports_of_past_successful_payouts: Vec<PayoutReport>,
}

pub struct PrepareContext {
    pub configuration: Arc<RuntimeConfiguration>,
    pub engines: PayoutEngines,
    pub blueprints: Vec<CyclePayoutBlueprint>,
    pub stage_data: PrepareStageData,
}

impl PrepareContext {
    pub fn new(
        blueprints: Vec<CyclePayoutBlueprint>,
        configuration: Arc<RuntimeConfiguration>,
        engines: PayoutEngines,
    ) -> Result<Self> {
        engines.reporter()?;
        Ok(Self {
            configuration,
            engines,
            blueprints,
            stage_data: PrepareStageData::default(),
        })
    }

    /// Largest metadata deserialization gas among the blueprints
    pub fn batch_metadata_deserialization_gas_limit(&self) -> i64 {
        self.blueprints
            .iter()
            .map(|b| b.batch_metadata_deserialization_gas_limit)
            .max()
            .unwrap_or_default()
    }

    pub fn into_result(self) -> PreparePayoutsResult {
        PreparePayoutsResult {
            blueprints: self.blueprints,
            valid_payouts: self.stage_data.valid_payouts,
            accumulated_payouts: self.stage_data.accumulated_payouts,
            invalid_payouts: self.stage_data.invalid_payouts,
            reports_of_past_successful_payouts: self.stage_data.reports_of_past_successful_payouts,
        }
    }
}

/// Key and address payouts are simulated under
pub(crate) struct SignerIdentity {
    pub key: String,
    pub address: Address,
}

impl SignerIdentity {
    pub fn of(engines: &PayoutEngines) -> Result<Self> {
        let signer = engines.signer()?;
        Ok(Self {
            key: signer.key(),
            address: signer.pkh(),
        })
    }

    pub fn estimation_context<'a>(
        &'a self,
        engines: &'a PayoutEngines,
        configuration: &'a RuntimeConfiguration,
    ) -> Result<EstimationContext<'a>> {
        Ok(EstimationContext {
            payout_key: &self.key,
            source: &self.address,
            collector: engines.collector()?,
            configuration,
        })
    }
}

pub fn prepare_stages() -> Vec<Stage<PrepareContext, PreparePayoutsOptions>> {
    vec![stage!(prepare_payouts), stage!(accumulate_payouts)]
}

/// Run the prepare pipeline and keep the context for inspection
pub fn run_prepare(
    blueprints: Vec<CyclePayoutBlueprint>,
    configuration: Arc<RuntimeConfiguration>,
    engines: PayoutEngines,
    options: &PreparePayoutsOptions,
) -> Result<StageOutcome<PrepareContext>> {
    let ctx = PrepareContext::new(blueprints, configuration, engines)?;
    Ok(StageRunner::wrap(ctx).execute_stages(options, &prepare_stages()))
}

/// Prepare the payouts of several blueprints
pub fn prepare_payouts_of(
    blueprints: Vec<CyclePayoutBlueprint>,
    configuration: Arc<RuntimeConfiguration>,
    engines: PayoutEngines,
    options: &PreparePayoutsOptions,
) -> Result<PreparePayoutsResult> {
    let (ctx, result) = run_prepare(blueprints, configuration, engines, options)?.into_parts();
    result?;
    Ok(ctx.into_result())
}

/// Prepare the payouts of a single cycle
pub fn prepare_cycle_payouts(
    blueprint: CyclePayoutBlueprint,
    configuration: Arc<RuntimeConfiguration>,
    engines: PayoutEngines,
    options: &PreparePayoutsOptions,
) -> Result<PreparePayoutsResult> {
    prepare_payouts_of(vec![blueprint], configuration, engines, options)
}
