//! # Execute pipeline
//!
//! Packs prepared payouts into operations and broadcasts them.
//!
//! ```text
//! prepared payouts
//!   └► split_into_batches ── token │ contract │ implicit groups, chain limits
//!        └► execute_payouts ─ per batch: build ─► sign ─► dispatch ─► wait ─► report
//!                             finally: invalid payouts, cycle summaries
//! ```
//!
//! Cancellation is checked between batches only; a batch that has been
//! dispatched is always waited for and reported.

mod broadcast;
mod split;

pub use broadcast::execute_payouts;
pub use split::{split_into_batches, split_payouts};

use crate::engines::PayoutEngines;
use crate::stage;
use crate::stages::{Stage, StageOutcome, StageRunner};
use bakepay_core::batch::{BatchResult, ExecutePayoutsResult, OperationLimits, RecipeBatch};
use bakepay_core::blueprint::{CyclePayoutBlueprint, PreparePayoutsResult};
use bakepay_core::config::RuntimeConfiguration;
use bakepay_core::error::Result;
use bakepay_core::recipe::PayoutRecipe;
use bakepay_core::report::PayoutReport;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub(crate) const STAGE: &str = "execute";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutePayoutsOptions {
    /// Build batches but do not sign, broadcast or report
    pub dry_run: bool,
    /// Put smart contract recipients into the same batches as implicit ones
    pub mix_in_contract_calls: bool,
    /// Put token transfers into the same batches as native ones
    pub mix_in_fa_transfers: bool,
}

#[derive(Clone, Debug, Default)]
pub struct ExecuteStageData {
    pub limits: Option<OperationLimits>,
    pub reports_of_past_successful_payouts: Vec<PayoutReport>,
    pub batches: Vec<RecipeBatch>,
    pub batch_results: Vec<BatchResult>,
    pub paid_delegators: usize,
}

pub struct ExecuteContext {
    pub configuration: Arc<RuntimeConfiguration>,
    pub engines: PayoutEngines,

    pub valid_payouts: Vec<PayoutRecipe>,
    pub invalid_payouts: Vec<PayoutRecipe>,
    pub accumulated_payouts: Vec<PayoutRecipe>,
    pub blueprints: Vec<CyclePayoutBlueprint>,

    pub stage_data: ExecuteStageData,
}

impl ExecuteContext {
    pub fn new(
        preparation: PreparePayoutsResult,
        configuration: Arc<RuntimeConfiguration>,
        engines: PayoutEngines,
        options: &ExecutePayoutsOptions,
    ) -> Result<Self> {
        engines.transactor()?;
        if !options.dry_run {
            engines.signer()?;
            engines.reporter()?;
        }

        Ok(Self {
            configuration,
            engines,
            valid_payouts: preparation.valid_payouts,
            invalid_payouts: preparation.invalid_payouts,
            accumulated_payouts: preparation.accumulated_payouts,
            blueprints: preparation.blueprints,
            stage_data: ExecuteStageData {
                reports_of_past_successful_payouts: preparation.reports_of_past_successful_payouts,
                ..Default::default()
            },
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

    pub fn into_result(self) -> ExecutePayoutsResult {
        ExecutePayoutsResult {
            batch_results: self.stage_data.batch_results,
            paid_delegators: self.stage_data.paid_delegators,
        }
    }
}

pub fn execute_stages() -> Vec<Stage<ExecuteContext, ExecutePayoutsOptions>> {
    vec![stage!(split_into_batches), stage!(execute_payouts)]
}

/// Run the execute pipeline and keep the context for inspection
pub fn run_execute(
    preparation: PreparePayoutsResult,
    configuration: Arc<RuntimeConfiguration>,
    engines: PayoutEngines,
    options: &ExecutePayoutsOptions,
) -> Result<StageOutcome<ExecuteContext>> {
    let ctx = ExecuteContext::new(preparation, configuration, engines, options)?;
    Ok(StageRunner::wrap(ctx).execute_stages(options, &execute_stages()))
}

/// Execute prepared payouts. Batch results collected before a failing stage
/// are returned together with the error.
pub fn execute_prepared_payouts(
    preparation: PreparePayoutsResult,
    configuration: Arc<RuntimeConfiguration>,
    engines: PayoutEngines,
    options: &ExecutePayoutsOptions,
) -> (ExecutePayoutsResult, Result<()>) {
    match run_execute(preparation, configuration, engines, options) {
        Ok(outcome) => {
            let (ctx, result) = outcome.into_parts();
            (ctx.into_result(), result)
        }
        Err(e) => (ExecutePayoutsResult::default(), Err(e)),
    }
}
