//! # Generate pipeline
//!
//! Turns one cycle's staking data into a [`CyclePayoutBlueprint`].
//!
//! ```text
//! check_conditions_and_prepare
//!   └► generate_payout_candidates ─ hook: after_candidates_generated
//!        └► distribute_bonds ──────── hook: after_bonds_distributed
//!             └► collect_baker_fee ── hook: on_fees_collection
//!                  └► check_sufficient_balance ─ hook: check_balance
//!                       └► collect_transaction_fees
//!                            └► validate_simulated_payouts
//!                                 └► finalize_payouts
//!                                      └► create_blueprint ─ hook: after_payouts_blueprint_generated
//! ```

mod balance;
mod blueprint;
mod bonds;
mod candidates;
mod check_conditions;
mod fees;
mod finalize;
mod tx_fees;
mod validate_simulated;

pub use balance::check_sufficient_balance;
pub use blueprint::create_blueprint;
pub use bonds::{baker_bonds_amount, distribute_bonds};
pub use candidates::generate_payout_candidates;
pub use check_conditions::check_conditions_and_prepare;
pub use fees::collect_baker_fee;
pub use finalize::finalize_payouts;
pub use tx_fees::collect_transaction_fees;
pub use validate_simulated::validate_simulated_payouts;

use crate::candidates::{
    PayoutCandidate, PayoutCandidateSimulated, PayoutCandidateWithBondAmount,
    PayoutCandidateWithBondAmountAndFee,
};
use crate::engines::PayoutEngines;
use crate::estimate::EstimationContext;
use crate::stage;
use crate::stages::{Stage, StageOutcome, StageRunner};
use bakepay_core::address::Address;
use bakepay_core::blueprint::CyclePayoutBlueprint;
use bakepay_core::config::RuntimeConfiguration;
use bakepay_core::cycle::BakersCycleData;
use bakepay_core::error::{PayoutError, Result};
use bakepay_core::money::Mutez;
use bakepay_core::recipe::PayoutRecipe;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

pub(crate) const STAGE: &str = "generate";

/// Options of a generate run
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GeneratePayoutsOptions {
    pub cycle: i64,
    #[serde(default)]
    pub skip_balance_check: bool,
    /// Re-check the balance until it suffices instead of failing
    #[serde(default)]
    pub wait_for_sufficient_balance: bool,
}

/// Intermediate results, filled stage by stage
#[derive(Clone, Debug, Default)]
pub struct GenerateStageData {
    pub cycle_data: BakersCycleData,
    pub candidates: Vec<PayoutCandidate>,
    pub candidates_with_bonds: Vec<PayoutCandidateWithBondAmount>,
    pub candidates_with_fees: Vec<PayoutCandidateWithBondAmountAndFee>,
    pub candidates_simulated: Vec<PayoutCandidateSimulated>,
    pub payouts: Vec<PayoutRecipe>,

    pub baker_bonds_amount: Mutez,
    pub donate_bonds_amount: Mutez,
    pub baker_fees_amount: Mutez,
    pub donate_fees_amount: Mutez,
    pub paid_delegators: usize,

    pub batch_metadata_deserialization_gas_limit: i64,
    pub blueprint: Option<CyclePayoutBlueprint>,
}

/// Context owned by one generate run
pub struct GenerateContext {
    pub configuration: Arc<RuntimeConfiguration>,
    pub engines: PayoutEngines,
    /// Address the payouts are sent from
    pub payout_address: Address,
    /// Encoded public key of the payout address
    pub payout_key: String,
    pub stage_data: GenerateStageData,
}

impl GenerateContext {
    pub fn new(configuration: Arc<RuntimeConfiguration>, engines: PayoutEngines) -> Result<Self> {
        engines.collector()?;
        let signer = engines.signer()?;
        let payout_address = signer.pkh();
        let payout_key = signer.key();
        debug!(stage = STAGE, payout_address = %payout_address, "payout context initialized");

        Ok(Self {
            configuration,
            payout_address,
            payout_key,
            engines,
            stage_data: GenerateStageData::default(),
        })
    }

    pub(crate) fn estimation_context(&self) -> Result<EstimationContext<'_>> {
        Ok(EstimationContext {
            payout_key: &self.payout_key,
            source: &self.payout_address,
            collector: self.engines.collector()?,
            configuration: &self.configuration,
        })
    }
}

/// Stages in execution order
pub fn generate_stages() -> Vec<Stage<GenerateContext, GeneratePayoutsOptions>> {
    vec![
        stage!(check_conditions_and_prepare),
        stage!(generate_payout_candidates),
        stage!(distribute_bonds),
        stage!(collect_baker_fee),
        stage!(check_sufficient_balance),
        stage!(collect_transaction_fees),
        stage!(validate_simulated_payouts),
        stage!(finalize_payouts),
        stage!(create_blueprint),
    ]
}

/// Run the generate pipeline and keep the context for inspection
pub fn run_generate(
    configuration: Arc<RuntimeConfiguration>,
    engines: PayoutEngines,
    options: &GeneratePayoutsOptions,
) -> Result<StageOutcome<GenerateContext>> {
    let ctx = GenerateContext::new(configuration, engines)?;
    Ok(StageRunner::wrap(ctx).execute_stages(options, &generate_stages()))
}

/// Generate the payout blueprint of `options.cycle`
pub fn generate_payouts(
    configuration: Arc<RuntimeConfiguration>,
    engines: PayoutEngines,
    options: &GeneratePayoutsOptions,
) -> Result<CyclePayoutBlueprint> {
    let (ctx, result) = run_generate(configuration, engines, options)?.into_parts();
    result?;
    ctx.stage_data.blueprint.ok_or(PayoutError::MissingPayoutBlueprint)
}
