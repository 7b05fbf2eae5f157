//! # bakepay pipeline
//!
//! The three pipelines that turn a completed cycle into transfers:
//!
//! ```text
//! ┌──────────┐  blueprint  ┌──────────┐  prepared  ┌──────────┐
//! │ GENERATE │ ──────────► │ PREPARE  │ ─────────► │ EXECUTE  │
//! └──────────┘             └──────────┘            └──────────┘
//!   candidates               reconcile                batches
//!   bonds / fees             accumulate               sign / dispatch
//!   simulate / validate                               report
//! ```
//!
//! Every pipeline is a list of [`Stage`]s run by a [`StageRunner`] over an
//! owned context. Collaborators come in through [`PayoutEngines`]; hook
//! points let an [`ExtensionHost`] observe or rewrite intermediate data.

pub mod candidates;
pub mod engines;
pub mod estimate;
pub mod execute;
pub mod generate;
pub mod hooks;
pub mod prepare;
pub mod reconcile;
pub mod stages;
pub mod validation;

pub use crate::candidates::{
    PayoutCandidate, PayoutCandidateSimulated, PayoutCandidateWithBondAmount,
    PayoutCandidateWithBondAmountAndFee,
};
pub use crate::engines::PayoutEngines;
pub use crate::execute::{execute_prepared_payouts, run_execute, ExecuteContext, ExecutePayoutsOptions};
pub use crate::generate::{generate_payouts, run_generate, GenerateContext, GeneratePayoutsOptions};
pub use crate::hooks::{ExtensionHost, Hook, HookPayload, HookRegistry};
pub use crate::prepare::{
    prepare_cycle_payouts, prepare_payouts_of, run_prepare, PrepareContext, PreparePayoutsOptions,
};
pub use crate::reconcile::filter_recipes_by_reports;
pub use crate::stages::{Stage, StageOutcome, StageRunner};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::engines::PayoutEngines;
    pub use crate::execute::{execute_prepared_payouts, ExecutePayoutsOptions};
    pub use crate::generate::{generate_payouts, GeneratePayoutsOptions};
    pub use crate::hooks::{ExtensionHost, Hook, HookPayload, HookRegistry};
    pub use crate::prepare::{prepare_cycle_payouts, prepare_payouts_of, PreparePayoutsOptions};
}
