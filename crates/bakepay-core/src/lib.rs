//! # bakepay core
//!
//! Accounting types shared by every stage of the baker payout pipeline.
//!
//! This crate provides:
//! - [`Mutez`] / [`Portion`] - exact integer money and ten-thousandth rates
//! - [`PayoutRecipe`] / [`PayoutReport`] - computed and recorded payouts
//! - [`CyclePayoutBlueprint`] - one cycle's output, exchanged between stages
//! - [`BatchBlueprint`] - limit-aware operation packing
//! - [`Collector`], [`Signer`], [`Transactor`], [`Reporter`], [`Notifier`] -
//!   collaborator interfaces
//!
//! ```text
//!   BakersCycleData ──► candidates ──► recipes ──► blueprint
//!                                                      │
//!          reports ◄── batches ◄── payable recipes ◄───┘
//! ```

pub mod address;
pub mod batch;
pub mod blueprint;
pub mod config;
pub mod constants;
pub mod cycle;
pub mod engines;
pub mod enums;
pub mod error;
pub mod money;
pub mod operation;
pub mod recipe;
pub mod report;

pub use crate::address::*;
pub use crate::batch::*;
pub use crate::blueprint::*;
pub use crate::config::*;
pub use crate::cycle::*;
pub use crate::engines::*;
pub use crate::enums::*;
pub use crate::error::*;
pub use crate::money::*;
pub use crate::operation::*;
pub use crate::recipe::*;
pub use crate::report::*;

pub(crate) fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::address::{Address, OpHash};
    pub use crate::batch::{BatchResult, ExecutePayoutsResult, OperationLimits, RecipeBatch};
    pub use crate::blueprint::{CyclePayoutBlueprint, CyclePayoutSummary, PreparePayoutsResult};
    pub use crate::config::RuntimeConfiguration;
    pub use crate::cycle::{BakersCycleData, Delegator};
    pub use crate::engines::{Collector, Notifier, OperationStatus, Reporter, Signer, Transactor};
    pub use crate::enums::*;
    pub use crate::error::{PayoutError, Result};
    pub use crate::money::{Mutez, Portion};
    pub use crate::recipe::{OpLimits, PayoutRecipe};
    pub use crate::report::PayoutReport;
}
