//! Collaborator interfaces consumed by the payout pipeline
//!
//! Chain access, signing, broadcasting, persistence and notification are
//! provided by implementations of these traits. The pipeline only talks to
//! them through `Arc<dyn Trait>` handles.

use crate::address::{Address, OpHash};
use crate::batch::OperationLimits;
use crate::blueprint::CyclePayoutSummary;
use crate::cycle::BakersCycleData;
use crate::error::Result;
use crate::money::Mutez;
use crate::operation::{Operation, SimulationReceipt};
use crate::recipe::PayoutRecipe;
use crate::report::PayoutReport;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// On-chain status of a previously broadcast operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Applied,
    Failed,
    NotExists,
    Unknown,
}

/// Read access to chain data
pub trait Collector: Send + Sync {
    fn id(&self) -> &str;

    fn get_cycle_staking_data(&self, baker: &Address, cycle: i64) -> Result<BakersCycleData>;

    fn get_last_completed_cycle(&self) -> Result<i64>;

    /// Dry-run `op` as if signed by `public_key`
    fn simulate(&self, op: &Operation, public_key: &str) -> Result<SimulationReceipt>;

    fn is_revealed(&self, address: &Address) -> Result<bool>;

    fn was_operation_applied(&self, op_hash: &OpHash) -> Result<OperationStatus>;

    fn get_balance(&self, address: &Address) -> Result<Mutez>;

    fn get_current_protocol(&self) -> Result<String>;
}

/// Holder of the payout key
pub trait Signer: Send + Sync {
    fn id(&self) -> &str;

    /// Payout address
    fn pkh(&self) -> Address;

    /// Encoded public key
    fn key(&self) -> String;

    fn sign(&self, op: &mut Operation) -> Result<()>;
}

/// Handle of a dispatched operation
pub trait OpResult: Send {
    fn op_hash(&self) -> OpHash;

    fn wait_for_apply(&self) -> Result<()>;
}

/// Broadcast side of the chain
pub trait Transactor: Send + Sync {
    fn id(&self) -> &str;

    fn get_limits(&self) -> Result<OperationLimits>;

    fn dispatch(&self, op: &Operation) -> Result<Box<dyn OpResult>>;
}

/// Persistence of reports and summaries
pub trait Reporter: Send + Sync {
    /// Reports of a cycle, empty when none were written yet
    fn get_existing_reports(&self, cycle: i64) -> Result<Vec<PayoutReport>>;

    fn report_payouts(&self, reports: &[PayoutReport]) -> Result<()>;

    fn report_invalid_payouts(&self, recipes: &[PayoutRecipe]) -> Result<()>;

    fn report_cycle_summary(&self, summary: &CyclePayoutSummary) -> Result<()>;

    fn get_existing_cycle_summary(&self, cycle: i64) -> Result<Option<CyclePayoutSummary>>;
}

/// Outbound notifications
pub trait Notifier: Send + Sync {
    fn payout_summary_notify(
        &self,
        summary: &CyclePayoutSummary,
        additional_data: &HashMap<String, String>,
    ) -> Result<()>;

    fn admin_notify(&self, message: &str) -> Result<()>;
}
