//! Collaborator doubles shared by the pipeline integration tests

#![allow(dead_code)]

use bakepay_core::prelude::*;
use bakepay_core::engines::OpResult;
use bakepay_core::operation::{ContentResult, ContentStatus, Operation, SimulationReceipt};
use bakepay_pipeline::PayoutEngines;
use mockall::mock;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

pub const BAKER: &str = "tz1P6WKJu2rcbxKiKRZHKQKmKrpC9TfW1AwM";
pub const ALICE: &str = "tz1X7U9XxVz6NDxL4DSZhijME61PW45bYUJE";
pub const BOB: &str = "tz1hZvgjekGo7DmQjWh7XnY5eLQD8wNYPczE";
pub const CAROL: &str = "tz1Yju7jmmsaUiG9qQLoYv35v5pHgnWoLWbt";
pub const CONTRACT: &str = "KT1Hkg6qgV3VykjgUXKbWcU3h6oJ1qVxUxZV";

pub const METADATA_MILLIGAS: i64 = 120_000;
pub const TRANSFER_MILLIGAS: i64 = 1_000_000;

/// Collector over fixed cycle data with a flat simulation cost model
#[derive(Clone, Debug, Default)]
pub struct FakeCollector {
    pub cycle_data: Option<BakersCycleData>,
    pub balance: Mutez,
    pub unrevealed: bool,
    pub statuses: HashMap<OpHash, OperationStatus>,
    /// Destinations whose transfers fail in simulation
    pub failing: HashSet<Address>,
    /// Destinations that need allocation
    pub unallocated: HashSet<Address>,
    /// Return a single content result whatever was simulated
    pub truncated_receipts: bool,
}

impl FakeCollector {
    pub fn with_cycle_data(cycle_data: BakersCycleData) -> Self {
        Self {
            cycle_data: Some(cycle_data),
            balance: Mutez::from_tez(1_000_000),
            ..Default::default()
        }
    }
}

impl Collector for FakeCollector {
    fn id(&self) -> &str {
        "fake"
    }

    fn get_cycle_staking_data(&self, _baker: &Address, cycle: i64) -> Result<BakersCycleData> {
        self.cycle_data.clone().ok_or(PayoutError::NoCycleDataAvailable(cycle))
    }

    fn get_last_completed_cycle(&self) -> Result<i64> {
        Ok(100)
    }

    fn simulate(&self, op: &Operation, _public_key: &str) -> Result<SimulationReceipt> {
        let mut contents: Vec<ContentResult> = op
            .contents
            .iter()
            .enumerate()
            .map(|(i, content)| {
                let destination = content.destination();
                let allocated = self.unallocated.contains(destination);
                ContentResult {
                    status: if self.failing.contains(destination) {
                        ContentStatus::Failed
                    } else {
                        ContentStatus::Applied
                    },
                    consumed_milligas: TRANSFER_MILLIGAS + if i == 0 { METADATA_MILLIGAS } else { 0 },
                    allocated_destination: allocated,
                    allocation_burn: if allocated { 64_250 } else { 0 },
                    ..Default::default()
                }
            })
            .collect();
        if self.truncated_receipts {
            contents.truncate(1);
        }
        Ok(SimulationReceipt { contents })
    }

    fn is_revealed(&self, _address: &Address) -> Result<bool> {
        Ok(!self.unrevealed)
    }

    fn was_operation_applied(&self, op_hash: &OpHash) -> Result<OperationStatus> {
        Ok(self.statuses.get(op_hash).copied().unwrap_or(OperationStatus::Unknown))
    }

    fn get_balance(&self, _address: &Address) -> Result<Mutez> {
        Ok(self.balance)
    }

    fn get_current_protocol(&self) -> Result<String> {
        Ok("PtParisB".to_string())
    }
}

pub struct FakeSigner;

impl Signer for FakeSigner {
    fn id(&self) -> &str {
        "fake"
    }

    fn pkh(&self) -> Address {
        Address::from(BAKER)
    }

    fn key(&self) -> String {
        "edpkvGfYw3LyB1UcCahKQk4rF2tvbMUk8GFiTuMjL75uGXrpvKXhjn".to_string()
    }

    fn sign(&self, op: &mut Operation) -> Result<()> {
        op.signature = Some(format!("sig{}", op.contents.len()));
        Ok(())
    }
}

/// Operation that is applied, or fails with `error`, once waited for
pub struct FakeOpResult {
    pub op_hash: OpHash,
    pub error: Option<String>,
}

impl OpResult for FakeOpResult {
    fn op_hash(&self) -> OpHash {
        self.op_hash.clone()
    }

    fn wait_for_apply(&self) -> Result<()> {
        match &self.error {
            None => Ok(()),
            Some(e) => Err(PayoutError::Transactor(e.clone())),
        }
    }
}

mock! {
    pub Transactor {}

    impl Transactor for Transactor {
        fn id(&self) -> &str;
        fn get_limits(&self) -> Result<OperationLimits>;
        fn dispatch(&self, op: &Operation) -> Result<Box<dyn OpResult>>;
    }
}

mock! {
    pub Reporter {}

    impl Reporter for Reporter {
        fn get_existing_reports(&self, cycle: i64) -> Result<Vec<PayoutReport>>;
        fn report_payouts(&self, reports: &[PayoutReport]) -> Result<()>;
        fn report_invalid_payouts(&self, recipes: &[PayoutRecipe]) -> Result<()>;
        fn report_cycle_summary(&self, summary: &CyclePayoutSummary) -> Result<()>;
        fn get_existing_cycle_summary(&self, cycle: i64) -> Result<Option<CyclePayoutSummary>>;
    }
}

/// Reporter keeping everything in memory
#[derive(Default)]
pub struct RecordingReporter {
    pub existing: HashMap<i64, Vec<PayoutReport>>,
    pub payouts: Mutex<Vec<PayoutReport>>,
    pub invalid: Mutex<Vec<PayoutRecipe>>,
    pub summaries: Mutex<Vec<CyclePayoutSummary>>,
}

impl Reporter for RecordingReporter {
    fn get_existing_reports(&self, cycle: i64) -> Result<Vec<PayoutReport>> {
        Ok(self.existing.get(&cycle).cloned().unwrap_or_default())
    }

    fn report_payouts(&self, reports: &[PayoutReport]) -> Result<()> {
        self.payouts.lock().unwrap().extend_from_slice(reports);
        Ok(())
    }

    fn report_invalid_payouts(&self, recipes: &[PayoutRecipe]) -> Result<()> {
        self.invalid.lock().unwrap().extend_from_slice(recipes);
        Ok(())
    }

    fn report_cycle_summary(&self, summary: &CyclePayoutSummary) -> Result<()> {
        self.summaries.lock().unwrap().push(summary.clone());
        Ok(())
    }

    fn get_existing_cycle_summary(&self, cycle: i64) -> Result<Option<CyclePayoutSummary>> {
        Ok(self.summaries.lock().unwrap().iter().find(|s| s.cycle == cycle).cloned())
    }
}

pub fn delegator(address: &str, tez: i64) -> Delegator {
    Delegator {
        address: Address::from(address),
        delegated_balance: Mutez::from_tez(tez),
        ..Default::default()
    }
}

/// Baker with 1000 tez staked and delegated, three delegators
pub fn cycle_data() -> BakersCycleData {
    BakersCycleData {
        own_staked_balance: Mutez::from_tez(1_000),
        own_delegated_balance: Mutez::from_tez(1_000),
        block_delegated_rewards: Mutez::from_tez(90),
        endorsement_delegated_rewards: Mutez::from_tez(10),
        delegators_count: 3,
        delegators: vec![delegator(ALICE, 2_000), delegator(BOB, 1_000), delegator(CAROL, 1)],
        ..Default::default()
    }
}

pub fn configuration() -> RuntimeConfiguration {
    let mut configuration = RuntimeConfiguration::default();
    configuration.baker = Address::from(BAKER);
    configuration.payouts.fee = Portion::from_f64(0.1);
    configuration.payouts.minimum_payout_amount = Mutez::from_tez(1);
    configuration
}

pub fn engines(collector: FakeCollector) -> PayoutEngines {
    PayoutEngines::new()
        .with_collector(Arc::new(collector))
        .with_signer(Arc::new(FakeSigner))
}

pub fn recipe(delegator: &str, cycle: i64, amount: i64) -> PayoutRecipe {
    PayoutRecipe {
        baker: Address::from(BAKER),
        delegator: Address::from(delegator),
        recipient: Address::from(delegator),
        cycle,
        kind: PayoutKind::DelegatorReward,
        amount: Mutez::new(amount as i128),
        op_limits: Some(OpLimits {
            transaction_fee: 400,
            gas_limit: 1_100,
            deserialization_gas_limit: 2,
            ..Default::default()
        }),
        is_valid: true,
        tx_fee_collected: true,
        allocation_fee_collected: true,
        ..Default::default()
    }
}

pub fn blueprint(cycle: i64, payouts: Vec<PayoutRecipe>) -> CyclePayoutBlueprint {
    CyclePayoutBlueprint {
        cycle,
        summary: CyclePayoutSummary {
            cycle,
            ..Default::default()
        },
        payouts,
        batch_metadata_deserialization_gas_limit: 120,
    }
}
