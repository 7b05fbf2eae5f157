//! # Simulated collector
//!
//! File-backed view of the chain for offline runs and tests.
//!
//! ```text
//! <data_dir>/
//! ├── chain.json        balances, reveals, allocations, operation statuses
//! ├── cycle-512.json    BakersCycleData of cycle 512
//! └── cycle-513.json
//! ```
//!
//! Simulation applies a flat [`SimulationCostModel`] per content instead of
//! running any contract code. A transfer fails when it would overdraw the
//! source or when it sends nothing to an implicit account.

use bakepay_core::constants::{ALLOCATION_STORAGE, STORAGE_COST_PER_BYTE};
use bakepay_core::engines::{Collector, OperationStatus};
use bakepay_core::operation::{ContentResult, ContentStatus, Operation, OperationContent, SimulationReceipt};
use bakepay_core::{Address, BakersCycleData, Mutez, OpHash, PayoutError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

const CHAIN_STATE_FILE: &str = "chain.json";
const CYCLE_FILE_PREFIX: &str = "cycle-";
const DEFAULT_PROTOCOL: &str = "simulated";

/// Path of the staking data of `cycle` under `data_dir`
pub fn cycle_data_path(data_dir: &Path, cycle: i64) -> PathBuf {
    data_dir.join(format!("{}{}.json", CYCLE_FILE_PREFIX, cycle))
}

/// Milligas and storage charged per simulated content
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationCostModel {
    /// Native transfer to an implicit account
    pub transfer_milligas: i64,
    /// Native transfer to a contract
    pub contract_call_milligas: i64,
    pub fa_transfer_milligas: i64,
    /// Charged once per operation on its first content
    pub batch_metadata_milligas: i64,
    /// Storage growth of a token ledger entry
    pub fa_storage_diff: i64,
}

impl Default for SimulationCostModel {
    fn default() -> Self {
        Self {
            transfer_milligas: 168_721,
            contract_call_milligas: 1_521_000,
            fa_transfer_milligas: 2_846_000,
            batch_metadata_milligas: 96_000,
            fa_storage_diff: 67,
        }
    }
}

/// Account and operation state read from `chain.json`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainState {
    /// Pinned last completed cycle, otherwise the newest cycle file counts
    pub last_completed_cycle: Option<i64>,
    pub protocol: Option<String>,
    pub balances: HashMap<Address, Mutez>,
    pub revealed: HashSet<Address>,
    pub allocated: HashSet<Address>,
    pub operations: HashMap<OpHash, OperationStatus>,
}

/// Collector over cycle files and a chain state snapshot
pub struct SimulatedCollector {
    data_dir: PathBuf,
    cost_model: SimulationCostModel,
    state: RwLock<ChainState>,
    /// Whether a chain snapshot backs operation lookups
    tracks_operations: bool,
}

impl SimulatedCollector {
    /// Open `data_dir`, loading `chain.json` when present
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        let state = read_json::<ChainState>(&data_dir.join(CHAIN_STATE_FILE))?;
        let tracks_operations = state.is_some();
        Ok(Self {
            data_dir,
            cost_model: SimulationCostModel::default(),
            state: RwLock::new(state.unwrap_or_default()),
            tracks_operations,
        })
    }

    pub fn with_cost_model(mut self, cost_model: SimulationCostModel) -> Self {
        self.cost_model = cost_model;
        self
    }

    pub fn with_state(mut self, state: ChainState) -> Self {
        self.state = RwLock::new(state);
        self.tracks_operations = true;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Re-read `chain.json`, keeping the current state when it is gone
    pub fn refresh(&mut self) -> Result<()> {
        if let Some(state) = read_json::<ChainState>(&self.data_dir.join(CHAIN_STATE_FILE))? {
            *self.state.write() = state;
            self.tracks_operations = true;
        }
        Ok(())
    }

    pub fn set_balance(&self, address: Address, balance: Mutez) {
        self.state.write().balances.insert(address, balance);
    }

    pub fn record_operation(&self, op_hash: OpHash, status: OperationStatus) {
        self.state.write().operations.insert(op_hash, status);
    }

    /// Cycles with a data file, ascending
    pub fn available_cycles(&self) -> Result<Vec<i64>> {
        let entries = match fs::read_dir(&self.data_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut cycles: Vec<i64> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                name.strip_prefix(CYCLE_FILE_PREFIX)?
                    .strip_suffix(".json")?
                    .parse()
                    .ok()
            })
            .collect();
        cycles.sort_unstable();
        Ok(cycles)
    }

    fn simulate_content(
        &self,
        content: &OperationContent,
        first: bool,
        remaining: &mut Mutez,
        allocated: &HashSet<Address>,
    ) -> ContentResult {
        let model = &self.cost_model;
        let metadata = if first { model.batch_metadata_milligas } else { 0 };
        let mut result = ContentResult {
            consumed_milligas: metadata,
            ..Default::default()
        };

        match content {
            OperationContent::Transfer {
                destination,
                amount,
                ..
            } => {
                if destination.is_contract() {
                    result.consumed_milligas += model.contract_call_milligas;
                } else {
                    if amount.is_zero() {
                        return failed(result, "empty_transaction");
                    }
                    result.consumed_milligas += model.transfer_milligas;
                    if !allocated.contains(destination) {
                        result.allocated_destination = true;
                        result.paid_storage_size_diff = ALLOCATION_STORAGE;
                        result.allocation_burn = ALLOCATION_STORAGE * STORAGE_COST_PER_BYTE;
                    }
                }
                if *amount > *remaining {
                    return failed(result, "balance_too_low");
                }
                *remaining -= *amount;
            }
            OperationContent::Fa12Transfer { .. } | OperationContent::Fa2Transfer { .. } => {
                result.consumed_milligas += model.fa_transfer_milligas;
                result.paid_storage_size_diff = model.fa_storage_diff;
                result.storage_burn = model.fa_storage_diff * STORAGE_COST_PER_BYTE;
            }
        }
        result
    }
}

fn failed(mut result: ContentResult, error: &str) -> ContentResult {
    result.status = ContentStatus::Failed;
    result.errors.push(error.to_string());
    result
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>> {
    match fs::read(path) {
        Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl Collector for SimulatedCollector {
    fn id(&self) -> &str {
        "simulated"
    }

    fn get_cycle_staking_data(&self, baker: &Address, cycle: i64) -> Result<BakersCycleData> {
        let path = cycle_data_path(&self.data_dir, cycle);
        debug!(baker = %baker, cycle, path = %path.display(), "Loading cycle data");
        read_json(&path)?.ok_or(PayoutError::NoCycleDataAvailable(cycle))
    }

    fn get_last_completed_cycle(&self) -> Result<i64> {
        if let Some(cycle) = self.state.read().last_completed_cycle {
            return Ok(cycle);
        }
        self.available_cycles()?.last().copied().ok_or_else(|| {
            PayoutError::Collector(format!("no cycle data in {}", self.data_dir.display()))
        })
    }

    fn simulate(&self, op: &Operation, _public_key: &str) -> Result<SimulationReceipt> {
        let state = self.state.read();
        let mut remaining = state.balances.get(&op.source).copied().unwrap_or(Mutez::ZERO);
        let contents = op
            .contents
            .iter()
            .enumerate()
            .map(|(i, content)| self.simulate_content(content, i == 0, &mut remaining, &state.allocated))
            .collect();
        Ok(SimulationReceipt { contents })
    }

    fn is_revealed(&self, address: &Address) -> Result<bool> {
        Ok(self.state.read().revealed.contains(address))
    }

    fn was_operation_applied(&self, op_hash: &OpHash) -> Result<OperationStatus> {
        let state = self.state.read();
        Ok(match state.operations.get(op_hash) {
            Some(status) => *status,
            None if self.tracks_operations => OperationStatus::NotExists,
            None => OperationStatus::Unknown,
        })
    }

    fn get_balance(&self, address: &Address) -> Result<Mutez> {
        Ok(self.state.read().balances.get(address).copied().unwrap_or(Mutez::ZERO))
    }

    fn get_current_protocol(&self) -> Result<String> {
        Ok(self
            .state
            .read()
            .protocol
            .clone()
            .unwrap_or_else(|| DEFAULT_PROTOCOL.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const BAKER: &str = "tz1P6WKJu2rcbxKiKRZHKQKmKrpC9TfW1AwM";
    const ALICE: &str = "tz1X7U9XxVz6NDxL4DSZhijME61PW45bYUJE";
    const CONTRACT: &str = "KT1Hkg6qgV3VykjgUXKbWcU3h6oJ1qVxUxZV";

    fn funded(balance: i64) -> ChainState {
        ChainState {
            balances: HashMap::from([(Address::from(BAKER), Mutez::from_tez(balance))]),
            allocated: HashSet::from([Address::from(ALICE)]),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_cycle_is_no_data() {
        let dir = TempDir::new().unwrap();
        let collector = SimulatedCollector::open(dir.path()).unwrap();
        let err = collector
            .get_cycle_staking_data(&Address::from(BAKER), 42)
            .unwrap_err();
        assert!(err.is_no_data());
    }

    #[test]
    fn test_last_completed_cycle_from_files() {
        let dir = TempDir::new().unwrap();
        for cycle in [7, 12, 9] {
            fs::write(cycle_data_path(dir.path(), cycle), "{}").unwrap();
        }
        fs::write(dir.path().join("cycle-notes.json"), "{}").unwrap();
        let collector = SimulatedCollector::open(dir.path()).unwrap();
        assert_eq!(collector.available_cycles().unwrap(), vec![7, 9, 12]);
        assert_eq!(collector.get_last_completed_cycle().unwrap(), 12);
    }

    #[test]
    fn test_simulation_costs() {
        let dir = TempDir::new().unwrap();
        let collector = SimulatedCollector::open(dir.path()).unwrap().with_state(funded(100));
        let op = Operation::new(Address::from(BAKER))
            .with_transfer(Address::from(ALICE), Mutez::from_tez(1))
            .with_transfer(Address::from("tz1hZvgjekGo7DmQjWh7XnY5eLQD8wNYPczE"), Mutez::from_tez(1))
            .with_transfer(Address::from(CONTRACT), Mutez::from_tez(1));

        let receipt = collector.simulate(&op, "edpk").unwrap();
        assert!(receipt.is_success());
        let model = SimulationCostModel::default();
        assert_eq!(
            receipt.contents[0].consumed_milligas,
            model.transfer_milligas + model.batch_metadata_milligas
        );
        assert!(!receipt.contents[0].allocated_destination);
        assert!(receipt.contents[1].allocated_destination);
        assert_eq!(receipt.contents[1].allocation_burn, 64_250);
        assert_eq!(receipt.contents[2].consumed_milligas, model.contract_call_milligas);
    }

    #[test]
    fn test_simulation_overdraft_fails() {
        let dir = TempDir::new().unwrap();
        let collector = SimulatedCollector::open(dir.path()).unwrap().with_state(funded(1));
        let op = Operation::new(Address::from(BAKER))
            .with_transfer(Address::from(ALICE), Mutez::from_tez(1))
            .with_transfer(Address::from(ALICE), Mutez::new(1));

        let receipt = collector.simulate(&op, "edpk").unwrap();
        assert!(!receipt.is_success());
        assert_eq!(receipt.contents[0].status, ContentStatus::Applied);
        assert!(receipt.error().unwrap().contains("balance_too_low"));
    }

    #[test]
    fn test_operation_status_needs_snapshot() {
        let dir = TempDir::new().unwrap();
        let collector = SimulatedCollector::open(dir.path()).unwrap();
        let hash = OpHash::new("ooMissing");
        assert_eq!(collector.was_operation_applied(&hash).unwrap(), OperationStatus::Unknown);

        let collector = collector.with_state(ChainState::default());
        assert_eq!(collector.was_operation_applied(&hash).unwrap(), OperationStatus::NotExists);
        collector.record_operation(hash.clone(), OperationStatus::Applied);
        assert_eq!(collector.was_operation_applied(&hash).unwrap(), OperationStatus::Applied);
    }

    #[test]
    fn test_chain_state_file() {
        let dir = TempDir::new().unwrap();
        let state = ChainState {
            revealed: HashSet::from([Address::from(BAKER)]),
            protocol: Some("PtParisB".to_string()),
            ..funded(5)
        };
        fs::write(dir.path().join(CHAIN_STATE_FILE), serde_json::to_vec(&state).unwrap()).unwrap();

        let collector = SimulatedCollector::open(dir.path()).unwrap();
        assert!(collector.is_revealed(&Address::from(BAKER)).unwrap());
        assert!(!collector.is_revealed(&Address::from(ALICE)).unwrap());
        assert_eq!(collector.get_balance(&Address::from(BAKER)).unwrap(), Mutez::from_tez(5));
        assert_eq!(collector.get_current_protocol().unwrap(), "PtParisB");
    }
}
