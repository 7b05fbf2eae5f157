//! Integration tests for the bundled engines
//!
//! These tests run the whole pipeline offline over the file-backed engines
//! and exercise the cycle monitor against a changing data directory.

use bakepay_core::prelude::*;
use bakepay_engines::collector::cycle_data_path;
use bakepay_engines::prelude::*;
use bakepay_engines::signer::verify_operation;
use bakepay_engines::ChainState;
use bakepay_pipeline::{
    execute_prepared_payouts, generate_payouts, prepare_payouts_of, ExecutePayoutsOptions,
    GeneratePayoutsOptions, PayoutEngines, PreparePayoutsOptions,
};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const BAKER: &str = "tz1P6WKJu2rcbxKiKRZHKQKmKrpC9TfW1AwM";
const ALICE: &str = "tz1X7U9XxVz6NDxL4DSZhijME61PW45bYUJE";
const BOB: &str = "tz1hZvgjekGo7DmQjWh7XnY5eLQD8wNYPczE";

fn write_cycle(data_dir: &Path, cycle: i64) {
    let cycle_data = BakersCycleData {
        own_staked_balance: Mutez::from_tez(1_000),
        own_delegated_balance: Mutez::from_tez(1_000),
        block_delegated_rewards: Mutez::from_tez(90),
        endorsement_delegated_rewards: Mutez::from_tez(10),
        delegators_count: 2,
        delegators: vec![
            Delegator {
                address: Address::from(ALICE),
                delegated_balance: Mutez::from_tez(2_000),
                ..Default::default()
            },
            Delegator {
                address: Address::from(BOB),
                delegated_balance: Mutez::from_tez(1_000),
                ..Default::default()
            },
        ],
        ..Default::default()
    };
    fs::create_dir_all(data_dir).unwrap();
    fs::write(cycle_data_path(data_dir, cycle), serde_json::to_vec(&cycle_data).unwrap()).unwrap();
}

fn write_chain_state(data_dir: &Path) {
    let state = ChainState {
        balances: HashMap::from([(Address::from(BAKER), Mutez::from_tez(10_000))]),
        revealed: HashSet::from([Address::from(BAKER)]),
        allocated: HashSet::from([Address::from(ALICE), Address::from(BOB)]),
        ..Default::default()
    };
    fs::write(data_dir.join("chain.json"), serde_json::to_vec(&state).unwrap()).unwrap();
}

fn configuration() -> RuntimeConfiguration {
    let mut configuration = RuntimeConfiguration::default();
    configuration.baker = Address::from(BAKER);
    configuration.payouts.fee = Portion::from_f64(0.1);
    configuration
}

struct Workspace {
    _dir: TempDir,
    collector: Arc<SimulatedCollector>,
    signer: Arc<InMemorySigner>,
    transactor: Arc<OutboxTransactor>,
    reporter: Arc<FsReporter>,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join("data");
        write_cycle(&data_dir, 100);
        write_chain_state(&data_dir);
        Self {
            collector: Arc::new(SimulatedCollector::open(&data_dir).unwrap()),
            signer: Arc::new(InMemorySigner::generate(Address::from(BAKER))),
            transactor: Arc::new(
                OutboxTransactor::new(dir.path().join("outbox"), OperationLimits::default()).unwrap(),
            ),
            reporter: Arc::new(FsReporter::new(dir.path().join("reports"))),
            _dir: dir,
        }
    }

    fn engines(&self) -> PayoutEngines {
        PayoutEngines::new()
            .with_collector(self.collector.clone())
            .with_signer(self.signer.clone())
            .with_transactor(self.transactor.clone())
            .with_reporter(self.reporter.clone())
    }

    fn generate(&self) -> CyclePayoutBlueprint {
        let options = GeneratePayoutsOptions {
            cycle: 100,
            ..Default::default()
        };
        generate_payouts(Arc::new(configuration()), self.engines(), &options).unwrap()
    }

    fn prepare(&self, blueprint: CyclePayoutBlueprint) -> PreparePayoutsResult {
        prepare_payouts_of(
            vec![blueprint],
            Arc::new(configuration()),
            self.engines(),
            &PreparePayoutsOptions::default(),
        )
        .unwrap()
    }

    fn pay(&self, blueprint: CyclePayoutBlueprint) -> ExecutePayoutsResult {
        let (result, status) = execute_prepared_payouts(
            self.prepare(blueprint),
            Arc::new(configuration()),
            self.engines(),
            &ExecutePayoutsOptions::default(),
        );
        status.unwrap();
        result
    }
}

mod offline_tests {
    use super::*;

    #[test]
    fn test_offline_run_writes_outbox_and_reports() {
        let workspace = Workspace::new();
        let blueprint = workspace.generate();
        assert_eq!(blueprint.batch_metadata_deserialization_gas_limit, 96);
        assert_eq!(blueprint.payouts.iter().filter(|p| p.is_valid).count(), 2);

        let result = workspace.pay(blueprint);
        assert_eq!(result.success_count(), 1);
        assert_eq!(result.paid_delegators, 2);

        let pending = workspace.transactor.pending_operations().unwrap();
        assert_eq!(pending, vec![result.batch_results[0].op_hash.clone()]);
        let op = workspace.transactor.read_operation(&pending[0]).unwrap();
        assert_eq!(op.source, Address::from(BAKER));
        assert_eq!(op.contents.len(), 2);
        assert!(verify_operation(&workspace.signer.key(), &op).unwrap());

        let reports = workspace.reporter.get_existing_reports(100).unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.is_success && r.op_hash == pending[0]));
        let summary = workspace.reporter.get_existing_cycle_summary(100).unwrap().unwrap();
        assert_eq!(summary.paid_delegators, 2);
    }

    #[test]
    fn test_applied_payouts_are_not_paid_twice() {
        let workspace = Workspace::new();
        let blueprint = workspace.generate();
        let result = workspace.pay(blueprint.clone());
        workspace
            .collector
            .record_operation(result.batch_results[0].op_hash.clone(), OperationStatus::Applied);

        let preparation = workspace.prepare(blueprint);
        assert!(preparation.valid_payouts.is_empty());
        assert_eq!(preparation.reports_of_past_successful_payouts.len(), 2);
    }

    #[test]
    fn test_operations_missing_on_chain_are_paid_again() {
        let workspace = Workspace::new();
        let blueprint = workspace.generate();
        workspace.pay(blueprint.clone());

        // the chain snapshot never saw the outbox operation
        let preparation = workspace.prepare(blueprint);
        assert_eq!(preparation.valid_payouts.len(), 2);
    }

    #[test]
    fn test_unfunded_baker_cannot_generate() {
        let workspace = Workspace::new();
        workspace.collector.set_balance(Address::from(BAKER), Mutez::new(10));
        let options = GeneratePayoutsOptions {
            cycle: 100,
            ..Default::default()
        };
        let err = generate_payouts(Arc::new(configuration()), workspace.engines(), &options).unwrap_err();
        assert!(matches!(err, PayoutError::InsufficientBalance { .. }));
    }
}

mod monitor_tests {
    use super::*;

    const POLL: Duration = Duration::from_millis(20);

    fn monitor(data_dir: &Path, cancellation: CancellationToken) -> PollingCycleMonitor {
        let collector: Arc<dyn Collector> = Arc::new(SimulatedCollector::open(data_dir).unwrap());
        PollingCycleMonitor::spawn(collector, POLL, cancellation)
    }

    #[tokio::test]
    async fn test_returns_newer_cycle() {
        let dir = TempDir::new().unwrap();
        write_cycle(dir.path(), 5);
        let monitor = monitor(dir.path(), CancellationToken::new());

        let cycle = tokio::time::timeout(Duration::from_secs(5), monitor.wait_for_next_completed_cycle(4))
            .await
            .unwrap();
        assert_eq!(cycle, Some(5));
        assert_eq!(monitor.latest(), Some(5));
    }

    #[tokio::test]
    async fn test_waits_for_cycle_to_complete() {
        let dir = TempDir::new().unwrap();
        write_cycle(dir.path(), 5);
        let monitor = monitor(dir.path(), CancellationToken::new());

        let data_dir = dir.path().to_path_buf();
        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            write_cycle(&data_dir, 6);
        });
        let cycle = tokio::time::timeout(Duration::from_secs(5), monitor.wait_for_next_completed_cycle(5))
            .await
            .unwrap();
        assert_eq!(cycle, Some(6));
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancellation_stops_waiting() {
        let dir = TempDir::new().unwrap();
        write_cycle(dir.path(), 5);
        let cancellation = CancellationToken::new();
        let monitor = monitor(dir.path(), cancellation.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancellation.cancel();
        });
        let cycle = tokio::time::timeout(Duration::from_secs(5), monitor.wait_for_next_completed_cycle(5))
            .await
            .unwrap();
        assert_eq!(cycle, None);
        canceller.await.unwrap();

        tokio::time::sleep(POLL * 3).await;
        assert!(!monitor.is_running());
    }
}
