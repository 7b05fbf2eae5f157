//! Integration tests for the prepare pipeline
//!
//! These tests cover reconciliation against stored reports, the
//! after-prepared hook and accumulation of repeated payouts.

mod common;

use bakepay_core::prelude::*;
use bakepay_pipeline::hooks::AfterPayoutsPreparedData;
use bakepay_pipeline::prepare::run_prepare;
use bakepay_pipeline::{prepare_payouts_of, HookRegistry, PayoutEngines, PreparePayoutsOptions};
use common::*;
use std::collections::HashMap;
use std::sync::Arc;

fn paid_report(recipe: &PayoutRecipe, op_hash: &str) -> PayoutReport {
    PayoutReport {
        op_hash: OpHash::new(op_hash),
        is_success: true,
        ..recipe.to_report()
    }
}

fn engines_with(collector: FakeCollector, reporter: RecordingReporter) -> PayoutEngines {
    engines(collector).with_reporter(Arc::new(reporter))
}

mod reconcile_tests {
    use super::*;

    #[test]
    fn test_paid_recipes_are_dropped() {
        let alice = recipe(ALICE, 100, 5_000_000);
        let bob = recipe(BOB, 100, 3_000_000);
        let reporter = RecordingReporter {
            existing: HashMap::from([(100, vec![paid_report(&alice, "")])]),
            ..Default::default()
        };

        let result = prepare_payouts_of(
            vec![blueprint(100, vec![alice, bob.clone()])],
            Arc::new(configuration()),
            engines_with(FakeCollector::default(), reporter),
            &PreparePayoutsOptions::default(),
        )
        .unwrap();

        assert_eq!(result.valid_payouts, vec![bob]);
        assert_eq!(result.reports_of_past_successful_payouts.len(), 1);
        assert_eq!(result.blueprints.len(), 1);
    }

    #[test]
    fn test_failed_operation_is_paid_again() {
        let alice = recipe(ALICE, 100, 5_000_000);
        let bob = recipe(BOB, 100, 3_000_000);
        let mut collector = FakeCollector::default();
        collector.statuses.insert(OpHash::new("ooFailed"), OperationStatus::Failed);
        collector.statuses.insert(OpHash::new("ooApplied"), OperationStatus::Applied);
        let reporter = RecordingReporter {
            existing: HashMap::from([(100, vec![paid_report(&alice, "ooFailed"), paid_report(&bob, "ooApplied")])]),
            ..Default::default()
        };

        let result = prepare_payouts_of(
            vec![blueprint(100, vec![alice.clone(), bob])],
            Arc::new(configuration()),
            engines_with(collector, reporter),
            &PreparePayoutsOptions::default(),
        )
        .unwrap();

        assert_eq!(result.valid_payouts, vec![alice]);
        assert_eq!(result.reports_of_past_successful_payouts[0].op_hash, OpHash::new("ooApplied"));
    }

    #[test]
    fn test_reports_of_other_bakers_are_ignored() {
        let alice = recipe(ALICE, 100, 5_000_000);
        let mut foreign = paid_report(&alice, "");
        foreign.baker = Address::from(BOB);
        let reporter = RecordingReporter {
            existing: HashMap::from([(100, vec![foreign])]),
            ..Default::default()
        };

        let result = prepare_payouts_of(
            vec![blueprint(100, vec![alice.clone()])],
            Arc::new(configuration()),
            engines_with(FakeCollector::default(), reporter),
            &PreparePayoutsOptions::default(),
        )
        .unwrap();
        assert_eq!(result.valid_payouts, vec![alice]);
    }

    #[test]
    fn test_invalid_recipes_are_split_out() {
        let mut invalid = recipe(CAROL, 100, 10);
        invalid.is_valid = false;
        invalid.kind = PayoutKind::Invalid;

        let result = prepare_payouts_of(
            vec![blueprint(100, vec![recipe(ALICE, 100, 5_000_000), invalid.clone()])],
            Arc::new(configuration()),
            engines_with(FakeCollector::default(), RecordingReporter::default()),
            &PreparePayoutsOptions::default(),
        )
        .unwrap();
        assert_eq!(result.valid_payouts.len(), 1);
        assert_eq!(result.invalid_payouts, vec![invalid]);
    }

    #[test]
    fn test_report_load_failure() {
        let mut reporter = MockReporter::new();
        reporter
            .expect_get_existing_reports()
            .returning(|_| Err(PayoutError::Reporter("disk on fire".to_string())));
        let engines = engines(FakeCollector::default()).with_reporter(Arc::new(reporter));

        let err = prepare_payouts_of(
            vec![blueprint(7, vec![recipe(ALICE, 7, 1)])],
            Arc::new(configuration()),
            engines,
            &PreparePayoutsOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PayoutError::ReportsLoadFailed { cycle: 7, .. }));
    }

    #[test]
    fn test_no_blueprints() {
        let err = prepare_payouts_of(
            Vec::new(),
            Arc::new(configuration()),
            engines_with(FakeCollector::default(), RecordingReporter::default()),
            &PreparePayoutsOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PayoutError::MissingPayoutBlueprint));
    }

    #[test]
    fn test_prepared_hook_sees_all_recipes() {
        let registry = HookRegistry::new().on(|data: &mut AfterPayoutsPreparedData| {
            assert_eq!(data.recipes.len(), 2);
            data.valid_payouts.retain(|p| p.delegator != Address::from(BOB));
            Ok(())
        });
        let engines = engines_with(FakeCollector::default(), RecordingReporter::default())
            .with_extensions(Arc::new(registry));

        let result = prepare_payouts_of(
            vec![blueprint(100, vec![recipe(ALICE, 100, 5), recipe(BOB, 100, 5)])],
            Arc::new(configuration()),
            engines,
            &PreparePayoutsOptions::default(),
        )
        .unwrap();
        assert_eq!(result.valid_payouts.len(), 1);
        assert_eq!(result.valid_payouts[0].delegator, Address::from(ALICE));
    }
}

mod accumulate_tests {
    use super::*;

    fn accumulate() -> PreparePayoutsOptions {
        PreparePayoutsOptions { accumulate: true }
    }

    #[test]
    fn test_repeated_payouts_are_combined() {
        let blueprints = vec![
            blueprint(100, vec![recipe(ALICE, 100, 5_000_000), recipe(BOB, 100, 1_000_000)]),
            blueprint(101, vec![recipe(ALICE, 101, 4_000_000)]),
        ];

        let result = prepare_payouts_of(
            blueprints,
            Arc::new(configuration()),
            engines_with(FakeCollector::default(), RecordingReporter::default()),
            &accumulate(),
        )
        .unwrap();

        assert_eq!(result.valid_payouts.len(), 2);
        assert_eq!(result.accumulated_payouts.len(), 1);
        let alice = &result.valid_payouts[0];
        let absorbed = &result.accumulated_payouts[0];
        assert_eq!(absorbed.kind, PayoutKind::Accumulated);
        assert_eq!(absorbed.cycle, 101);
        assert_eq!(absorbed.accumulated_details(), Some((alice.short_identifier(), 100)));

        // two charged transfers became one, the difference goes back to the delegator
        let fresh = alice.op_limits.unwrap();
        assert_eq!(
            alice.amount,
            Mutez::new(9_000_000).add_i64(2 * 400 - fresh.fees_without_allocation())
        );
    }

    #[test]
    fn test_accumulation_is_optional() {
        let blueprints = vec![
            blueprint(100, vec![recipe(ALICE, 100, 5_000_000)]),
            blueprint(101, vec![recipe(ALICE, 101, 4_000_000)]),
        ];
        let result = prepare_payouts_of(
            blueprints,
            Arc::new(configuration()),
            engines_with(FakeCollector::default(), RecordingReporter::default()),
            &PreparePayoutsOptions::default(),
        )
        .unwrap();
        assert_eq!(result.valid_payouts.len(), 2);
        assert!(result.accumulated_payouts.is_empty());
    }

    #[test]
    fn test_failed_estimate_moves_payout_to_invalid() {
        let mut collector = FakeCollector::default();
        collector.failing.insert(Address::from(BOB));
        let blueprints = vec![blueprint(100, vec![recipe(ALICE, 100, 5_000_000), recipe(BOB, 100, 1_000_000)])];

        let outcome = run_prepare(
            blueprints,
            Arc::new(configuration()),
            engines_with(collector, RecordingReporter::default()),
            &accumulate(),
        )
        .unwrap();
        assert!(outcome.is_ok());
        let data = &outcome.context.stage_data;
        assert_eq!(data.valid_payouts.len(), 1);
        assert_eq!(data.invalid_payouts.len(), 1);
        assert_eq!(data.invalid_payouts[0].note, "failed_to_estimate_tx_costs");
        assert_eq!(data.invalid_payouts[0].kind, PayoutKind::Invalid);
    }
}
