//! Matching recipes against reports of earlier runs

use bakepay_core::address::{Address, OpHash};
use bakepay_core::engines::{Collector, OperationStatus};
use bakepay_core::enums::{PayoutKind, TxKind};
use bakepay_core::recipe::PayoutRecipe;
use bakepay_core::report::PayoutReport;
use indexmap::IndexMap;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Identity under which recipes and reports are matched
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct PayoutKey {
    kind: PayoutKind,
    tx_kind: TxKind,
    delegator: Address,
    recipient: Address,
}

impl PayoutKey {
    fn of_report(report: &PayoutReport) -> Self {
        Self {
            kind: report.kind.normalized(),
            tx_kind: report.tx_kind,
            delegator: report.delegator_or_recipient().clone(),
            recipient: report.recipient.clone(),
        }
    }

    fn of_recipe(recipe: &PayoutRecipe) -> Self {
        let delegator = if recipe.delegator.is_empty() {
            &recipe.recipient
        } else {
            &recipe.delegator
        };
        Self {
            kind: recipe.kind.normalized(),
            tx_kind: recipe.tx_kind,
            delegator: delegator.clone(),
            recipient: recipe.recipient.clone(),
        }
    }
}

/// Decides whether a report proves a payout, asking the collector once per
/// op hash
struct PaymentCheck<'a> {
    collector: Option<&'a dyn Collector>,
    statuses: HashMap<OpHash, Option<bool>>,
}

impl<'a> PaymentCheck<'a> {
    fn new(collector: Option<&'a dyn Collector>) -> Self {
        Self {
            collector,
            statuses: HashMap::new(),
        }
    }

    /// `Some(paid)` when the chain settles it, `None` when it cannot tell
    fn chain_status(&mut self, op_hash: &OpHash) -> Option<bool> {
        let collector = self.collector?;
        if let Some(status) = self.statuses.get(op_hash) {
            return *status;
        }

        debug!(collector = collector.id(), op_hash = %op_hash, "checking whether operation was applied");
        let status = match collector.was_operation_applied(op_hash) {
            Ok(OperationStatus::Applied) => Some(true),
            Ok(OperationStatus::Failed) | Ok(OperationStatus::NotExists) => Some(false),
            Ok(OperationStatus::Unknown) => None,
            Err(e) => {
                warn!(op_hash = %op_hash, error = %e, "operation status check failed, using stored status");
                None
            }
        };
        self.statuses.insert(op_hash.clone(), status);
        status
    }

    fn is_paid(&mut self, report: &PayoutReport) -> bool {
        if report.op_hash.is_empty() {
            return report.is_success;
        }
        self.chain_status(&report.op_hash).unwrap_or(report.is_success)
    }
}

/// Split `recipes` into those still to pay and the reports proving the rest
/// were paid.
///
/// Reports with an op hash are checked against the chain when a collector is
/// available; an operation the chain reports as failed or missing never
/// counts as paid. Without a verdict the stored success flag decides.
pub fn filter_recipes_by_reports(
    recipes: Vec<PayoutRecipe>,
    reports: &[PayoutReport],
    collector: Option<&dyn Collector>,
) -> (Vec<PayoutRecipe>, Vec<PayoutReport>) {
    if collector.is_none() {
        debug!("no collector, filtering recipes by stored report status only");
    }

    let mut check = PaymentCheck::new(collector);
    let mut paid: IndexMap<PayoutKey, PayoutReport> = IndexMap::new();
    for report in reports {
        if check.is_paid(report) {
            paid.insert(PayoutKey::of_report(report), report.clone());
        }
    }

    let unpaid = recipes
        .into_iter()
        .filter(|recipe| !paid.contains_key(&PayoutKey::of_recipe(recipe)))
        .collect();
    (unpaid, paid.into_values().collect())
}
