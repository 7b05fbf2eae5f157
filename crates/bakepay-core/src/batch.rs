//! Recipe batches and batch execution results

use crate::address::OpHash;
use crate::constants::{
    DEFAULT_BATCHING_OPERATION_DATA_BUFFER, DEFAULT_HARD_GAS_LIMIT_PER_OPERATION,
    DEFAULT_HARD_STORAGE_LIMIT_PER_OPERATION, DEFAULT_MAX_OPERATION_DATA_LENGTH,
};
use crate::operation::{transfer_encoded_size, Limits};
use crate::recipe::PayoutRecipe;
use crate::report::PayoutReport;
use serde::{Deserialize, Serialize};

/// Chain ceilings for a single operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationLimits {
    pub hard_gas_limit_per_operation: i64,
    pub hard_storage_limit_per_operation: i64,
    pub max_operation_data_length: i64,
}

impl Default for OperationLimits {
    fn default() -> Self {
        Self {
            hard_gas_limit_per_operation: DEFAULT_HARD_GAS_LIMIT_PER_OPERATION,
            hard_storage_limit_per_operation: DEFAULT_HARD_STORAGE_LIMIT_PER_OPERATION,
            max_operation_data_length: DEFAULT_MAX_OPERATION_DATA_LENGTH,
        }
    }
}

/// Ordered recipes destined for one operation
pub type RecipeBatch = Vec<PayoutRecipe>;

/// Batch being filled under operation limits
#[derive(Clone, Debug)]
pub struct BatchBlueprint {
    limits: OperationLimits,
    payouts: Vec<PayoutRecipe>,
    used_gas: i64,
    used_storage: i64,
    used_bytes: i64,
}

impl BatchBlueprint {
    /// Metadata deserialization gas and the header/signature byte reserve
    /// are charged once per operation.
    pub fn new(limits: OperationLimits, metadata_deserialization_gas: i64) -> Self {
        Self {
            limits,
            payouts: Vec::new(),
            used_gas: metadata_deserialization_gas,
            used_storage: 0,
            used_bytes: DEFAULT_BATCHING_OPERATION_DATA_BUFFER,
        }
    }

    /// Adds the payout when it fits, returns whether it did
    pub fn add_payout(&mut self, payout: PayoutRecipe) -> bool {
        let op_limits = payout.op_limits.unwrap_or_default();
        let gas = op_limits.gas_limit + op_limits.deserialization_gas_limit;
        let storage = op_limits.storage_limit;
        let bytes = transfer_encoded_size(
            &payout,
            Limits {
                fee: op_limits.transaction_fee,
                gas_limit: gas,
                storage_limit: storage,
            },
        );

        if self.used_gas + gas > self.limits.hard_gas_limit_per_operation
            || self.used_storage + storage > self.limits.hard_storage_limit_per_operation
            || self.used_bytes + bytes > self.limits.max_operation_data_length
        {
            return false;
        }

        self.used_gas += gas;
        self.used_storage += storage;
        self.used_bytes += bytes;
        self.payouts.push(payout);
        true
    }

    pub fn len(&self) -> usize {
        self.payouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payouts.is_empty()
    }

    pub fn into_batch(self) -> RecipeBatch {
        self.payouts
    }
}

/// Outcome of executing one batch
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub payouts: Vec<PayoutRecipe>,
    #[serde(default, skip_serializing_if = "OpHash::is_empty")]
    pub op_hash: OpHash,
    pub is_success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchResult {
    pub fn success(payouts: Vec<PayoutRecipe>, op_hash: OpHash) -> Self {
        Self {
            payouts,
            op_hash,
            is_success: true,
            error: None,
        }
    }

    pub fn failed(payouts: Vec<PayoutRecipe>, error: impl ToString) -> Self {
        Self {
            payouts,
            op_hash: OpHash::default(),
            is_success: false,
            error: Some(error.to_string()),
        }
    }

    pub fn failed_with_op_hash(payouts: Vec<PayoutRecipe>, op_hash: OpHash, error: impl ToString) -> Self {
        Self {
            op_hash,
            ..Self::failed(payouts, error)
        }
    }

    /// Nothing was broadcast
    pub fn dry_run(payouts: Vec<PayoutRecipe>) -> Self {
        Self {
            payouts,
            op_hash: OpHash::default(),
            is_success: true,
            error: None,
        }
    }

    /// One report per payout; failed batches carry the error as note
    pub fn to_reports(&self) -> Vec<PayoutReport> {
        self.payouts
            .iter()
            .map(|payout| {
                let mut report = payout.to_report();
                if !self.is_success {
                    report.note = self.error.clone().unwrap_or_default();
                }
                report.op_hash = self.op_hash.clone();
                report.is_success = self.is_success;
                report
            })
            .collect()
    }
}

/// Outcome of the execute pipeline
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutePayoutsResult {
    pub batch_results: Vec<BatchResult>,
    pub paid_delegators: usize,
}

impl ExecutePayoutsResult {
    pub fn success_count(&self) -> usize {
        self.batch_results.iter().filter(|b| b.is_success).count()
    }

    pub fn failed_count(&self) -> usize {
        self.batch_results.iter().filter(|b| !b.is_success).count()
    }

    pub fn to_reports(&self) -> Vec<PayoutReport> {
        self.batch_results.iter().flat_map(|b| b.to_reports()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::money::Mutez;
    use crate::recipe::OpLimits;

    fn payout(gas: i64, storage: i64) -> PayoutRecipe {
        PayoutRecipe {
            recipient: Address::from("tz1X7U9XxVz6NDxL4DSZhijME61PW45bYUJE"),
            amount: Mutez::new(1_000_000),
            op_limits: Some(OpLimits {
                gas_limit: gas,
                storage_limit: storage,
                deserialization_gas_limit: 2,
                transaction_fee: 400,
                ..Default::default()
            }),
            is_valid: true,
            ..Default::default()
        }
    }

    fn limits(gas: i64) -> OperationLimits {
        OperationLimits {
            hard_gas_limit_per_operation: gas,
            ..Default::default()
        }
    }

    #[test]
    fn test_metadata_gas_is_reserved_once() {
        let mut blueprint = BatchBlueprint::new(limits(3_000), 900);
        assert!(blueprint.add_payout(payout(1_000, 0)));
        assert!(!blueprint.add_payout(payout(1_100, 0)));
        assert!(blueprint.add_payout(payout(1_000, 0)));
        assert_eq!(blueprint.len(), 2);
    }

    #[test]
    fn test_storage_ceiling() {
        let mut blueprint = BatchBlueprint::new(
            OperationLimits {
                hard_storage_limit_per_operation: 500,
                ..Default::default()
            },
            0,
        );
        assert!(blueprint.add_payout(payout(1_000, 257)));
        assert!(!blueprint.add_payout(payout(1_000, 257)));
    }

    #[test]
    fn test_failed_batch_reports() {
        let result = BatchResult::failed_with_op_hash(vec![payout(1, 0)], OpHash::new("oo1"), "backtracked");
        let reports = result.to_reports();
        assert_eq!(reports.len(), 1);
        assert!(!reports[0].is_success);
        assert_eq!(reports[0].note, "backtracked");
        assert_eq!(reports[0].op_hash, OpHash::new("oo1"));
    }
}
