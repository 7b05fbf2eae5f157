//! Transaction cost estimation by simulation
//!
//! Transfers are simulated in chunks, each chunk bracketed by two burn
//! transfers so the per-operation metadata overhead lands on the brackets:
//!
//! ```text
//! [burn] [tx 0] [tx 1] ... [tx n-1] [burn]
//!   │      └──── costs[1..=n] ────┘    │
//!   └─ carries metadata deserialization gas
//! ```
//!
//! A chunk that fails as a whole is retried one transfer at a time so a
//! single bad transfer only invalidates itself.

use bakepay_core::address::Address;
use bakepay_core::config::RuntimeConfiguration;
use bakepay_core::constants::ALLOCATION_STORAGE;
use bakepay_core::engines::Collector;
use bakepay_core::error::{PayoutError, Result};
use bakepay_core::money::Mutez;
use bakepay_core::operation::{estimate_transaction_fee, transfer_encoded_size, Costs, Limits, Operation};
use bakepay_core::recipe::{OpLimits, TransferArgs};
use tracing::{debug, warn};

/// Amount of the bracketing burn transfers
const BURN_AMOUNT: i128 = 1;

pub struct EstimationContext<'a> {
    /// Encoded public key the simulation runs under
    pub payout_key: &'a str,
    pub source: &'a Address,
    pub collector: &'a dyn Collector,
    pub configuration: &'a RuntimeConfiguration,
}

/// Estimated limits of one transfer, or why they could not be estimated
#[derive(Debug)]
pub struct EstimateResult<T> {
    pub transaction: T,
    pub result: Result<OpLimits>,
}

impl<T> EstimateResult<T> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

fn build_op_for_estimation<T: TransferArgs>(source: &Address, batch: &[T], inject_burn: bool) -> Result<Operation> {
    let mut op = Operation::new(source.clone());
    if inject_burn {
        op = op.with_transfer(Address::burn(), Mutez::new(BURN_AMOUNT));
    }
    for transfer in batch {
        op.inject_transfer(transfer)?;
    }
    if inject_burn {
        op = op.with_transfer(Address::burn(), Mutez::new(BURN_AMOUNT));
    }
    Ok(op)
}

fn simulate_costs<T: TransferArgs>(ctx: &EstimationContext<'_>, batch: &[T]) -> Result<Vec<Costs>> {
    let op = build_op_for_estimation(ctx.source, batch, true)?;
    let receipt = ctx.collector.simulate(&op, ctx.payout_key)?;
    if !receipt.is_success() {
        return Err(PayoutError::Collector(
            receipt.error().unwrap_or_else(|| "simulation failed".to_string()),
        ));
    }
    let costs = receipt.costs();
    if costs.len() != batch.len() + 2 {
        return Err(PayoutError::Collector(format!(
            "simulation returned {} costs for {} contents",
            costs.len(),
            batch.len() + 2
        )));
    }
    // drop the brackets
    Ok(costs[1..costs.len() - 1].to_vec())
}

/// Limits for `transfer` given its simulated costs and the configured buffers
pub fn limits_from_costs<T: TransferArgs + ?Sized>(
    transfer: &T,
    costs: &Costs,
    configuration: &RuntimeConfiguration,
) -> OpLimits {
    let payouts = &configuration.payouts;
    let gas_limit = costs.gas_used + payouts.transaction_gas_limit_buffer;
    let deserialization_gas_limit = payouts.transaction_deserialization_gas_buffer;
    let storage_limit = costs.storage_used + if costs.allocated { ALLOCATION_STORAGE } else { 0 };

    let mut fee_buffer = payouts.transaction_fee_buffer;
    if transfer.tx_kind().is_fa() || transfer.destination().is_contract() {
        fee_buffer += payouts.kt_transaction_fee_buffer;
    }

    let gas = gas_limit + deserialization_gas_limit;
    // the fee is part of the encoded content, so size it twice
    let mut fee = 0;
    for _ in 0..2 {
        let size = transfer_encoded_size(
            transfer,
            Limits {
                fee,
                gas_limit: gas,
                storage_limit,
            },
        );
        fee = estimate_transaction_fee(size, gas, fee_buffer);
    }

    OpLimits {
        transaction_fee: fee,
        storage_limit,
        gas_limit,
        deserialization_gas_limit,
        allocation_burn: costs.allocation_burn,
        storage_burn: costs.storage_burn,
    }
}

fn estimate_one<T: TransferArgs>(ctx: &EstimationContext<'_>, transfer: &T) -> Result<OpLimits> {
    let costs = simulate_costs(ctx, std::slice::from_ref(transfer))?;
    let costs = costs
        .first()
        .ok_or_else(|| PayoutError::Collector("simulation returned no costs".into()))?;
    Ok(limits_from_costs(transfer, costs, ctx.configuration))
}

/// Estimate every transfer; results keep the input order
pub fn estimate_transaction_fees<T: TransferArgs>(
    transactions: Vec<T>,
    ctx: &EstimationContext<'_>,
) -> Vec<EstimateResult<T>> {
    let chunk_size = ctx.configuration.payouts.simulation_batch_size.max(1);
    let mut results = Vec::with_capacity(transactions.len());
    let mut pending = transactions.into_iter().peekable();

    while pending.peek().is_some() {
        let chunk: Vec<T> = pending.by_ref().take(chunk_size).collect();
        match simulate_costs(ctx, &chunk) {
            Ok(costs) => {
                for (transaction, costs) in chunk.into_iter().zip(costs.iter()) {
                    let limits = limits_from_costs(&transaction, costs, ctx.configuration);
                    results.push(EstimateResult {
                        transaction,
                        result: Ok(limits),
                    });
                }
            }
            Err(e) => {
                debug!(error = %e, size = chunk.len(), "batch estimation failed, estimating one by one");
                for transaction in chunk {
                    let result = estimate_one(ctx, &transaction);
                    if let Err(e) = &result {
                        warn!(recipient = %transaction.destination(), error = %e, "failed to estimate transaction costs");
                    }
                    results.push(EstimateResult { transaction, result });
                }
            }
        }
    }
    results
}

/// Gas charged once per operation for deserializing its metadata.
///
/// # Panics
///
/// When the collector returns fewer than two costs for the bracketed empty
/// operation, or the derived value is negative.
pub fn estimate_batch_metadata_deserialization_gas(ctx: &EstimationContext<'_>) -> Result<i64> {
    let empty: [bakepay_core::recipe::PayoutRecipe; 0] = [];
    let op = build_op_for_estimation(ctx.source, &empty, true)?;
    let receipt = ctx
        .collector
        .simulate(&op, ctx.payout_key)
        .map_err(|e| PayoutError::FailedToEstimateSerializationGasLimit(e.to_string()))?;
    if !receipt.is_success() {
        return Err(PayoutError::FailedToEstimateSerializationGasLimit(
            receipt.error().unwrap_or_else(|| "simulation failed".to_string()),
        ));
    }

    let costs = receipt.costs();
    if costs.len() < 2 {
        panic!(
            "partial estimate: expected at least 2 costs for a bracketed operation, got {} ({:?})",
            costs.len(),
            costs
        );
    }
    let gas = costs[0].gas_used - costs[costs.len() - 1].gas_used;
    if gas < 0 {
        panic!(
            "unexpected deserialization limit {} (first {:?}, last {:?})",
            gas,
            costs[0],
            costs[costs.len() - 1]
        );
    }
    Ok(gas)
}
