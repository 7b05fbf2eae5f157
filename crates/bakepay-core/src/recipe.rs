//! Payout recipes: the canonical unit of a computed payout

use crate::address::{Address, OpHash};
use crate::enums::{PayoutKind, TxKind};
use crate::error::{PayoutError, Result};
use crate::is_default;
use crate::money::{Mutez, Portion};
use crate::report::PayoutReport;
use serde::{Deserialize, Serialize};

/// Simulated cost breakdown of a single transfer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpLimits {
    #[serde(skip_serializing_if = "is_default")]
    pub transaction_fee: i64,
    #[serde(skip_serializing_if = "is_default")]
    pub storage_limit: i64,
    #[serde(skip_serializing_if = "is_default")]
    pub gas_limit: i64,
    #[serde(skip_serializing_if = "is_default")]
    pub deserialization_gas_limit: i64,
    #[serde(skip_serializing_if = "is_default")]
    pub allocation_burn: i64,
    #[serde(skip_serializing_if = "is_default")]
    pub storage_burn: i64,
}

impl OpLimits {
    pub fn total_fees(&self) -> i64 {
        self.transaction_fee + self.allocation_burn + self.storage_burn
    }

    pub fn allocation_fee(&self) -> i64 {
        self.allocation_burn
    }

    pub fn fees_without_allocation(&self) -> i64 {
        self.transaction_fee + self.storage_burn
    }

    fn sum(&self, other: &OpLimits) -> OpLimits {
        OpLimits {
            transaction_fee: self.transaction_fee + other.transaction_fee,
            storage_limit: self.storage_limit + other.storage_limit,
            gas_limit: self.gas_limit + other.gas_limit,
            deserialization_gas_limit: self.deserialization_gas_limit
                + other.deserialization_gas_limit,
            allocation_burn: self.allocation_burn + other.allocation_burn,
            storage_burn: self.storage_burn + other.storage_burn,
        }
    }
}

/// Anything that can be turned into a transfer
pub trait TransferArgs {
    fn tx_kind(&self) -> TxKind;
    fn fa_contract(&self) -> &Address;
    fn fa_token_id(&self) -> u64;
    fn destination(&self) -> &Address;
    fn amount(&self) -> Mutez;
}

/// A computed, not necessarily executed, payout instruction
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PayoutRecipe {
    pub baker: Address,
    #[serde(skip_serializing_if = "Address::is_empty")]
    pub delegator: Address,
    #[serde(skip_serializing_if = "is_default")]
    pub cycle: i64,
    #[serde(skip_serializing_if = "Address::is_empty")]
    pub recipient: Address,
    pub kind: PayoutKind,
    pub tx_kind: TxKind,
    #[serde(skip_serializing_if = "is_default")]
    pub fa_token_id: u64,
    #[serde(skip_serializing_if = "Address::is_empty")]
    pub fa_contract: Address,
    #[serde(rename = "delegator_balance", skip_serializing_if = "Mutez::is_zero")]
    pub delegated_balance: Mutez,
    #[serde(skip_serializing_if = "Mutez::is_zero")]
    pub staked_balance: Mutez,
    #[serde(skip_serializing_if = "Mutez::is_zero")]
    pub amount: Mutez,
    #[serde(skip_serializing_if = "Portion::is_zero")]
    pub fee_rate: Portion,
    #[serde(skip_serializing_if = "Mutez::is_zero")]
    pub fee: Mutez,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub op_limits: Option<OpLimits>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub note: String,
    #[serde(rename = "valid", skip_serializing_if = "is_default")]
    pub is_valid: bool,
    #[serde(skip_serializing_if = "is_default")]
    pub tx_fee_collected: bool,
    #[serde(skip_serializing_if = "is_default")]
    pub allocation_fee_collected: bool,
}

#[derive(Serialize)]
struct RecipeIdentifier<'a> {
    #[serde(skip_serializing_if = "Address::is_empty")]
    delegator: &'a Address,
    #[serde(skip_serializing_if = "Address::is_empty")]
    recipient: &'a Address,
    kind: PayoutKind,
    tx_kind: TxKind,
    #[serde(skip_serializing_if = "is_default")]
    fa_token_id: u64,
    #[serde(skip_serializing_if = "Address::is_empty")]
    fa_contract: &'a Address,
    #[serde(skip_serializing_if = "is_default")]
    valid: bool,
}

const SHORT_IDENTIFIER_LENGTH: usize = 16;

impl PayoutRecipe {
    /// Deterministic identity over delegator, recipient, kind, tx kind, FA
    /// token/contract and validity. Equal identities describe the same
    /// logical payout across cycles and reruns.
    pub fn identifier(&self) -> String {
        let identifier = RecipeIdentifier {
            delegator: &self.delegator,
            recipient: &self.recipient,
            kind: self.kind,
            tx_kind: self.tx_kind,
            fa_token_id: self.fa_token_id,
            fa_contract: &self.fa_contract,
            valid: self.is_valid,
        };
        // plain struct of strings and enums, serialization cannot fail
        let bytes = serde_json::to_vec(&identifier).unwrap_or_default();
        hex::encode(blake3::hash(&bytes).as_bytes())
    }

    pub fn short_identifier(&self) -> String {
        let mut id = self.identifier();
        id.truncate(SHORT_IDENTIFIER_LENGTH);
        id
    }

    /// `<short identifier>#<cycle>`
    pub fn accumulated_identifier(&self) -> String {
        format!("{}#{}", self.short_identifier(), self.cycle)
    }

    /// Anchor identifier and originating cycle of an absorbed payout
    pub fn accumulated_details(&self) -> Option<(String, i64)> {
        if self.kind != PayoutKind::Accumulated {
            return None;
        }
        let (id, cycle) = self.note.split_once('#')?;
        let cycle = cycle.parse::<i64>().ok()?;
        if id.is_empty() {
            return None;
        }
        Some((id.to_string(), cycle))
    }

    pub fn transaction_fee(&self) -> i64 {
        self.op_limits.map(|l| l.transaction_fee).unwrap_or_default()
    }

    /// Transfer costs deducted from `amount`, per the collected flags
    pub fn collected_costs(&self) -> i64 {
        if self.tx_kind.is_fa() {
            return 0;
        }
        let limits = self.op_limits.unwrap_or_default();
        let mut collected = 0;
        if self.tx_fee_collected {
            collected += limits.fees_without_allocation();
        }
        if self.allocation_fee_collected {
            collected += limits.allocation_fee();
        }
        collected
    }

    /// Fold `other` into `self`. Amounts and fees are summed, balances
    /// averaged, cost breakdowns summed. The recipient keeps paying a cost
    /// it paid in either entry. `other` becomes an accumulated entry
    /// pointing at `self`.
    pub fn combine(&mut self, other: &mut PayoutRecipe) -> Result<()> {
        let compatible = self.recipient == other.recipient
            && self.delegator == other.delegator
            && self.kind == other.kind
            && self.tx_kind == other.tx_kind
            && self.fa_token_id == other.fa_token_id
            && self.fa_contract == other.fa_contract
            && self.is_valid == other.is_valid;
        if !compatible {
            return Err(PayoutError::IncompatibleRecipes {
                left: self.identifier(),
                right: other.identifier(),
            });
        }

        self.delegated_balance = (self.delegated_balance + other.delegated_balance).div_i64(2);
        self.staked_balance = (self.staked_balance + other.staked_balance).div_i64(2);
        self.amount += other.amount;
        self.fee += other.fee;
        let left = self.op_limits.unwrap_or_default();
        let right = other.op_limits.unwrap_or_default();
        self.op_limits = Some(left.sum(&right));
        self.tx_fee_collected |= other.tx_fee_collected;
        self.allocation_fee_collected |= other.allocation_fee_collected;

        other.kind = PayoutKind::Accumulated;
        other.note = self.accumulated_identifier();
        Ok(())
    }

    pub fn to_report(&self) -> PayoutReport {
        PayoutReport {
            id: self.short_identifier(),
            baker: self.baker.clone(),
            timestamp: chrono::Utc::now(),
            cycle: self.cycle,
            kind: self.kind,
            tx_kind: self.tx_kind,
            fa_contract: self.fa_contract.clone(),
            fa_token_id: self.fa_token_id,
            delegator: self.delegator.clone(),
            delegated_balance: self.delegated_balance,
            recipient: self.recipient.clone(),
            amount: self.amount,
            fee_rate: self.fee_rate,
            fee: self.fee,
            transaction_fee: self.transaction_fee(),
            op_hash: OpHash::default(),
            is_success: false,
            note: self.note.clone(),
        }
    }
}

impl TransferArgs for PayoutRecipe {
    fn tx_kind(&self) -> TxKind {
        self.tx_kind
    }

    fn fa_contract(&self) -> &Address {
        &self.fa_contract
    }

    fn fa_token_id(&self) -> u64 {
        self.fa_token_id
    }

    fn destination(&self) -> &Address {
        &self.recipient
    }

    fn amount(&self) -> Mutez {
        self.amount
    }
}

/// Valid recipes only
pub fn only_valid(recipes: &[PayoutRecipe]) -> Vec<PayoutRecipe> {
    recipes.iter().filter(|r| r.is_valid).cloned().collect()
}

/// Invalid recipes only
pub fn only_invalid(recipes: &[PayoutRecipe]) -> Vec<PayoutRecipe> {
    recipes.iter().filter(|r| !r.is_valid).cloned().collect()
}
