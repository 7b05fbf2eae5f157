//! # Operation model
//!
//! Chain-agnostic description of a batch transfer operation, its simulated
//! receipt and the fee formula. Encoding and broadcasting are the
//! transactor's business; this module only knows enough about the wire
//! format to estimate how many bytes a content occupies.
//!
//! ```text
//! fee = ceil((minimal_fee + size * nanotez_per_byte + gas * nanotez_per_gas) / 1000) + buffer
//! ```

use crate::address::Address;
use crate::constants::{
    MAX_OPERATION_TTL, MINIMAL_FEE_NANOTEZ, MINIMAL_NANOTEZ_PER_BYTE, MINIMAL_NANOTEZ_PER_GAS_UNIT,
};
use crate::enums::TxKind;
use crate::error::{PayoutError, Result};
use crate::money::Mutez;
use crate::recipe::TransferArgs;
use serde::{Deserialize, Serialize};

// forged field widths
const TAG_SIZE: i64 = 1;
const SOURCE_SIZE: i64 = 21;
const DESTINATION_SIZE: i64 = 22;
const PARAMETERS_FLAG_SIZE: i64 = 1;
const COUNTER_SIZE: i64 = 4;
const BRANCH_SIZE: i64 = 32;
const SIGNATURE_SIZE: i64 = 64;
// named entrypoint + length prefix
const ENTRYPOINT_SIZE: i64 = 1 + 1 + 8 + 4;
// Pair(from, Pair(to, amount)) with two packed addresses
const FA12_PAYLOAD_SIZE: i64 = 4 + 2 * (1 + 4 + 22);
// { Pair(from, { Pair(to, Pair(token_id, amount)) }) }
const FA2_PAYLOAD_SIZE: i64 = 4 + 2 * 5 + 2 * (1 + 4 + 22);

/// Bytes needed to zarith-encode a natural number
pub fn zarith_size(value: i128) -> i64 {
    let mut value = value.unsigned_abs();
    let mut size = 1;
    while value >= 0x80 {
        value >>= 7;
        size += 1;
    }
    size
}

/// Fee, gas and storage attached to a content
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    pub fee: i64,
    pub gas_limit: i64,
    pub storage_limit: i64,
}

/// One transfer inside an operation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationContent {
    Transfer {
        destination: Address,
        amount: Mutez,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limits: Option<Limits>,
    },
    Fa12Transfer {
        contract: Address,
        from: Address,
        to: Address,
        amount: Mutez,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limits: Option<Limits>,
    },
    Fa2Transfer {
        contract: Address,
        from: Address,
        to: Address,
        token_id: u64,
        amount: Mutez,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limits: Option<Limits>,
    },
}

impl OperationContent {
    pub fn limits(&self) -> Option<Limits> {
        match self {
            Self::Transfer { limits, .. }
            | Self::Fa12Transfer { limits, .. }
            | Self::Fa2Transfer { limits, .. } => *limits,
        }
    }

    pub fn set_limits(&mut self, new_limits: Limits) {
        match self {
            Self::Transfer { limits, .. }
            | Self::Fa12Transfer { limits, .. }
            | Self::Fa2Transfer { limits, .. } => *limits = Some(new_limits),
        }
    }

    /// Address the transaction is sent to (the token contract for FA)
    pub fn destination(&self) -> &Address {
        match self {
            Self::Transfer { destination, .. } => destination,
            Self::Fa12Transfer { contract, .. } | Self::Fa2Transfer { contract, .. } => contract,
        }
    }

    /// Estimated forged size in bytes
    pub fn encoded_size(&self) -> i64 {
        let limits = self.limits().unwrap_or_default();
        let header = TAG_SIZE
            + SOURCE_SIZE
            + COUNTER_SIZE
            + zarith_size(limits.fee as i128)
            + zarith_size(limits.gas_limit as i128)
            + zarith_size(limits.storage_limit as i128)
            + DESTINATION_SIZE
            + PARAMETERS_FLAG_SIZE;
        match self {
            Self::Transfer { amount, .. } => header + zarith_size(amount.value()),
            Self::Fa12Transfer { amount, .. } => {
                header + zarith_size(0) + ENTRYPOINT_SIZE + FA12_PAYLOAD_SIZE + zarith_size(amount.value())
            }
            Self::Fa2Transfer {
                token_id, amount, ..
            } => {
                header
                    + zarith_size(0)
                    + ENTRYPOINT_SIZE
                    + FA2_PAYLOAD_SIZE
                    + zarith_size(*token_id as i128)
                    + zarith_size(amount.value())
            }
        }
    }
}

/// Transfer operation from a single source
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub source: Address,
    pub ttl: i64,
    pub contents: Vec<OperationContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl Operation {
    pub fn new(source: Address) -> Self {
        Self {
            source,
            ttl: MAX_OPERATION_TTL,
            contents: Vec::new(),
            signature: None,
        }
    }

    pub fn with_ttl(mut self, ttl: i64) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_transfer(mut self, destination: Address, amount: Mutez) -> Self {
        self.contents.push(OperationContent::Transfer {
            destination,
            amount,
            limits: None,
        });
        self
    }

    /// Append the transfer described by `args`. FA transfers need a contract.
    pub fn inject_transfer<T: TransferArgs + ?Sized>(&mut self, args: &T) -> Result<()> {
        self.contents.push(transfer_content(&self.source, args)?);
        Ok(())
    }

    pub fn inject_transfer_with_limits<T: TransferArgs + ?Sized>(
        &mut self,
        args: &T,
        limits: Limits,
    ) -> Result<()> {
        let mut content = transfer_content(&self.source, args)?;
        content.set_limits(limits);
        self.contents.push(content);
        Ok(())
    }

    /// Attach limits to every content, one entry per content
    pub fn inject_limits(&mut self, limits: &[Limits]) -> Result<()> {
        if limits.is_empty() {
            return Ok(());
        }
        if limits.len() != self.contents.len() {
            return Err(PayoutError::Transactor(format!(
                "got {} limits for {} contents",
                limits.len(),
                self.contents.len()
            )));
        }
        for (content, l) in self.contents.iter_mut().zip(limits) {
            content.set_limits(*l);
        }
        Ok(())
    }

    /// Estimated forged size including branch and signature
    pub fn encoded_size(&self) -> i64 {
        BRANCH_SIZE + self.contents.iter().map(|c| c.encoded_size()).sum::<i64>() + SIGNATURE_SIZE
    }

    pub fn total_fee(&self) -> i64 {
        self.contents.iter().filter_map(|c| c.limits()).map(|l| l.fee).sum()
    }

    /// Canonical bytes covered by the signature
    pub fn signing_bytes(&self) -> Result<Vec<u8>> {
        let unsigned = Operation {
            signature: None,
            ..self.clone()
        };
        Ok(serde_json::to_vec(&unsigned)?)
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }
}

fn transfer_content<T: TransferArgs + ?Sized>(source: &Address, args: &T) -> Result<OperationContent> {
    if args.tx_kind().is_fa() {
        checked_contract(args.fa_contract())?;
    }
    Ok(unchecked_transfer_content(source, args))
}

fn unchecked_transfer_content<T: TransferArgs + ?Sized>(source: &Address, args: &T) -> OperationContent {
    match args.tx_kind() {
        TxKind::Native => OperationContent::Transfer {
            destination: args.destination().clone(),
            amount: args.amount(),
            limits: None,
        },
        TxKind::Fa1_2 => OperationContent::Fa12Transfer {
            contract: args.fa_contract().clone(),
            from: source.clone(),
            to: args.destination().clone(),
            amount: args.amount(),
            limits: None,
        },
        TxKind::Fa2 => OperationContent::Fa2Transfer {
            contract: args.fa_contract().clone(),
            from: source.clone(),
            to: args.destination().clone(),
            token_id: args.fa_token_id(),
            amount: args.amount(),
            limits: None,
        },
    }
}

/// Estimated forged size of the transfer described by `args` with `limits`
pub fn transfer_encoded_size<T: TransferArgs + ?Sized>(args: &T, limits: Limits) -> i64 {
    let mut content = unchecked_transfer_content(&Address::default(), args);
    content.set_limits(limits);
    content.encoded_size()
}

fn checked_contract(contract: &Address) -> Result<()> {
    if contract.is_empty() || !contract.is_contract() {
        return Err(PayoutError::InvalidContractAddress(contract.to_string()));
    }
    Ok(())
}

/// Minimal fee for a content of `size` bytes consuming `gas`
pub fn estimate_transaction_fee(size: i64, gas: i64, buffer: i64) -> i64 {
    let nanotez = MINIMAL_FEE_NANOTEZ + MINIMAL_NANOTEZ_PER_BYTE * size + MINIMAL_NANOTEZ_PER_GAS_UNIT * gas;
    (nanotez + 999) / 1000 + buffer
}

/// Per-content status in a simulation receipt
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    #[default]
    Applied,
    Failed,
    Backtracked,
    Skipped,
}

/// Simulated execution result of one content
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentResult {
    pub status: ContentStatus,
    pub consumed_milligas: i64,
    pub paid_storage_size_diff: i64,
    pub allocated_destination: bool,
    pub storage_burn: i64,
    pub allocation_burn: i64,
    pub errors: Vec<String>,
}

/// Costs of one content derived from its result
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Costs {
    pub gas_used: i64,
    pub storage_used: i64,
    pub allocated: bool,
    pub storage_burn: i64,
    pub allocation_burn: i64,
}

/// Simulation outcome of a whole operation
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationReceipt {
    pub contents: Vec<ContentResult>,
}

impl SimulationReceipt {
    pub fn is_success(&self) -> bool {
        self.contents.iter().all(|c| c.status == ContentStatus::Applied)
    }

    /// First failure message, if any content did not apply
    pub fn error(&self) -> Option<String> {
        self.contents
            .iter()
            .enumerate()
            .find(|(_, c)| c.status != ContentStatus::Applied)
            .map(|(i, c)| {
                if c.errors.is_empty() {
                    format!("content {} {:?}", i, c.status)
                } else {
                    format!("content {} {:?}: {}", i, c.status, c.errors.join(", "))
                }
            })
    }

    pub fn costs(&self) -> Vec<Costs> {
        self.contents
            .iter()
            .map(|c| Costs {
                gas_used: (c.consumed_milligas + 999) / 1000,
                storage_used: c.paid_storage_size_diff,
                allocated: c.allocated_destination,
                storage_burn: c.storage_burn,
                allocation_burn: c.allocation_burn,
            })
            .collect()
    }
}
