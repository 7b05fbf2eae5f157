//! Outbox transactor
//!
//! Signed operations are written to an outbox directory, one JSON file per
//! operation named after its hash, for an external injector to broadcast.

use bakepay_core::batch::OperationLimits;
use bakepay_core::engines::{OpResult, Transactor};
use bakepay_core::operation::Operation;
use bakepay_core::{OpHash, PayoutError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Hash of a signed operation
pub fn operation_hash(op: &Operation) -> Result<OpHash> {
    let bytes = serde_json::to_vec(op)?;
    Ok(OpHash::new(format!("oo{}", blake3::hash(&bytes).to_hex())))
}

/// Dispatched operation parked in the outbox
pub struct OutboxOpResult {
    op_hash: OpHash,
    path: PathBuf,
}

impl OpResult for OutboxOpResult {
    fn op_hash(&self) -> OpHash {
        self.op_hash.clone()
    }

    /// Applied once the file landed in the outbox
    fn wait_for_apply(&self) -> Result<()> {
        if self.path.exists() {
            Ok(())
        } else {
            Err(PayoutError::Transactor(format!(
                "operation {} vanished from the outbox",
                self.op_hash
            )))
        }
    }
}

pub struct OutboxTransactor {
    outbox_dir: PathBuf,
    limits: OperationLimits,
}

impl OutboxTransactor {
    pub fn new(outbox_dir: impl AsRef<Path>, limits: OperationLimits) -> Result<Self> {
        let outbox_dir = outbox_dir.as_ref().to_path_buf();
        fs::create_dir_all(&outbox_dir)?;
        Ok(Self { outbox_dir, limits })
    }

    /// Hashes of the operations waiting in the outbox
    pub fn pending_operations(&self) -> Result<Vec<OpHash>> {
        let mut hashes: Vec<OpHash> = fs::read_dir(&self.outbox_dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                name.strip_suffix(".json").map(OpHash::new)
            })
            .collect();
        hashes.sort();
        Ok(hashes)
    }

    pub fn read_operation(&self, op_hash: &OpHash) -> Result<Operation> {
        let data = fs::read(self.operation_path(op_hash))?;
        Ok(serde_json::from_slice(&data)?)
    }

    fn operation_path(&self, op_hash: &OpHash) -> PathBuf {
        self.outbox_dir.join(format!("{}.json", op_hash))
    }
}

impl Transactor for OutboxTransactor {
    fn id(&self) -> &str {
        "outbox"
    }

    fn get_limits(&self) -> Result<OperationLimits> {
        Ok(self.limits)
    }

    fn dispatch(&self, op: &Operation) -> Result<Box<dyn OpResult>> {
        if !op.is_signed() {
            return Err(PayoutError::Transactor("refusing to dispatch unsigned operation".to_string()));
        }
        let op_hash = operation_hash(op)?;
        let path = self.operation_path(&op_hash);
        fs::write(&path, serde_json::to_vec_pretty(op)?)?;
        info!(
            op_hash = %op_hash,
            contents = op.contents.len(),
            fee = op.total_fee(),
            "Operation written to outbox"
        );
        Ok(Box::new(OutboxOpResult { op_hash, path }))
    }
}
