//! In-memory ed25519 signer
//!
//! Operations are signed over the blake3 digest of their canonical signing
//! bytes. Signatures and public keys travel hex encoded.

use bakepay_core::engines::Signer;
use bakepay_core::operation::Operation;
use bakepay_core::{Address, PayoutError, Result};
use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;

/// Ed25519 seed length
pub const SEED_SIZE: usize = 32;

const PUBLIC_KEY_PREFIX: &str = "ed25519:";

fn operation_digest(op: &Operation) -> Result<blake3::Hash> {
    Ok(blake3::hash(&op.signing_bytes()?))
}

/// Payout key held in process memory
pub struct InMemorySigner {
    signing_key: SigningKey,
    pkh: Address,
}

impl InMemorySigner {
    pub fn new(seed: [u8; SEED_SIZE], pkh: Address) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
            pkh,
        }
    }

    /// Signer from a hex encoded 32 byte seed
    pub fn from_hex_seed(seed: &str, pkh: Address) -> Result<Self> {
        let bytes = hex::decode(seed.trim())
            .map_err(|e| PayoutError::Signer(format!("invalid seed encoding: {}", e)))?;
        let seed: [u8; SEED_SIZE] = bytes.try_into().map_err(|bytes: Vec<u8>| {
            PayoutError::Signer(format!("seed must be {} bytes, got {}", SEED_SIZE, bytes.len()))
        })?;
        Ok(Self::new(seed, pkh))
    }

    /// Signer with a fresh random key
    pub fn generate(pkh: Address) -> Self {
        let mut seed = [0u8; SEED_SIZE];
        OsRng.fill_bytes(&mut seed);
        Self::new(seed, pkh)
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }
}

impl Signer for InMemorySigner {
    fn id(&self) -> &str {
        "in-memory"
    }

    fn pkh(&self) -> Address {
        self.pkh.clone()
    }

    fn key(&self) -> String {
        format!("{}{}", PUBLIC_KEY_PREFIX, hex::encode(self.verifying_key().to_bytes()))
    }

    fn sign(&self, op: &mut Operation) -> Result<()> {
        let digest = operation_digest(op)?;
        let signature = self.signing_key.sign(digest.as_bytes());
        op.signature = Some(hex::encode(signature.to_bytes()));
        Ok(())
    }
}

/// Check the signature of `op` against an encoded public key
pub fn verify_operation(public_key: &str, op: &Operation) -> Result<bool> {
    let Some(signature) = op.signature.as_deref() else {
        return Ok(false);
    };
    let key_bytes: [u8; 32] = public_key
        .strip_prefix(PUBLIC_KEY_PREFIX)
        .and_then(|key| hex::decode(key).ok())
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| PayoutError::Signer(format!("invalid public key {}", public_key)))?;
    let key = VerifyingKey::from_bytes(&key_bytes).map_err(|e| PayoutError::Signer(e.to_string()))?;
    let signature_bytes: [u8; 64] = match hex::decode(signature).ok().and_then(|b| b.try_into().ok()) {
        Some(bytes) => bytes,
        None => return Ok(false),
    };
    let signature = Signature::from_bytes(&signature_bytes);
    Ok(key.verify(operation_digest(op)?.as_bytes(), &signature).is_ok())
}
