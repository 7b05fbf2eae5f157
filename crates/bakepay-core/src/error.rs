//! Error types for payout generation, preparation and execution

use crate::money::Mutez;
use thiserror::Error;

/// Result type alias for payout operations
pub type Result<T> = std::result::Result<T, PayoutError>;

/// Errors that abort a pipeline stage.
///
/// Problems scoped to a single candidate are never raised as errors; they
/// travel as [`crate::enums::InvalidReason`] on the candidate instead.
#[derive(Error, Debug, Clone)]
pub enum PayoutError {
    // === Setup ===
    /// Configuration missing or invalid
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A collaborator was not provided
    #[error("Engine not configured: {0}")]
    MissingEngine(&'static str),

    // === Generate ===
    /// Reveal status lookup failed
    #[error("Failed to check whether {address} is revealed: {message}")]
    RevealCheckFailed { address: String, message: String },

    /// Payout address is not revealed
    #[error("Payout address {0} is not revealed")]
    NotRevealed(String),

    /// Batch metadata deserialization gas estimation failed
    #[error("Failed to estimate serialization gas limit: {0}")]
    FailedToEstimateSerializationGasLimit(String),

    /// Collector has no staking data for the cycle
    #[error("No cycle data available for cycle {0}")]
    NoCycleDataAvailable(i64),

    /// Baker balance does not cover the payouts
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: Mutez, available: Mutez },

    // === Hooks ===
    /// Extension hook failed
    #[error("Hook {hook} failed: {message}")]
    Hook { hook: String, message: String },

    /// Hook answered with a payload for a different hook
    #[error("Hook {hook} returned a payload for {returned}")]
    HookPayloadMismatch { hook: String, returned: String },

    // === Prepare ===
    /// Prepare invoked without blueprints
    #[error("Missing payout blueprint")]
    MissingPayoutBlueprint,

    /// Reports for a cycle could not be loaded
    #[error("Failed to load reports for cycle {cycle}: {message}")]
    ReportsLoadFailed { cycle: i64, message: String },

    /// Two recipes with different identities were combined
    #[error("Cannot combine incompatible recipes {left} and {right}")]
    IncompatibleRecipes { left: String, right: String },

    // === Execute ===
    /// Chain limits unavailable
    #[error("Failed to get chain limits: {0}")]
    GetChainLimitsFailed(String),

    /// Single payout exceeds an empty operation
    #[error("Payout to {recipient} did not fit the batch")]
    PayoutDidNotFitTheBatch { recipient: String },

    /// FA transfer without a token contract
    #[error("Invalid contract address: {0}")]
    InvalidContractAddress(String),

    // === Scheduling ===
    /// Another process holds the cycle lock
    #[error("Timed out waiting for lock on cycle {cycle}")]
    LockTimeout { cycle: i64 },

    // === Collaborators ===
    #[error("Collector error: {0}")]
    Collector(String),

    #[error("Signer error: {0}")]
    Signer(String),

    #[error("Transactor error: {0}")]
    Transactor(String),

    #[error("Reporter error: {0}")]
    Reporter(String),

    #[error("Notifier error: {0}")]
    Notifier(String),

    // === General ===
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl PayoutError {
    /// Stable numeric code per category
    pub fn code(&self) -> u32 {
        match self {
            Self::Configuration(_) | Self::MissingEngine(_) => 1001,
            Self::RevealCheckFailed { .. } | Self::NotRevealed(_) => 1002,
            Self::FailedToEstimateSerializationGasLimit(_) => 1003,
            Self::NoCycleDataAvailable(_) => 1004,
            Self::InsufficientBalance { .. } => 1005,
            Self::Hook { .. } | Self::HookPayloadMismatch { .. } => 1006,
            Self::MissingPayoutBlueprint | Self::ReportsLoadFailed { .. } => 1007,
            Self::IncompatibleRecipes { .. } => 1008,
            Self::GetChainLimitsFailed(_)
            | Self::PayoutDidNotFitTheBatch { .. }
            | Self::InvalidContractAddress(_) => 1009,
            Self::LockTimeout { .. } => 1010,
            _ => 9999,
        }
    }

    /// Cycle-recoverable: the cycle can be retried after a backoff
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_)
                | Self::MissingEngine(_)
                | Self::RevealCheckFailed { .. }
                | Self::FailedToEstimateSerializationGasLimit(_)
                | Self::InsufficientBalance { .. }
                | Self::ReportsLoadFailed { .. }
                | Self::GetChainLimitsFailed(_)
                | Self::LockTimeout { .. }
                | Self::Collector(_)
                | Self::Transactor(_)
                | Self::Reporter(_)
                | Self::Io(_)
        )
    }

    /// Cycle should be skipped rather than retried
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoCycleDataAvailable(_))
    }

    /// Broken invariant, never retried
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::IncompatibleRecipes { .. } | Self::PayoutDidNotFitTheBatch { .. }
        )
    }
}

impl From<serde_json::Error> for PayoutError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for PayoutError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(PayoutError::NoCycleDataAvailable(500).code(), 1004);
        assert_eq!(PayoutError::LockTimeout { cycle: 1 }.code(), 1010);
        assert_eq!(PayoutError::Signer("x".into()).code(), 9999);
    }

    #[test]
    fn test_error_display() {
        let err = PayoutError::InsufficientBalance {
            required: Mutez::new(10),
            available: Mutez::new(5),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("required 10"));
        assert!(msg.contains("available 5"));
    }

    #[test]
    fn test_classification() {
        assert!(PayoutError::LockTimeout { cycle: 7 }.is_recoverable());
        assert!(PayoutError::NoCycleDataAvailable(7).is_no_data());
        assert!(!PayoutError::NoCycleDataAvailable(7).is_recoverable());
        let combine = PayoutError::IncompatibleRecipes {
            left: "a".into(),
            right: "b".into(),
        };
        assert!(combine.is_fatal());
        assert!(!combine.is_recoverable());
    }
}
