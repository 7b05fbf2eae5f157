//! Payout classification enums

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a payout pays for
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutKind {
    #[default]
    DelegatorReward,
    BakerReward,
    FeeIncome,
    Donation,
    /// Folded into another payout of the same identity
    Accumulated,
    Invalid,
}

impl PayoutKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DelegatorReward => "delegator_reward",
            Self::BakerReward => "baker_reward",
            Self::FeeIncome => "fee_income",
            Self::Donation => "donation",
            Self::Accumulated => "accumulated",
            Self::Invalid => "invalid",
        }
    }

    /// Kind used when matching reports; accumulated reports stand for the
    /// delegator reward they were folded into.
    pub fn normalized(&self) -> PayoutKind {
        match self {
            Self::Accumulated => Self::DelegatorReward,
            other => *other,
        }
    }
}

impl fmt::Display for PayoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transfer flavor
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxKind {
    #[default]
    #[serde(rename = "tez")]
    Native,
    #[serde(rename = "fa1.2")]
    Fa1_2,
    #[serde(rename = "fa2")]
    Fa2,
}

impl TxKind {
    pub fn is_fa(&self) -> bool {
        !matches!(self, Self::Native)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Native => "tez",
            Self::Fa1_2 => "fa1.2",
            Self::Fa2 => "fa2",
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a candidate or recipe will not be paid
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    Ignored,
    Prefiltered,
    Emptied,
    BalanceTooLow,
    BelowMinimum,
    ToSmartContract,
    FailedToEstimateTxCosts,
    Unknown,
}

impl InvalidReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ignored => "ignored",
            Self::Prefiltered => "prefiltered",
            Self::Emptied => "emptied",
            Self::BalanceTooLow => "balance_too_low",
            Self::BelowMinimum => "below_minimum",
            Self::ToSmartContract => "to_smart_contract",
            Self::FailedToEstimateTxCosts => "failed_to_estimate_tx_costs",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where rewards of delegators below the minimum balance go
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardDestination {
    /// Kept in the denominator, left undistributed
    #[default]
    None,
    /// Excluded from the denominator, spread across everyone else
    Everyone,
}

/// Which reward figures feed the distribution
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutMode {
    #[default]
    Actual,
    Ideal,
}
