//! Payout candidates and their progressive enrichment
//!
//! ```text
//! PayoutCandidate
//!   └─► PayoutCandidateWithBondAmount        (+ bonds, tx kind, FA token)
//!         └─► PayoutCandidateWithBondAmountAndFee   (+ baker fee)
//!               └─► PayoutCandidateSimulated        (+ simulated costs)
//!                     └─► PayoutRecipe
//! ```
//!
//! Each step consumes the previous value and returns a new type, so a hook
//! sees exactly the shape the stage produced.

use bakepay_core::address::Address;
use bakepay_core::config::RuntimeConfiguration;
use bakepay_core::cycle::Delegator;
use bakepay_core::enums::{InvalidReason, PayoutKind, TxKind};
use bakepay_core::money::{Mutez, Portion};
use bakepay_core::recipe::{OpLimits, PayoutRecipe, TransferArgs};
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};

/// A delegator's payout before any amount is known
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PayoutCandidate {
    pub source: Address,
    pub recipient: Address,
    pub fee_rate: Portion,
    pub staked_balance: Mutez,
    pub delegated_balance: Mutez,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_because: Option<InvalidReason>,
    pub is_emptied: bool,
    pub is_baker_paying_tx_fee: bool,
    pub is_baker_paying_allocation_tx_fee: bool,
    pub tx_fee_collected: bool,
    pub allocation_fee_collected: bool,
}

impl PayoutCandidate {
    /// Applies the delegator's override (recipient, fee, fee payer flags,
    /// maximum balance) on top of the global payout settings.
    pub fn from_delegator(delegator: &Delegator, configuration: &RuntimeConfiguration) -> Self {
        let payouts = &configuration.payouts;
        let mut candidate = PayoutCandidate {
            source: delegator.address.clone(),
            recipient: delegator.address.clone(),
            fee_rate: payouts.fee,
            staked_balance: delegator.staked_balance,
            delegated_balance: delegator.delegated_balance,
            invalid_because: None,
            is_emptied: delegator.emptied,
            is_baker_paying_tx_fee: payouts.baker_pays_transaction_fee,
            is_baker_paying_allocation_tx_fee: payouts.baker_pays_allocation_fee,
            tx_fee_collected: false,
            allocation_fee_collected: false,
        };

        if let Some(o) = configuration.delegators.override_for(&delegator.address) {
            if let Some(recipient) = &o.recipient {
                candidate.recipient = recipient.clone();
            }
            if let Some(fee) = o.fee {
                candidate.fee_rate = fee;
            }
            if let Some(pays) = o.baker_pays_transaction_fee {
                candidate.is_baker_paying_tx_fee = pays;
            }
            if let Some(pays) = o.baker_pays_allocation_fee {
                candidate.is_baker_paying_allocation_tx_fee = pays;
            }
            if let Some(maximum) = o.maximum_balance {
                candidate.delegated_balance = candidate.delegated_balance.min(maximum);
            }
        }
        candidate
    }

    pub fn is_invalid(&self) -> bool {
        self.invalid_because.is_some()
    }

    pub fn mark_invalid(&mut self, reason: InvalidReason) {
        self.invalid_because = Some(reason);
    }

    pub fn with_bond_amount(self, bonds_amount: Mutez) -> PayoutCandidateWithBondAmount {
        PayoutCandidateWithBondAmount {
            candidate: self,
            bonds_amount,
            tx_kind: TxKind::Native,
            fa_token_id: 0,
            fa_contract: Address::default(),
        }
    }
}

/// Access to the base candidate of any wrapper
pub trait AsCandidate {
    fn candidate(&self) -> &PayoutCandidate;
    fn candidate_mut(&mut self) -> &mut PayoutCandidate;
}

impl AsCandidate for PayoutCandidate {
    fn candidate(&self) -> &PayoutCandidate {
        self
    }

    fn candidate_mut(&mut self) -> &mut PayoutCandidate {
        self
    }
}

/// Candidate with its share of the cycle rewards
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutCandidateWithBondAmount {
    #[serde(flatten)]
    pub candidate: PayoutCandidate,
    #[serde(default)]
    pub bonds_amount: Mutez,
    #[serde(default)]
    pub tx_kind: TxKind,
    /// FA transfers only
    #[serde(default)]
    pub fa_token_id: u64,
    /// FA transfers only
    #[serde(default)]
    pub fa_contract: Address,
}

impl PayoutCandidateWithBondAmount {
    pub fn with_fee(self, fee: Mutez) -> PayoutCandidateWithBondAmountAndFee {
        PayoutCandidateWithBondAmountAndFee { inner: self, fee }
    }
}

impl Deref for PayoutCandidateWithBondAmount {
    type Target = PayoutCandidate;

    fn deref(&self) -> &PayoutCandidate {
        &self.candidate
    }
}

impl DerefMut for PayoutCandidateWithBondAmount {
    fn deref_mut(&mut self) -> &mut PayoutCandidate {
        &mut self.candidate
    }
}

/// Candidate after the baker fee was taken
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutCandidateWithBondAmountAndFee {
    #[serde(flatten)]
    pub inner: PayoutCandidateWithBondAmount,
    #[serde(default)]
    pub fee: Mutez,
}

impl PayoutCandidateWithBondAmountAndFee {
    pub fn simulated(self, simulation_result: Option<OpLimits>) -> PayoutCandidateSimulated {
        PayoutCandidateSimulated {
            inner: self,
            simulation_result,
        }
    }
}

impl Deref for PayoutCandidateWithBondAmountAndFee {
    type Target = PayoutCandidateWithBondAmount;

    fn deref(&self) -> &PayoutCandidateWithBondAmount {
        &self.inner
    }
}

impl DerefMut for PayoutCandidateWithBondAmountAndFee {
    fn deref_mut(&mut self) -> &mut PayoutCandidateWithBondAmount {
        &mut self.inner
    }
}

/// Candidate with simulated transaction costs
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutCandidateSimulated {
    #[serde(flatten)]
    pub inner: PayoutCandidateWithBondAmountAndFee,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simulation_result: Option<OpLimits>,
}

impl PayoutCandidateSimulated {
    /// Invalid candidates become `invalid` recipes with the reason as note
    pub fn to_recipe(&self, baker: &Address, cycle: i64, kind: PayoutKind) -> PayoutRecipe {
        let (kind, note) = match self.invalid_because {
            Some(reason) => (PayoutKind::Invalid, reason.to_string()),
            None => (kind, String::new()),
        };
        PayoutRecipe {
            baker: baker.clone(),
            delegator: self.source.clone(),
            cycle,
            recipient: self.recipient.clone(),
            kind,
            tx_kind: self.tx_kind,
            fa_token_id: self.fa_token_id,
            fa_contract: self.fa_contract.clone(),
            delegated_balance: self.delegated_balance,
            staked_balance: self.staked_balance,
            amount: self.bonds_amount,
            fee_rate: self.fee_rate,
            fee: self.fee,
            op_limits: self.simulation_result,
            note,
            is_valid: !self.is_invalid(),
            tx_fee_collected: self.tx_fee_collected,
            allocation_fee_collected: self.allocation_fee_collected,
        }
    }
}

impl Deref for PayoutCandidateSimulated {
    type Target = PayoutCandidateWithBondAmountAndFee;

    fn deref(&self) -> &PayoutCandidateWithBondAmountAndFee {
        &self.inner
    }
}

impl DerefMut for PayoutCandidateSimulated {
    fn deref_mut(&mut self) -> &mut PayoutCandidateWithBondAmountAndFee {
        &mut self.inner
    }
}

macro_rules! wrapper_impls {
    ($($wrapper:ty),+) => {$(
        impl AsCandidate for $wrapper {
            fn candidate(&self) -> &PayoutCandidate {
                self
            }

            fn candidate_mut(&mut self) -> &mut PayoutCandidate {
                self
            }
        }

        impl TransferArgs for $wrapper {
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
                self.bonds_amount
            }
        }
    )+};
}

wrapper_impls!(
    PayoutCandidateWithBondAmount,
    PayoutCandidateWithBondAmountAndFee,
    PayoutCandidateSimulated
);

#[cfg(test)]
mod tests {
    use super::*;
    use bakepay_core::config::DelegatorOverride;

    const DELEGATOR: &str = "tz1X7U9XxVz6NDxL4DSZhijME61PW45bYUJE";
    const REDIRECT: &str = "tz1hZvgjekGo7DmQjWh7XnY5eLQD8wNYPczE";

    #[test]
    fn test_override_applies() {
        let mut configuration = RuntimeConfiguration::default();
        configuration.delegators.overrides.push(DelegatorOverride {
            address: Address::from(DELEGATOR),
            recipient: Some(Address::from(REDIRECT)),
            fee: Some(Portion::ZERO),
            baker_pays_transaction_fee: Some(true),
            maximum_balance: Some(Mutez::new(100)),
            ..Default::default()
        });
        let delegator = Delegator {
            address: Address::from(DELEGATOR),
            delegated_balance: Mutez::new(1_000),
            ..Default::default()
        };

        let candidate = PayoutCandidate::from_delegator(&delegator, &configuration);
        assert_eq!(candidate.source, Address::from(DELEGATOR));
        assert_eq!(candidate.recipient, Address::from(REDIRECT));
        assert_eq!(candidate.fee_rate, Portion::ZERO);
        assert!(candidate.is_baker_paying_tx_fee);
        assert!(!candidate.is_baker_paying_allocation_tx_fee);
        assert_eq!(candidate.delegated_balance, Mutez::new(100));
    }

    #[test]
    fn test_invalid_becomes_invalid_recipe() {
        let mut candidate = PayoutCandidate {
            source: Address::from(DELEGATOR),
            recipient: Address::from(DELEGATOR),
            ..Default::default()
        };
        candidate.mark_invalid(InvalidReason::Ignored);
        let recipe = candidate
            .with_bond_amount(Mutez::ZERO)
            .with_fee(Mutez::ZERO)
            .simulated(None)
            .to_recipe(&Address::from(REDIRECT), 7, PayoutKind::DelegatorReward);
        assert_eq!(recipe.kind, PayoutKind::Invalid);
        assert_eq!(recipe.note, "ignored");
        assert!(!recipe.is_valid);
    }

    #[test]
    fn test_wrappers_flatten_in_json() {
        let simulated = PayoutCandidate {
            source: Address::from(DELEGATOR),
            recipient: Address::from(DELEGATOR),
            ..Default::default()
        }
        .with_bond_amount(Mutez::new(10))
        .with_fee(Mutez::new(1))
        .simulated(Some(OpLimits::default()));

        let json = serde_json::to_value(&simulated).unwrap();
        assert_eq!(json["source"], DELEGATOR);
        assert_eq!(json["bonds_amount"], "10");
        assert_eq!(json["fee"], "1");

        let back: PayoutCandidateSimulated = serde_json::from_value(json).unwrap();
        assert_eq!(back, simulated);
    }
}
