//! Per-cycle staking snapshot delivered by the collector

use crate::address::Address;
use crate::enums::PayoutMode;
use crate::money::Mutez;
use serde::{Deserialize, Serialize};

/// One delegator's balances at the end of a cycle
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegator {
    pub address: Address,
    pub delegated_balance: Mutez,
    #[serde(default)]
    pub staked_balance: Mutez,
    #[serde(default)]
    pub emptied: bool,
}

impl Delegator {
    pub fn total_balance(&self) -> Mutez {
        self.delegated_balance + self.staked_balance
    }
}

/// Baker's cycle data
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BakersCycleData {
    pub own_staked_balance: Mutez,
    pub own_delegated_balance: Mutez,
    pub external_staked_balance: Mutez,
    pub external_delegated_balance: Mutez,
    pub block_delegated_rewards: Mutez,
    pub ideal_block_delegated_rewards: Mutez,
    pub endorsement_delegated_rewards: Mutez,
    pub ideal_endorsement_delegated_rewards: Mutez,
    pub block_delegated_fees: Mutez,
    pub delegators_count: i32,
    pub delegators: Vec<Delegator>,
}

impl BakersCycleData {
    /// Rewards shared between baker and delegators for the mode
    pub fn total_delegated_rewards(&self, mode: PayoutMode) -> Mutez {
        let rewards = match mode {
            PayoutMode::Actual => self.block_delegated_rewards + self.endorsement_delegated_rewards,
            PayoutMode::Ideal => {
                self.ideal_block_delegated_rewards + self.ideal_endorsement_delegated_rewards
            }
        };
        rewards + self.block_delegated_fees
    }

    pub fn total_delegated_balance(&self) -> Mutez {
        self.own_delegated_balance + self.external_delegated_balance
    }
}
