//! Cycle payout blueprints and summaries
//!
//! A blueprint is the full generated output for one cycle. It is the
//! hand-off artifact between generation and preparation, so it must survive
//! a JSON round trip through a file or stdin without losing anything.

use crate::error::Result;
use crate::is_default;
use crate::money::Mutez;
use crate::recipe::PayoutRecipe;
use crate::report::PayoutReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregate figures of one cycle's payouts
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CyclePayoutSummary {
    pub cycle: i64,
    pub delegators: usize,
    pub paid_delegators: usize,
    pub own_staked_balance: Mutez,
    pub own_delegated_balance: Mutez,
    pub external_staked_balance: Mutez,
    pub external_delegated_balance: Mutez,
    #[serde(rename = "cycle_fees")]
    pub earned_fees: Mutez,
    #[serde(rename = "cycle_rewards")]
    pub earned_rewards: Mutez,
    pub distributed_rewards: Mutez,
    pub bond_income: Mutez,
    pub fee_income: Mutez,
    #[serde(rename = "total_income")]
    pub income_total: Mutez,
    pub donated_bonds: Mutez,
    pub donated_fees: Mutez,
    pub donated_total: Mutez,
    pub timestamp: DateTime<Utc>,
}

impl CyclePayoutSummary {
    pub fn total_staked_balance(&self) -> Mutez {
        self.own_staked_balance + self.external_staked_balance
    }

    pub fn total_delegated_balance(&self) -> Mutez {
        self.own_delegated_balance + self.external_delegated_balance
    }

    /// Sum of the monetary fields. Cycle, counts and timestamp are left empty.
    pub fn combine_numeric(&self, other: &CyclePayoutSummary) -> CyclePayoutSummary {
        CyclePayoutSummary {
            own_staked_balance: self.own_staked_balance + other.own_staked_balance,
            own_delegated_balance: self.own_delegated_balance + other.own_delegated_balance,
            external_staked_balance: self.external_staked_balance + other.external_staked_balance,
            external_delegated_balance: self.external_delegated_balance
                + other.external_delegated_balance,
            earned_fees: self.earned_fees + other.earned_fees,
            earned_rewards: self.earned_rewards + other.earned_rewards,
            distributed_rewards: self.distributed_rewards + other.distributed_rewards,
            bond_income: self.bond_income + other.bond_income,
            fee_income: self.fee_income + other.fee_income,
            income_total: self.income_total + other.income_total,
            donated_bonds: self.donated_bonds + other.donated_bonds,
            donated_fees: self.donated_fees + other.donated_fees,
            donated_total: self.donated_total + other.donated_total,
            ..Default::default()
        }
    }
}

/// Generated output of one cycle
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CyclePayoutBlueprint {
    #[serde(alias = "cycles", skip_serializing_if = "is_default")]
    pub cycle: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub payouts: Vec<PayoutRecipe>,
    pub summary: CyclePayoutSummary,
    #[serde(skip_serializing_if = "is_default")]
    pub batch_metadata_deserialization_gas_limit: i64,
}

impl CyclePayoutBlueprint {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }
}

/// Aggregate of several cycle summaries; the delegator count is averaged
pub fn summarize_cycles<'a>(summaries: impl IntoIterator<Item = &'a CyclePayoutSummary>) -> CyclePayoutSummary {
    let mut summary = CyclePayoutSummary::default();
    let mut cycles = 0;
    let mut delegators = 0;
    let mut paid_delegators = 0;
    for cycle_summary in summaries {
        cycles += 1;
        delegators += cycle_summary.delegators;
        paid_delegators += cycle_summary.paid_delegators;
        summary = summary.combine_numeric(cycle_summary);
    }
    if cycles == 0 {
        return summary;
    }
    summary.delegators = delegators / cycles;
    summary.paid_delegators = paid_delegators;
    summary.timestamp = Utc::now();
    summary
}

/// Outcome of the prepare pipeline
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreparePayoutsResult {
    #[serde(rename = "blueprints", skip_serializing_if = "Vec::is_empty")]
    pub blueprints: Vec<CyclePayoutBlueprint>,
    #[serde(rename = "payouts", skip_serializing_if = "Vec::is_empty")]
    pub valid_payouts: Vec<PayoutRecipe>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub accumulated_payouts: Vec<PayoutRecipe>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub invalid_payouts: Vec<PayoutRecipe>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reports_of_past_successful_payouts: Vec<PayoutReport>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::enums::{PayoutKind, TxKind};
    use crate::money::Portion;
    use crate::recipe::OpLimits;
    use proptest::prelude::*;

    fn sample_recipe(amount: i64, kind: PayoutKind, tx_kind: TxKind) -> PayoutRecipe {
        PayoutRecipe {
            baker: Address::from("tz1P6WKJu2rcbxKiKRZHKQKmKrpC9TfW1AwM"),
            delegator: Address::from("tz1X7U9XxVz6NDxL4DSZhijME61PW45bYUJE"),
            recipient: Address::from("tz1hZvgjekGo7DmQjWh7XnY5eLQD8wNYPczE"),
            cycle: 100,
            kind,
            tx_kind,
            amount: Mutez::from(amount),
            fee_rate: Portion::from_units(500),
            op_limits: Some(OpLimits {
                transaction_fee: 400,
                gas_limit: 1_100,
                storage_limit: 257,
                allocation_burn: 64_250,
                ..Default::default()
            }),
            is_valid: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_legacy_cycles_field() {
        let blueprint = CyclePayoutBlueprint::from_json(r#"{"cycles": 42, "summary": {}}"#).unwrap();
        assert_eq!(blueprint.cycle, 42);
    }

    #[test]
    fn test_summarize_averages_delegators() {
        let a = CyclePayoutSummary {
            delegators: 10,
            paid_delegators: 8,
            bond_income: Mutez::new(100),
            ..Default::default()
        };
        let b = CyclePayoutSummary {
            delegators: 20,
            paid_delegators: 19,
            bond_income: Mutez::new(50),
            ..Default::default()
        };

        let summary = summarize_cycles([&a, &b]);
        assert_eq!(summary.delegators, 15);
        assert_eq!(summary.paid_delegators, 27);
        assert_eq!(summary.bond_income, Mutez::new(150));
        assert_eq!(summarize_cycles(&Vec::new()), CyclePayoutSummary::default());
    }

    fn kind_strategy() -> impl Strategy<Value = PayoutKind> {
        prop_oneof![
            Just(PayoutKind::DelegatorReward),
            Just(PayoutKind::BakerReward),
            Just(PayoutKind::FeeIncome),
            Just(PayoutKind::Invalid),
        ]
    }

    fn tx_kind_strategy() -> impl Strategy<Value = TxKind> {
        prop_oneof![Just(TxKind::Native), Just(TxKind::Fa1_2), Just(TxKind::Fa2)]
    }

    proptest! {
        #[test]
        fn prop_blueprint_survives_json(
            cycle in 1i64..10_000,
            payouts in prop::collection::vec((0i64..i64::MAX, kind_strategy(), tx_kind_strategy()), 0..20),
            rewards in 0i64..i64::MAX,
            gas in 0i64..10_000,
        ) {
            let blueprint = CyclePayoutBlueprint {
                cycle,
                payouts: payouts
                    .into_iter()
                    .map(|(amount, kind, tx_kind)| sample_recipe(amount, kind, tx_kind))
                    .collect(),
                summary: CyclePayoutSummary {
                    cycle,
                    earned_rewards: Mutez::from(rewards),
                    timestamp: Utc::now(),
                    ..Default::default()
                },
                batch_metadata_deserialization_gas_limit: gas,
            };
            let json = blueprint.to_json().unwrap();
            prop_assert_eq!(CyclePayoutBlueprint::from_json(&json).unwrap(), blueprint);
        }
    }
}
