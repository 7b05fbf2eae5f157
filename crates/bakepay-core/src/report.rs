//! Persisted payout reports

use crate::address::{Address, OpHash};
use crate::enums::{PayoutKind, TxKind};
use crate::is_default;
use crate::money::{Mutez, Portion};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Recorded counterpart of a recipe once execution was attempted
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutReport {
    pub id: String,
    pub baker: Address,
    pub timestamp: DateTime<Utc>,
    pub cycle: i64,
    #[serde(default)]
    pub kind: PayoutKind,
    #[serde(default)]
    pub tx_kind: TxKind,
    #[serde(rename = "contract", default, skip_serializing_if = "Address::is_empty")]
    pub fa_contract: Address,
    #[serde(rename = "token_id", default, skip_serializing_if = "is_default")]
    pub fa_token_id: u64,
    #[serde(default, skip_serializing_if = "Address::is_empty")]
    pub delegator: Address,
    #[serde(rename = "delegator_balance", default, skip_serializing_if = "Mutez::is_zero")]
    pub delegated_balance: Mutez,
    #[serde(default, skip_serializing_if = "Address::is_empty")]
    pub recipient: Address,
    #[serde(default, skip_serializing_if = "Mutez::is_zero")]
    pub amount: Mutez,
    #[serde(default, skip_serializing_if = "Portion::is_zero")]
    pub fee_rate: Portion,
    #[serde(default, skip_serializing_if = "Mutez::is_zero")]
    pub fee: Mutez,
    #[serde(rename = "tx_fee", default, skip_serializing_if = "is_default")]
    pub transaction_fee: i64,
    #[serde(default, skip_serializing_if = "OpHash::is_empty")]
    pub op_hash: OpHash,
    #[serde(rename = "success", default)]
    pub is_success: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub note: String,
}

impl PayoutReport {
    /// Delegator, or the recipient for payouts without one (income, donations)
    pub fn delegator_or_recipient(&self) -> &Address {
        if self.delegator.is_empty() {
            &self.recipient
        } else {
            &self.delegator
        }
    }
}

/// Reports that belong to `baker`
pub fn filter_reports_by_baker(reports: Vec<PayoutReport>, baker: &Address) -> Vec<PayoutReport> {
    reports.into_iter().filter(|r| &r.baker == baker).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_json() {
        let report = PayoutReport {
            id: "abc".into(),
            baker: Address::from("tz1P6WKJu2rcbxKiKRZHKQKmKrpC9TfW1AwM"),
            timestamp: Utc::now(),
            cycle: 5,
            kind: PayoutKind::DelegatorReward,
            tx_kind: TxKind::Native,
            fa_contract: Address::default(),
            fa_token_id: 0,
            delegator: Address::default(),
            delegated_balance: Mutez::ZERO,
            recipient: Address::from("tz1X7U9XxVz6NDxL4DSZhijME61PW45bYUJE"),
            amount: Mutez::new(10),
            fee_rate: Portion::ZERO,
            fee: Mutez::ZERO,
            transaction_fee: 0,
            op_hash: OpHash::default(),
            is_success: true,
            note: String::new(),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["success"], true);
        assert!(json.get("op_hash").is_none());

        let back: PayoutReport = serde_json::from_value(json).unwrap();
        assert_eq!(back, report);
        assert_eq!(back.delegator_or_recipient(), &report.recipient);
    }
}
