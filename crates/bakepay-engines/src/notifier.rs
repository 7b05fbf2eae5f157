//! Log notifier
//!
//! Renders a summary template and emits it through `tracing`. Placeholders
//! are `<Name>`; summary fields are resolved through [`SUMMARY_FIELDS`],
//! anything else through the additional data passed by the caller.

use bakepay_core::engines::Notifier;
use bakepay_core::{CyclePayoutSummary, Result};
use std::collections::HashMap;
use tracing::{info, warn};

type FieldAccessor = fn(&CyclePayoutSummary) -> String;

/// Template placeholders backed by summary fields
pub const SUMMARY_FIELDS: &[(&str, FieldAccessor)] = &[
    ("Cycle", |s| s.cycle.to_string()),
    ("Delegators", |s| s.delegators.to_string()),
    ("PaidDelegators", |s| s.paid_delegators.to_string()),
    ("OwnStakedBalance", |s| s.own_staked_balance.to_tez_string()),
    ("OwnDelegatedBalance", |s| s.own_delegated_balance.to_tez_string()),
    ("ExternalStakedBalance", |s| s.external_staked_balance.to_tez_string()),
    ("ExternalDelegatedBalance", |s| s.external_delegated_balance.to_tez_string()),
    ("StakingBalance", |s| s.total_staked_balance().to_tez_string()),
    ("DelegatedBalance", |s| s.total_delegated_balance().to_tez_string()),
    ("EarnedFees", |s| s.earned_fees.to_tez_string()),
    ("EarnedRewards", |s| s.earned_rewards.to_tez_string()),
    ("DistributedRewards", |s| s.distributed_rewards.to_tez_string()),
    ("BondIncome", |s| s.bond_income.to_tez_string()),
    ("FeeIncome", |s| s.fee_income.to_tez_string()),
    ("TotalIncome", |s| s.income_total.to_tez_string()),
    ("DonatedBonds", |s| s.donated_bonds.to_tez_string()),
    ("DonatedFees", |s| s.donated_fees.to_tez_string()),
    ("DonatedTotal", |s| s.donated_total.to_tez_string()),
    ("Timestamp", |s| s.timestamp.to_rfc3339()),
];

pub const DEFAULT_SUMMARY_TEMPLATE: &str =
    "Cycle <Cycle> paid out: <DistributedRewards> to <PaidDelegators> of <Delegators> delegators, income <TotalIncome>";

/// Replace every known `<Name>` placeholder in `template`
pub fn render_summary(
    template: &str,
    summary: &CyclePayoutSummary,
    additional_data: &HashMap<String, String>,
) -> String {
    let mut rendered = template.to_string();
    for (name, accessor) in SUMMARY_FIELDS {
        let placeholder = format!("<{}>", name);
        if rendered.contains(&placeholder) {
            rendered = rendered.replace(&placeholder, &accessor(summary));
        }
    }
    for (name, value) in additional_data {
        rendered = rendered.replace(&format!("<{}>", name), value);
    }
    rendered
}

pub struct LogNotifier {
    template: String,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::with_template(DEFAULT_SUMMARY_TEMPLATE)
    }

    pub fn with_template(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for LogNotifier {
    fn payout_summary_notify(
        &self,
        summary: &CyclePayoutSummary,
        additional_data: &HashMap<String, String>,
    ) -> Result<()> {
        let message = render_summary(&self.template, summary, additional_data);
        info!(cycle = summary.cycle, notifier = "log", "{}", message);
        Ok(())
    }

    fn admin_notify(&self, message: &str) -> Result<()> {
        warn!(notifier = "log", "{}", message);
        Ok(())
    }
}
