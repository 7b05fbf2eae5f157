//! Runtime configuration
//!
//! Loaded from a TOML file with `BAKEPAY__<SECTION>__<KEY>` environment
//! overrides on top. Every section falls back to its defaults, so a file
//! only needs the baker address.

use crate::address::Address;
use crate::constants::{
    DEFAULT_BAKER_FEE, DEFAULT_BALANCE_CHECK_ATTEMPTS, DEFAULT_BALANCE_CHECK_INTERVAL_SECS,
    DEFAULT_CYCLE_LOCK_TIMEOUT_SECS, DEFAULT_CYCLE_MONITOR_INTERVAL_SECS,
    DEFAULT_KT_TX_FEE_BUFFER, DEFAULT_SIMULATION_TX_BATCH_SIZE,
    DEFAULT_TX_DESERIALIZATION_GAS_BUFFER, DEFAULT_TX_FEE_BUFFER, DEFAULT_TX_GAS_LIMIT_BUFFER,
};
use crate::batch::OperationLimits;
use crate::enums::{PayoutMode, RewardDestination};
use crate::error::{PayoutError, Result};
use crate::money::{Mutez, Portion};
use serde::{Deserialize, Serialize};
use std::path::Path;

const ENV_PREFIX: &str = "BAKEPAY";
const ENV_SEPARATOR: &str = "__";

/// Complete runtime configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RuntimeConfiguration {
    /// Baker whose rewards are paid out
    #[serde(default)]
    pub baker: Address,

    #[serde(default)]
    pub payouts: PayoutConfiguration,

    #[serde(default)]
    pub delegators: DelegatorsConfiguration,

    #[serde(default)]
    pub income_recipients: IncomeRecipients,

    #[serde(default)]
    pub network: NetworkConfiguration,

    #[serde(default)]
    pub overdelegation: OverdelegationConfiguration,

    #[serde(default)]
    pub engines: EnginesConfiguration,
}

/// How payouts are computed and charged
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PayoutConfiguration {
    #[serde(default)]
    pub payout_mode: PayoutMode,

    /// Baker fee rate
    #[serde(default = "default_fee")]
    pub fee: Portion,

    #[serde(default)]
    pub baker_pays_transaction_fee: bool,

    #[serde(default)]
    pub baker_pays_allocation_fee: bool,

    /// Payouts must exceed this amount after costs
    #[serde(default)]
    pub minimum_payout_amount: Mutez,

    #[serde(default)]
    pub ignore_empty_accounts: bool,

    #[serde(default = "default_tx_gas_limit_buffer")]
    pub transaction_gas_limit_buffer: i64,

    #[serde(default = "default_tx_deserialization_gas_buffer")]
    pub transaction_deserialization_gas_buffer: i64,

    #[serde(default = "default_tx_fee_buffer")]
    pub transaction_fee_buffer: i64,

    #[serde(default = "default_kt_tx_fee_buffer")]
    pub kt_transaction_fee_buffer: i64,

    #[serde(default = "default_simulation_batch_size")]
    pub simulation_batch_size: usize,

    #[serde(default = "default_balance_check_interval_secs")]
    pub balance_check_interval_secs: u64,

    #[serde(default = "default_balance_check_attempts")]
    pub balance_check_attempts: u32,
}

fn default_fee() -> Portion {
    Portion::from_f64(DEFAULT_BAKER_FEE)
}

fn default_tx_gas_limit_buffer() -> i64 {
    DEFAULT_TX_GAS_LIMIT_BUFFER
}

fn default_tx_deserialization_gas_buffer() -> i64 {
    DEFAULT_TX_DESERIALIZATION_GAS_BUFFER
}

fn default_tx_fee_buffer() -> i64 {
    DEFAULT_TX_FEE_BUFFER
}

fn default_kt_tx_fee_buffer() -> i64 {
    DEFAULT_KT_TX_FEE_BUFFER
}

fn default_simulation_batch_size() -> usize {
    DEFAULT_SIMULATION_TX_BATCH_SIZE
}

fn default_balance_check_interval_secs() -> u64 {
    DEFAULT_BALANCE_CHECK_INTERVAL_SECS
}

fn default_balance_check_attempts() -> u32 {
    DEFAULT_BALANCE_CHECK_ATTEMPTS
}

impl Default for PayoutConfiguration {
    fn default() -> Self {
        Self {
            payout_mode: PayoutMode::default(),
            fee: default_fee(),
            baker_pays_transaction_fee: false,
            baker_pays_allocation_fee: false,
            minimum_payout_amount: Mutez::ZERO,
            ignore_empty_accounts: false,
            transaction_gas_limit_buffer: default_tx_gas_limit_buffer(),
            transaction_deserialization_gas_buffer: default_tx_deserialization_gas_buffer(),
            transaction_fee_buffer: default_tx_fee_buffer(),
            kt_transaction_fee_buffer: default_kt_tx_fee_buffer(),
            simulation_batch_size: default_simulation_batch_size(),
            balance_check_interval_secs: default_balance_check_interval_secs(),
            balance_check_attempts: default_balance_check_attempts(),
        }
    }
}

/// Who qualifies for a payout
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DelegatorRequirements {
    #[serde(default)]
    pub minimum_balance: Mutez,

    #[serde(default)]
    pub below_minimum_balance_reward_destination: RewardDestination,
}

/// Per-delegator deviations from the global payout settings
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatorOverride {
    pub address: Address,

    /// Pay to this address instead
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<Address>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<Portion>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_balance: Option<Mutez>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baker_pays_transaction_fee: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baker_pays_allocation_fee: Option<bool>,

    /// Delegated balance above this is not rewarded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_balance: Option<Mutez>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DelegatorsConfiguration {
    #[serde(default)]
    pub requirements: DelegatorRequirements,

    #[serde(default)]
    pub overrides: Vec<DelegatorOverride>,

    /// Never paid and never counted
    #[serde(default)]
    pub ignore: Vec<Address>,

    /// When non-empty, only these delegators are paid
    #[serde(default)]
    pub prefilter: Vec<Address>,
}

impl DelegatorsConfiguration {
    pub fn override_for(&self, delegator: &Address) -> Option<&DelegatorOverride> {
        self.overrides.iter().find(|o| &o.address == delegator)
    }
}

/// Share of an income stream
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeShare {
    pub address: Address,
    pub share: Portion,
}

/// Where the baker's own income goes
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IncomeRecipients {
    #[serde(default)]
    pub bonds: Vec<IncomeShare>,

    #[serde(default)]
    pub fees: Vec<IncomeShare>,

    #[serde(default)]
    pub donations: Vec<IncomeShare>,

    /// Portion of bond income donated
    #[serde(default)]
    pub donate_bonds: Portion,

    /// Portion of fee income donated
    #[serde(default)]
    pub donate_fees: Portion,
}

impl IncomeRecipients {
    pub fn is_donating(&self) -> bool {
        !self.donate_bonds.is_zero() || !self.donate_fees.is_zero()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NetworkConfiguration {
    #[serde(default)]
    pub do_not_pay_smart_contracts: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OverdelegationConfiguration {
    #[serde(default = "default_true")]
    pub protection_enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for OverdelegationConfiguration {
    fn default() -> Self {
        Self {
            protection_enabled: true,
        }
    }
}

/// Settings of the bundled collaborators
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnginesConfiguration {
    /// Cycle data for the simulated collector
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default = "default_reports_dir")]
    pub reports_dir: String,

    /// Signed operations awaiting broadcast
    #[serde(default = "default_outbox_dir")]
    pub outbox_dir: String,

    #[serde(default = "default_lock_dir")]
    pub lock_dir: String,

    /// Hex encoded ed25519 seed of the payout key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer_seed: Option<String>,

    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,

    #[serde(default = "default_cycle_monitor_interval_secs")]
    pub cycle_monitor_interval_secs: u64,

    #[serde(default)]
    pub operation_limits: OperationLimits,
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_reports_dir() -> String {
    "./reports".to_string()
}

fn default_outbox_dir() -> String {
    "./outbox".to_string()
}

fn default_lock_dir() -> String {
    "./locks".to_string()
}

fn default_lock_timeout_secs() -> u64 {
    DEFAULT_CYCLE_LOCK_TIMEOUT_SECS
}

fn default_cycle_monitor_interval_secs() -> u64 {
    DEFAULT_CYCLE_MONITOR_INTERVAL_SECS
}

impl Default for EnginesConfiguration {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            reports_dir: default_reports_dir(),
            outbox_dir: default_outbox_dir(),
            lock_dir: default_lock_dir(),
            signer_seed: None,
            lock_timeout_secs: default_lock_timeout_secs(),
            cycle_monitor_interval_secs: default_cycle_monitor_interval_secs(),
            operation_limits: OperationLimits::default(),
        }
    }
}

impl RuntimeConfiguration {
    /// Load `path` and apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path).format(::config::FileFormat::Toml))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| PayoutError::Configuration(format!("{}: {}", path.display(), e)))?;

        let configuration: RuntimeConfiguration = settings
            .try_deserialize()
            .map_err(|e| PayoutError::Configuration(e.to_string()))?;
        configuration.validate()?;
        tracing::debug!(baker = %configuration.baker, path = %path.display(), "configuration loaded");
        Ok(configuration)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let configuration: RuntimeConfiguration =
            toml::from_str(content).map_err(|e| PayoutError::Configuration(e.to_string()))?;
        configuration.validate()?;
        Ok(configuration)
    }

    /// Default configuration rendered as TOML
    pub fn default_toml() -> Result<String> {
        toml::to_string_pretty(&Self::default()).map_err(|e| PayoutError::Serialization(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if !self.baker.is_valid() {
            return Err(PayoutError::Configuration(format!(
                "invalid baker address '{}'",
                self.baker
            )));
        }

        let income = &self.income_recipients;
        if income.is_donating() && income.donations.is_empty() {
            return Err(PayoutError::Configuration(
                "donations are enabled but no donation recipients are configured".into(),
            ));
        }
        for (name, shares) in [
            ("bonds", &income.bonds),
            ("fees", &income.fees),
            ("donations", &income.donations),
        ] {
            if Portion::checked_total(shares.iter().map(|s| &s.share)).is_none() {
                return Err(PayoutError::Configuration(format!(
                    "{} income shares add up to more than 1",
                    name
                )));
            }
            if let Some(share) = shares.iter().find(|s| !s.address.is_valid()) {
                return Err(PayoutError::Configuration(format!(
                    "invalid {} recipient '{}'",
                    name, share.address
                )));
            }
        }

        let delegators = &self.delegators;
        let invalid_override = delegators.overrides.iter().find(|o| {
            !o.address.is_valid() || o.recipient.as_ref().is_some_and(|r| !r.is_valid())
        });
        if let Some(o) = invalid_override {
            return Err(PayoutError::Configuration(format!(
                "invalid delegator override for '{}'",
                o.address
            )));
        }
        if let Some(address) = delegators
            .ignore
            .iter()
            .chain(delegators.prefilter.iter())
            .find(|a| !a.is_valid())
        {
            return Err(PayoutError::Configuration(format!(
                "invalid delegator address '{}'",
                address
            )));
        }

        if self.payouts.simulation_batch_size == 0 {
            return Err(PayoutError::Configuration(
                "simulation_batch_size must be positive".into(),
            ));
        }
        Ok(())
    }
}
