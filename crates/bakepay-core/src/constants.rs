//! Protocol and payout constants

/// µ-token units per whole token
pub const MUTEZ_FACTOR: i64 = 1_000_000;

/// Display symbol for amounts
pub const TOKEN_SYMBOL: &str = "TEZ";

/// Portion scale: 4 decimal places
pub const PORTION_SCALE: u32 = 10_000;

/// Delegation capacity as a multiple of own staked balance
pub const DELEGATION_CAPACITY_FACTOR: i64 = 9;

/// Default baker fee rate (5%)
pub const DEFAULT_BAKER_FEE: f64 = 0.05;

// === Transaction buffers ===

/// Extra gas on top of simulated consumption
pub const DEFAULT_TX_GAS_LIMIT_BUFFER: i64 = 100;

/// Extra deserialization gas per transfer
pub const DEFAULT_TX_DESERIALIZATION_GAS_BUFFER: i64 = 2;

/// Extra fee per transaction
pub const DEFAULT_TX_FEE_BUFFER: i64 = 0;

/// Extra fee for contract recipients
pub const DEFAULT_KT_TX_FEE_BUFFER: i64 = 0;

/// Per-payout reserve when checking baker balance
pub const PAYOUT_FEE_BUFFER: i64 = 1_000;

/// Bytes reserved for operation header and signature when batching
pub const DEFAULT_BATCHING_OPERATION_DATA_BUFFER: i64 = 3_000;

/// Candidates simulated per operation
pub const DEFAULT_SIMULATION_TX_BATCH_SIZE: usize = 50;

/// Storage bytes burned when a new account is allocated
pub const ALLOCATION_STORAGE: i64 = 257;

/// Operation time-to-live in blocks
pub const MAX_OPERATION_TTL: i64 = 12;

// === Fee model (nanotez) ===

pub const MINIMAL_FEE_NANOTEZ: i64 = 100_000;
pub const MINIMAL_NANOTEZ_PER_BYTE: i64 = 1_000;
pub const MINIMAL_NANOTEZ_PER_GAS_UNIT: i64 = 100;

/// Storage cost per byte in µ-token
pub const STORAGE_COST_PER_BYTE: i64 = 250;

// === Protocol defaults ===

pub const DEFAULT_HARD_GAS_LIMIT_PER_OPERATION: i64 = 1_040_000;
pub const DEFAULT_HARD_STORAGE_LIMIT_PER_OPERATION: i64 = 60_000;
pub const DEFAULT_MAX_OPERATION_DATA_LENGTH: i64 = 32 * 1024;

/// Recipient of the bracketing burn transfers during estimation
pub const BURN_ADDRESS: &str = "tz1burnburnburnburnburnburnburjAYjjX";

// === Scheduling ===

/// Delay before retrying a failed continual cycle
pub const CONTINUAL_RETRY_DELAY_SECS: u64 = 300;

/// Default bound on cycle lock acquisition
pub const DEFAULT_CYCLE_LOCK_TIMEOUT_SECS: u64 = 600;

/// Cycle monitor polling interval
pub const DEFAULT_CYCLE_MONITOR_INTERVAL_SECS: u64 = 60;

/// Balance re-check interval
pub const DEFAULT_BALANCE_CHECK_INTERVAL_SECS: u64 = 300;

/// Balance re-checks before giving up
pub const DEFAULT_BALANCE_CHECK_ATTEMPTS: u32 = 12;
