//! # bakepay engines
//!
//! Bundled implementations of the collaborator interfaces from
//! `bakepay_core::engines`, enough to run the pipeline offline:
//!
//! ```text
//!   data_dir ──► SimulatedCollector ──┐
//!   seed ──────► InMemorySigner ──────┤
//!                                     ├──► pipeline ──► OutboxTransactor ──► outbox_dir
//!                                     │         │
//!                                     │         └─────► FsReporter ────────► reports_dir
//!   lock_dir ──► CycleLock            │
//!   PollingCycleMonitor ──────────────┘ (continual mode)
//! ```

pub mod collector;
pub mod lock;
pub mod monitor;
pub mod notifier;
pub mod reporter;
pub mod signer;
pub mod transactor;

pub use crate::collector::{ChainState, SimulatedCollector, SimulationCostModel};
pub use crate::lock::CycleLock;
pub use crate::monitor::{CycleMonitor, PollingCycleMonitor};
pub use crate::notifier::LogNotifier;
pub use crate::reporter::{FsReporter, MemoryReporter, StdioReporter};
pub use crate::signer::InMemorySigner;
pub use crate::transactor::OutboxTransactor;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::collector::SimulatedCollector;
    pub use crate::lock::CycleLock;
    pub use crate::monitor::{CycleMonitor, PollingCycleMonitor};
    pub use crate::notifier::LogNotifier;
    pub use crate::reporter::{FsReporter, MemoryReporter, StdioReporter};
    pub use crate::signer::InMemorySigner;
    pub use crate::transactor::OutboxTransactor;
}
