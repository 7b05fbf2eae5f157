//! Continual mode
//!
//! ```text
//!  monitor ──cycle──► lock ──► already paid? ──► generate ──► prepare ──► execute
//!     ▲                                                                      │
//!     └──────────────────────────── next cycle ◄─────────────────────────────┘
//! ```
//!
//! Cycles are processed in order, one at a time. A cycle without data is
//! skipped, a recoverable failure is retried after a fixed delay and any
//! other failure stops the loop.

use crate::engines::{build_engines, EngineSet};
use crate::payout::{pay_blueprints, PayOptions};
use bakepay_core::constants::CONTINUAL_RETRY_DELAY_SECS;
use bakepay_core::engines::Reporter;
use bakepay_core::{PayoutError, Result, RuntimeConfiguration};
use bakepay_engines::{CycleLock, CycleMonitor, PollingCycleMonitor};
use bakepay_pipeline::{generate_payouts, ExecutePayoutsOptions, GeneratePayoutsOptions};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Clone, Copy, Debug, Default)]
pub struct ContinualOptions {
    /// First cycle to pay, otherwise the last completed one
    pub cycle: Option<i64>,
    /// Stop after paying this cycle
    pub end_cycle: Option<i64>,
    pub dry_run: bool,
}

/// Cycle to process once the monitor reports `latest` as completed
fn next_cycle(last_processed: Option<i64>, latest: i64) -> i64 {
    match last_processed {
        Some(last) => last + 1,
        None => latest,
    }
}

pub async fn run_continual(
    configuration: Arc<RuntimeConfiguration>,
    options: ContinualOptions,
    cancellation: CancellationToken,
) -> Result<()> {
    let set = build_engines(&configuration, options.dry_run, cancellation.clone())?;
    let interval = Duration::from_secs(configuration.engines.cycle_monitor_interval_secs);
    let monitor = PollingCycleMonitor::spawn(set.collector.clone(), interval, cancellation.clone());

    let mut last_processed = options.cycle.map(|cycle| cycle - 1);
    info!(
        baker = %configuration.baker,
        start = ?options.cycle,
        end = ?options.end_cycle,
        dry_run = options.dry_run,
        "Continual payouts started"
    );

    loop {
        let Some(latest) = monitor
            .wait_for_next_completed_cycle(last_processed.unwrap_or(i64::MIN))
            .await
        else {
            break;
        };
        let cycle = next_cycle(last_processed, latest);
        if options.end_cycle.is_some_and(|end| cycle > end) {
            break;
        }

        match process_cycle(cycle, &configuration, &set, &options).await {
            Ok(()) => last_processed = Some(cycle),
            Err(e) if e.is_no_data() => {
                warn!(cycle, error = %e, "No data for cycle, skipping");
                last_processed = Some(cycle);
            }
            Err(e) if e.is_recoverable() => {
                error!(cycle, error = %e, code = e.code(), "Cycle failed, retrying later");
                set.engines
                    .admin_notify(&format!("payouts of cycle {} failed and will be retried: {}", cycle, e));
                tokio::select! {
                    _ = cancellation.cancelled() => break,
                    _ = tokio::time::sleep(Duration::from_secs(CONTINUAL_RETRY_DELAY_SECS)) => {}
                }
            }
            Err(e) => {
                set.engines
                    .admin_notify(&format!("payouts of cycle {} failed, continual mode stopped: {}", cycle, e));
                return Err(e);
            }
        }

        if cancellation.is_cancelled() || (options.end_cycle.is_some() && options.end_cycle == last_processed) {
            break;
        }
    }
    info!(last_processed = ?last_processed, "Continual payouts stopped");
    Ok(())
}

async fn process_cycle(
    cycle: i64,
    configuration: &Arc<RuntimeConfiguration>,
    set: &EngineSet,
    options: &ContinualOptions,
) -> Result<()> {
    let timeout = Duration::from_secs(configuration.engines.lock_timeout_secs);
    let _lock = CycleLock::acquire(&configuration.engines.lock_dir, cycle, timeout).await?;

    if let Some(summary) = set.reporter.get_existing_cycle_summary(cycle)? {
        info!(cycle, paid_delegators = summary.paid_delegators, "Cycle already paid");
        return Ok(());
    }

    info!(cycle, "Paying cycle");
    let configuration = configuration.clone();
    let engines = set.engines.clone();
    let dry_run = options.dry_run;
    let outcome = tokio::task::spawn_blocking(move || {
        let generate = GeneratePayoutsOptions {
            cycle,
            wait_for_sufficient_balance: true,
            ..Default::default()
        };
        let blueprint = generate_payouts(configuration.clone(), engines.clone(), &generate)?;
        let options = PayOptions {
            execute: ExecutePayoutsOptions {
                dry_run,
                ..Default::default()
            },
            ..Default::default()
        };
        pay_blueprints(vec![blueprint], configuration, engines, &options)
    })
    .await
    .map_err(|e| PayoutError::Io(format!("payout task of cycle {} failed: {}", cycle, e)))??;

    if let Some(e) = outcome.error {
        return Err(e);
    }
    info!(
        cycle,
        batches = outcome.result.batch_results.len(),
        failed = outcome.result.failed_count(),
        paid_delegators = outcome.result.paid_delegators,
        "Cycle paid"
    );
    Ok(())
}
