//! Cycle monitor
//!
//! ```text
//!  poll task ──get_last_completed_cycle──► Collector
//!      │
//!      └──watch──► wait_for_next_completed_cycle(last) ──► scheduler
//! ```
//!
//! The poll task runs until its cancellation token fires. Waiters return
//! `None` once cancelled.

use async_trait::async_trait;
use bakepay_core::engines::Collector;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[async_trait]
pub trait CycleMonitor: Send + Sync {
    /// Block until a completed cycle newer than `last` shows up
    async fn wait_for_next_completed_cycle(&self, last: i64) -> Option<i64>;
}

pub struct PollingCycleMonitor {
    latest: watch::Receiver<Option<i64>>,
    cancellation: CancellationToken,
    task: JoinHandle<()>,
}

impl PollingCycleMonitor {
    /// Start polling `collector` every `interval`
    pub fn spawn(collector: Arc<dyn Collector>, interval: Duration, cancellation: CancellationToken) -> Self {
        let (sender, latest) = watch::channel(None);
        let token = cancellation.clone();
        let task = tokio::spawn(async move {
            info!(collector = collector.id(), interval_secs = interval.as_secs(), "Cycle monitor started");
            loop {
                match collector.get_last_completed_cycle() {
                    Ok(cycle) => {
                        sender.send_if_modified(|current| {
                            if *current == Some(cycle) {
                                return false;
                            }
                            debug!(cycle, "Last completed cycle changed");
                            *current = Some(cycle);
                            true
                        });
                    }
                    Err(e) => warn!(error = %e, "Failed to fetch last completed cycle"),
                }
                tokio::select! {
                    _ = token.cancelled() => {
                        info!("Cycle monitor stopped");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        });
        Self {
            latest,
            cancellation,
            task,
        }
    }

    /// Last completed cycle seen so far
    pub fn latest(&self) -> Option<i64> {
        *self.latest.borrow()
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

#[async_trait]
impl CycleMonitor for PollingCycleMonitor {
    async fn wait_for_next_completed_cycle(&self, last: i64) -> Option<i64> {
        let mut latest = self.latest.clone();
        loop {
            let current = *latest.borrow_and_update();
            if let Some(cycle) = current {
                if cycle > last {
                    return Some(cycle);
                }
            }
            tokio::select! {
                _ = self.cancellation.cancelled() => return None,
                changed = latest.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                }
            }
        }
    }
}

impl Drop for PollingCycleMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}
