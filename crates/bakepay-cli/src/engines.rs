//! Wiring of the bundled engines from the runtime configuration

use bakepay_core::{PayoutError, Result, RuntimeConfiguration};
use bakepay_engines::prelude::*;
use bakepay_pipeline::PayoutEngines;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Engines of one CLI invocation
pub struct EngineSet {
    pub collector: Arc<SimulatedCollector>,
    pub reporter: Arc<FsReporter>,
    pub engines: PayoutEngines,
}

pub fn build_engines(
    configuration: &RuntimeConfiguration,
    dry_run: bool,
    cancellation: CancellationToken,
) -> Result<EngineSet> {
    let settings = &configuration.engines;
    let seed = settings.signer_seed.as_deref().ok_or_else(|| {
        PayoutError::Configuration("engines.signer_seed is required to sign payouts".to_string())
    })?;
    let signer = InMemorySigner::from_hex_seed(seed, configuration.baker.clone())?;

    let collector = Arc::new(SimulatedCollector::open(&settings.data_dir)?);
    let reporter = Arc::new(FsReporter::new(&settings.reports_dir).with_dry_run(dry_run));
    let transactor = OutboxTransactor::new(&settings.outbox_dir, settings.operation_limits)?;

    let engines = PayoutEngines::new()
        .with_collector(collector.clone())
        .with_signer(Arc::new(signer))
        .with_transactor(Arc::new(transactor))
        .with_reporter(reporter.clone())
        .with_notifier(Arc::new(LogNotifier::new()))
        .with_cancellation(cancellation);

    Ok(EngineSet {
        collector,
        reporter,
        engines,
    })
}
