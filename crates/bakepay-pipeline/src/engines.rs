//! Collaborator bundle handed to every pipeline

use crate::hooks::{ExtensionHost, HookRegistry};
use bakepay_core::engines::{Collector, Notifier, Reporter, Signer, Transactor};
use bakepay_core::error::{PayoutError, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Collaborators of a pipeline run. Missing ones fail only when a stage
/// actually needs them.
#[derive(Clone)]
pub struct PayoutEngines {
    collector: Option<Arc<dyn Collector>>,
    signer: Option<Arc<dyn Signer>>,
    transactor: Option<Arc<dyn Transactor>>,
    reporter: Option<Arc<dyn Reporter>>,
    notifier: Option<Arc<dyn Notifier>>,
    extensions: Arc<dyn ExtensionHost>,
    cancellation: CancellationToken,
}

impl Default for PayoutEngines {
    fn default() -> Self {
        Self {
            collector: None,
            signer: None,
            transactor: None,
            reporter: None,
            notifier: None,
            extensions: Arc::new(HookRegistry::new()),
            cancellation: CancellationToken::new(),
        }
    }
}

impl PayoutEngines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collector(mut self, collector: Arc<dyn Collector>) -> Self {
        self.collector = Some(collector);
        self
    }

    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn with_transactor(mut self, transactor: Arc<dyn Transactor>) -> Self {
        self.transactor = Some(transactor);
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_extensions(mut self, extensions: Arc<dyn ExtensionHost>) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn collector(&self) -> Result<&dyn Collector> {
        self.collector
            .as_deref()
            .ok_or(PayoutError::MissingEngine("collector"))
    }

    pub fn signer(&self) -> Result<&dyn Signer> {
        self.signer.as_deref().ok_or(PayoutError::MissingEngine("signer"))
    }

    pub fn transactor(&self) -> Result<&dyn Transactor> {
        self.transactor
            .as_deref()
            .ok_or(PayoutError::MissingEngine("transactor"))
    }

    pub fn reporter(&self) -> Result<&dyn Reporter> {
        self.reporter
            .as_deref()
            .ok_or(PayoutError::MissingEngine("reporter"))
    }

    pub fn notifier(&self) -> Option<&dyn Notifier> {
        self.notifier.as_deref()
    }

    pub fn extensions(&self) -> &dyn ExtensionHost {
        self.extensions.as_ref()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Best effort; a failing notifier only logs
    pub fn admin_notify(&self, message: &str) {
        if let Some(notifier) = self.notifier() {
            if let Err(e) = notifier.admin_notify(message) {
                warn!(error = %e, "admin notification failed");
            }
        }
    }
}
