use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use deadcheck_core::TimeSource;
use deadcheck_monitor::{CallContext, CheckDefinition, IncidentOrchestrator};

/// A configured check and the orchestrator for its alert provider.
pub struct MonitoredCheck {
    pub definition: CheckDefinition,
    pub orchestrator: Arc<IncidentOrchestrator>,
}

pub struct AppState {
    /// In config order.
    pub checks: Vec<MonitoredCheck>,
    pub clock: Arc<dyn TimeSource>,
    /// Budget for the provider calls behind one request.
    pub provider_timeout: Duration,
    /// Cancelled on shutdown; aborts in-flight provider calls.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn check(&self, id: &str) -> Option<&MonitoredCheck> {
        self.checks.iter().find(|c| c.definition.id == id)
    }

    /// Context for the provider work of one request.
    pub fn call_context(&self) -> CallContext {
        CallContext::background()
            .with_cancellation(self.shutdown.child_token())
            .with_timeout(self.provider_timeout)
    }
}
