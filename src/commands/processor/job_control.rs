//! Boundary to the connector's own job-control surface

use async_trait::async_trait;
use tracing::debug;

use crate::identifier::Identifier;

/// Stops work running inside an instance.
///
/// Implemented by the connector; cancellation is cooperative, workers are
/// expected to observe the request and wind down on their own.
#[async_trait]
pub trait WorkerJobControl: Send + Sync {
    async fn cancel_ongoing_executions(&self, instance: &Identifier) -> anyhow::Result<()>;
}

/// Job control for connectors that run no cancellable workers
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopJobControl;

#[async_trait]
impl WorkerJobControl for NoopJobControl {
    async fn cancel_ongoing_executions(&self, instance: &Identifier) -> anyhow::Result<()> {
        debug!(instance = %instance, "No ongoing executions to cancel");
        Ok(())
    }
}
