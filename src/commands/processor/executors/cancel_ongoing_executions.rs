use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::commands::processor::executor::{CommandExecutor, ExecutorError};
use crate::commands::processor::job_control::WorkerJobControl;
use crate::commands::Command;
use crate::identifier::Identifier;

/// Executor of the `CANCEL_ONGOING_EXECUTIONS` command
pub struct CancelOngoingExecutionsExecutor {
    instance: Identifier,
    job_control: Arc<dyn WorkerJobControl>,
}

impl CancelOngoingExecutionsExecutor {
    pub fn new(instance: Identifier, job_control: Arc<dyn WorkerJobControl>) -> Self {
        Self {
            instance,
            job_control,
        }
    }
}

#[async_trait]
impl CommandExecutor for CancelOngoingExecutionsExecutor {
    async fn execute(&self, command: &Command) -> Result<(), ExecutorError> {
        info!(
            instance = %self.instance,
            command_id = %command.id,
            "Cancelling ongoing executions"
        );
        self.job_control
            .cancel_ongoing_executions(&self.instance)
            .await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "cancel_ongoing_executions"
    }
}
