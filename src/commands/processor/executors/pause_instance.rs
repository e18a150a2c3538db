use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::commands::processor::executor::{CommandExecutor, ExecutorError};
use crate::commands::processor::job_control::WorkerJobControl;
use crate::commands::Command;
use crate::identifier::Identifier;
use crate::registry::InstanceRegistryRepository;

/// Executor of the `PAUSE_INSTANCE` command.
///
/// Tears down in-flight work first and only then deactivates the instance,
/// so a failed teardown leaves the instance active and the command retryable.
pub struct PauseInstanceExecutor {
    instance: Identifier,
    instance_registry: Arc<dyn InstanceRegistryRepository>,
    job_control: Arc<dyn WorkerJobControl>,
}

impl PauseInstanceExecutor {
    pub fn new(
        instance: Identifier,
        instance_registry: Arc<dyn InstanceRegistryRepository>,
        job_control: Arc<dyn WorkerJobControl>,
    ) -> Self {
        Self {
            instance,
            instance_registry,
            job_control,
        }
    }
}

#[async_trait]
impl CommandExecutor for PauseInstanceExecutor {
    async fn execute(&self, command: &Command) -> Result<(), ExecutorError> {
        self.job_control
            .cancel_ongoing_executions(&self.instance)
            .await?;
        self.instance_registry.set_inactive(&self.instance).await?;

        info!(instance = %self.instance, command_id = %command.id, "Instance paused");
        Ok(())
    }

    fn name(&self) -> &str {
        "pause_instance"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandType;
    use crate::registry::{InMemoryInstanceRegistry, TaskReactorInstance};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FailingJobControl {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WorkerJobControl for FailingJobControl {
        async fn cancel_ongoing_executions(&self, _instance: &Identifier) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("workers unreachable")
        }
    }

    #[tokio::test]
    async fn test_failed_teardown_keeps_instance_active() {
        let instance = Identifier::from_with_auto_quoting("ziemniaczek");
        let registry = Arc::new(InMemoryInstanceRegistry::new());
        registry
            .insert(TaskReactorInstance::provisioned(instance.clone()))
            .await
            .unwrap();
        let job_control = Arc::new(FailingJobControl::default());

        let executor =
            PauseInstanceExecutor::new(instance.clone(), registry.clone(), job_control.clone());
        let result = executor
            .execute(&Command::with_empty_payload(CommandType::PauseInstance))
            .await;

        assert!(matches!(result, Err(ExecutorError::Other(_))));
        assert_eq!(job_control.calls.load(Ordering::SeqCst), 1);
        assert!(registry.fetch(&instance).await.unwrap().is_active);
    }
}
