use tracing::info;

use crate::commands::{Command, CommandType};
use crate::component_provider::TaskReactorInstanceComponentProvider;
use crate::error::Result;
use crate::identifier::Identifier;
use crate::lifecycle::action_executor::{FanOutReport, TaskReactorInstanceActionExecutor};
use crate::logging::log_instance_operation;

/// Requests pausing of task reactor instances.
///
/// Pausing is asynchronous: the service only enqueues `PAUSE_INSTANCE`, the
/// instance becomes inactive once its dispatcher executes the command.
#[derive(Debug, Clone)]
pub struct PauseTaskReactorService {
    component_provider: TaskReactorInstanceComponentProvider,
    action_executor: TaskReactorInstanceActionExecutor,
}

impl PauseTaskReactorService {
    pub fn new(component_provider: TaskReactorInstanceComponentProvider) -> Self {
        let action_executor =
            TaskReactorInstanceActionExecutor::new(component_provider.instance_registry());
        Self {
            component_provider,
            action_executor,
        }
    }

    pub async fn pause_instance(&self, instance: &Identifier) -> Result<Command> {
        let command = self
            .component_provider
            .commands_queue(instance)
            .add_command_with_empty_payload(CommandType::PauseInstance)
            .await?;

        info!(instance = %instance, command_id = %command.id, "Pause requested");
        Ok(command)
    }

    /// Enqueue `PAUSE_INSTANCE` into every instance of the registry
    pub async fn pause_all_instances(&self) -> Result<FanOutReport> {
        let report = self
            .action_executor
            .apply_to_all_existing_instances(|instance| async move {
                self.pause_instance(&instance).await.map(|_| ())
            })
            .await?;

        log_instance_operation(
            "pause_all",
            None,
            if report.is_success() { "enqueued" } else { "partial" },
            Some(&format!("{} succeeded, {} failed", report.succeeded.len(), report.failed.len())),
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandsQueueRepository;
    use crate::config::TaskReactorConfig;
    use crate::registry::{InstanceRegistryRepository, TaskReactorInstance};

    #[tokio::test]
    async fn test_pause_instance_does_not_flip_active_flag() {
        let provider = TaskReactorInstanceComponentProvider::in_memory(TaskReactorConfig::default());
        let instance = Identifier::from_with_auto_quoting("ziemniaczek");
        provider
            .commands_queue_repository()
            .create_queue(&instance)
            .await
            .unwrap();
        provider
            .instance_registry()
            .insert(TaskReactorInstance::provisioned(instance.clone()))
            .await
            .unwrap();

        let service = PauseTaskReactorService::new(provider.clone());
        let command = service.pause_instance(&instance).await.unwrap();

        assert_eq!(command.command_type, CommandType::PauseInstance);
        assert!(command.payload.is_none());
        assert!(provider.instance_registry().fetch(&instance).await.unwrap().is_active);
    }

    #[tokio::test]
    async fn test_pause_unknown_instance_fails() {
        let provider = TaskReactorInstanceComponentProvider::in_memory(TaskReactorConfig::default());
        let service = PauseTaskReactorService::new(provider);

        let result = service
            .pause_instance(&Identifier::from_with_auto_quoting("missing"))
            .await;
        assert!(result.is_err());
    }
}
