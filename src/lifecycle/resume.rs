use tracing::info;

use crate::commands::{Command, CommandType};
use crate::component_provider::TaskReactorInstanceComponentProvider;
use crate::error::Result;
use crate::identifier::Identifier;
use crate::lifecycle::action_executor::{FanOutReport, TaskReactorInstanceActionExecutor};
use crate::logging::log_instance_operation;

/// Requests resuming of task reactor instances by enqueueing `RESUME_INSTANCE`
#[derive(Debug, Clone)]
pub struct ResumeTaskReactorService {
    component_provider: TaskReactorInstanceComponentProvider,
    action_executor: TaskReactorInstanceActionExecutor,
}

impl ResumeTaskReactorService {
    pub fn new(component_provider: TaskReactorInstanceComponentProvider) -> Self {
        let action_executor =
            TaskReactorInstanceActionExecutor::new(component_provider.instance_registry());
        Self {
            component_provider,
            action_executor,
        }
    }

    pub async fn resume_instance(&self, instance: &Identifier) -> Result<Command> {
        let command = self
            .component_provider
            .commands_queue(instance)
            .add_command_with_empty_payload(CommandType::ResumeInstance)
            .await?;

        info!(instance = %instance, command_id = %command.id, "Resume requested");
        Ok(command)
    }

    pub async fn resume_all_instances(&self) -> Result<FanOutReport> {
        let report = self
            .action_executor
            .apply_to_all_existing_instances(|instance| async move {
                self.resume_instance(&instance).await.map(|_| ())
            })
            .await?;

        log_instance_operation(
            "resume_all",
            None,
            if report.is_success() { "enqueued" } else { "partial" },
            Some(&format!("{} succeeded, {} failed", report.succeeded.len(), report.failed.len())),
        );
        Ok(report)
    }
}
