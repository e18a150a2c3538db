use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::commands::processor::executor::{CommandExecutor, ExecutorError};
use crate::commands::Command;
use crate::identifier::Identifier;
use crate::registry::InstanceRegistryRepository;

/// Executor of the `RESUME_INSTANCE` command
pub struct ResumeInstanceExecutor {
    instance: Identifier,
    instance_registry: Arc<dyn InstanceRegistryRepository>,
}

impl ResumeInstanceExecutor {
    pub fn new(instance: Identifier, instance_registry: Arc<dyn InstanceRegistryRepository>) -> Self {
        Self {
            instance,
            instance_registry,
        }
    }
}

#[async_trait]
impl CommandExecutor for ResumeInstanceExecutor {
    async fn execute(&self, command: &Command) -> Result<(), ExecutorError> {
        self.instance_registry.set_active(&self.instance).await?;

        info!(instance = %self.instance, command_id = %command.id, "Instance resumed");
        Ok(())
    }

    fn name(&self) -> &str {
        "resume_instance"
    }
}
