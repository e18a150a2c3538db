//! # Command Executor Registry
//!
//! Static mapping from [`CommandType`] to the executor that handles it,
//! resolved once at startup. New command types are supported by
//! registering another executor; the dispatcher itself never changes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::commands::processor::executors::{
    CancelOngoingExecutionsExecutor, PauseInstanceExecutor, ResumeInstanceExecutor,
};
use crate::commands::processor::job_control::WorkerJobControl;
use crate::commands::{Command, CommandType};
use crate::identifier::Identifier;
use crate::registry::InstanceRegistryRepository;

/// Failure raised by an executor while handling a command
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("Invalid payload: {reason}")]
    InvalidPayload { reason: String },

    #[error(transparent)]
    TaskReactor(#[from] crate::error::TaskReactorError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Handler bound to a single command type.
///
/// The dispatcher delivers commands at least once: a crash between
/// `execute` returning and the acknowledgement reaching the queue causes
/// the same command to be executed again, so implementations must be
/// idempotent.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, command: &Command) -> Result<(), ExecutorError>;

    /// Get executor name for debugging
    fn name(&self) -> &str;
}

#[derive(Clone, Default)]
pub struct CommandExecutorRegistry {
    executors: HashMap<CommandType, Arc<dyn CommandExecutor>>,
}

impl std::fmt::Debug for CommandExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<&str> = self.executors.keys().map(CommandType::as_str).collect();
        types.sort_unstable();
        f.debug_struct("CommandExecutorRegistry")
            .field("command_types", &types)
            .finish()
    }
}

impl CommandExecutorRegistry {
    pub fn builder() -> CommandExecutorRegistryBuilder {
        CommandExecutorRegistryBuilder::default()
    }

    /// Registry with an executor for every built-in command type
    pub fn with_default_executors(
        instance: Identifier,
        instance_registry: Arc<dyn InstanceRegistryRepository>,
        job_control: Arc<dyn WorkerJobControl>,
    ) -> Self {
        Self::builder()
            .with_default_executors(instance, instance_registry, job_control)
            .build()
    }

    pub fn resolve(&self, command_type: &CommandType) -> Option<Arc<dyn CommandExecutor>> {
        self.executors.get(command_type).cloned()
    }

    pub fn has_executor(&self, command_type: &CommandType) -> bool {
        self.executors.contains_key(command_type)
    }

    pub fn registered_command_types(&self) -> Vec<CommandType> {
        self.executors.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}

#[derive(Default)]
pub struct CommandExecutorRegistryBuilder {
    executors: HashMap<CommandType, Arc<dyn CommandExecutor>>,
}

impl CommandExecutorRegistryBuilder {
    pub fn register(mut self, command_type: CommandType, executor: Arc<dyn CommandExecutor>) -> Self {
        if self.executors.contains_key(&command_type) {
            warn!(
                command_type = %command_type,
                "Replacing existing executor for command type"
            );
        }
        info!(
            command_type = %command_type,
            executor = executor.name(),
            "Registered command executor"
        );
        self.executors.insert(command_type, executor);
        self
    }

    pub fn with_default_executors(
        self,
        instance: Identifier,
        instance_registry: Arc<dyn InstanceRegistryRepository>,
        job_control: Arc<dyn WorkerJobControl>,
    ) -> Self {
        self.register(
            CommandType::PauseInstance,
            Arc::new(PauseInstanceExecutor::new(
                instance.clone(),
                instance_registry.clone(),
                job_control.clone(),
            )),
        )
        .register(
            CommandType::ResumeInstance,
            Arc::new(ResumeInstanceExecutor::new(instance.clone(), instance_registry)),
        )
        .register(
            CommandType::CancelOngoingExecutions,
            Arc::new(CancelOngoingExecutionsExecutor::new(instance, job_control)),
        )
    }

    pub fn build(self) -> CommandExecutorRegistry {
        CommandExecutorRegistry {
            executors: self.executors,
        }
    }
}
