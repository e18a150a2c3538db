//! # Component Provider
//!
//! Dependency root of the task reactor. Holds the shared stores and hands
//! out per-instance queue handles and dispatchers wired against them.

use std::sync::Arc;

use crate::commands::processor::{CommandExecutorRegistry, Dispatcher, NoopJobControl, WorkerJobControl};
use crate::commands::{CommandsQueueRepository, InMemoryCommandsQueue, InstanceCommandsQueue};
use crate::config::TaskReactorConfig;
use crate::identifier::Identifier;
use crate::registry::{InMemoryInstanceRegistry, InstanceRegistryRepository};

#[derive(Clone)]
pub struct TaskReactorInstanceComponentProvider {
    commands_queue: Arc<dyn CommandsQueueRepository>,
    instance_registry: Arc<dyn InstanceRegistryRepository>,
    job_control: Arc<dyn WorkerJobControl>,
    config: TaskReactorConfig,
}

impl std::fmt::Debug for TaskReactorInstanceComponentProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskReactorInstanceComponentProvider")
            .field("config", &self.config)
            .finish()
    }
}

impl TaskReactorInstanceComponentProvider {
    pub fn new(
        commands_queue: Arc<dyn CommandsQueueRepository>,
        instance_registry: Arc<dyn InstanceRegistryRepository>,
        config: TaskReactorConfig,
    ) -> Self {
        Self {
            commands_queue,
            instance_registry,
            job_control: Arc::new(NoopJobControl),
            config,
        }
    }

    /// Provider backed by in-process stores
    pub fn in_memory(config: TaskReactorConfig) -> Self {
        Self::new(
            Arc::new(InMemoryCommandsQueue::with_claim_timeout(
                config.dispatcher.claim_timeout(),
            )),
            Arc::new(InMemoryInstanceRegistry::new()),
            config,
        )
    }

    /// Provider backed by the PostgreSQL stores sharing one pool
    #[cfg(feature = "postgres")]
    pub fn postgres(pool: sqlx::PgPool, config: TaskReactorConfig) -> Self {
        Self::new(
            Arc::new(
                crate::commands::PgCommandsQueue::new(pool.clone())
                    .with_claim_timeout(config.dispatcher.claim_timeout()),
            ),
            Arc::new(crate::registry::PgInstanceRegistry::new(pool)),
            config,
        )
    }

    /// Replace the job control used by the pause and cancel executors
    pub fn with_job_control(mut self, job_control: Arc<dyn WorkerJobControl>) -> Self {
        self.job_control = job_control;
        self
    }

    pub fn commands_queue(&self, instance: &Identifier) -> InstanceCommandsQueue {
        InstanceCommandsQueue::new(instance.clone(), self.commands_queue.clone())
    }

    pub fn commands_queue_repository(&self) -> Arc<dyn CommandsQueueRepository> {
        self.commands_queue.clone()
    }

    pub fn instance_registry(&self) -> Arc<dyn InstanceRegistryRepository> {
        self.instance_registry.clone()
    }

    pub fn config(&self) -> &TaskReactorConfig {
        &self.config
    }

    /// Executors for the built-in command types bound to `instance`
    pub fn default_executors(&self, instance: &Identifier) -> CommandExecutorRegistry {
        CommandExecutorRegistry::with_default_executors(
            instance.clone(),
            self.instance_registry.clone(),
            self.job_control.clone(),
        )
    }

    pub fn dispatcher(&self, instance: &Identifier) -> Dispatcher {
        self.dispatcher_with_executors(instance, self.default_executors(instance))
    }

    pub fn dispatcher_with_executors(
        &self,
        instance: &Identifier,
        executors: CommandExecutorRegistry,
    ) -> Dispatcher {
        Dispatcher::new(
            instance.clone(),
            self.commands_queue.clone(),
            self.instance_registry.clone(),
            executors,
            self.config.dispatcher.clone(),
            self.config.retry.clone(),
        )
    }
}
