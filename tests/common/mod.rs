//! Shared fixtures for the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use task_reactor::commands::processor::WorkerJobControl;
use task_reactor::commands::{
    Command, CommandType, CommandsQueueRepository, InMemoryCommandsQueue, QueuedCommand,
};
use task_reactor::config::TaskReactorConfig;
use task_reactor::registry::InMemoryInstanceRegistry;
use task_reactor::{Identifier, Result, TaskReactorError, TaskReactorInstanceComponentProvider};

pub fn in_memory_provider() -> TaskReactorInstanceComponentProvider {
    TaskReactorInstanceComponentProvider::in_memory(TaskReactorConfig::default())
}

/// In-memory queue that can be switched into an outage, globally or for
/// selected instances
#[derive(Default)]
pub struct FlakyCommandsQueue {
    inner: InMemoryCommandsQueue,
    down: AtomicBool,
    down_for: Mutex<HashSet<Identifier>>,
}

impl FlakyCommandsQueue {
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn set_down_for(&self, instance: &Identifier) {
        self.down_for.lock().insert(instance.clone());
    }

    fn check(&self, instance: &Identifier) -> Result<()> {
        if self.down.load(Ordering::SeqCst) || self.down_for.lock().contains(instance) {
            return Err(TaskReactorError::store_unavailable(
                "commands_queue",
                "connection refused",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl CommandsQueueRepository for FlakyCommandsQueue {
    async fn enqueue(
        &self,
        instance: &Identifier,
        command_type: CommandType,
        payload: Option<serde_json::Value>,
    ) -> Result<Command> {
        self.check(instance)?;
        self.inner.enqueue(instance, command_type, payload).await
    }

    async fn fetch_next(&self, instance: &Identifier) -> Result<Option<QueuedCommand>> {
        self.check(instance)?;
        self.inner.fetch_next(instance).await
    }

    async fn fetch_next_of_types(
        &self,
        instance: &Identifier,
        types: &[CommandType],
    ) -> Result<Option<QueuedCommand>> {
        self.check(instance)?;
        self.inner.fetch_next_of_types(instance, types).await
    }

    async fn mark_processed(&self, instance: &Identifier, command_id: Uuid) -> Result<()> {
        self.check(instance)?;
        self.inner.mark_processed(instance, command_id).await
    }

    async fn mark_retrying(
        &self,
        instance: &Identifier,
        command_id: Uuid,
        reason: &str,
    ) -> Result<()> {
        self.check(instance)?;
        self.inner.mark_retrying(instance, command_id, reason).await
    }

    async fn release_claim(&self, instance: &Identifier, command_id: Uuid) -> Result<()> {
        self.check(instance)?;
        self.inner.release_claim(instance, command_id).await
    }

    async fn mark_failed(&self, instance: &Identifier, command_id: Uuid, reason: &str) -> Result<()> {
        self.check(instance)?;
        self.inner.mark_failed(instance, command_id, reason).await
    }

    async fn pending_count(&self, instance: &Identifier) -> Result<usize> {
        self.check(instance)?;
        self.inner.pending_count(instance).await
    }

    async fn dead_letters(&self, instance: &Identifier) -> Result<Vec<QueuedCommand>> {
        self.check(instance)?;
        self.inner.dead_letters(instance).await
    }

    async fn create_queue(&self, instance: &Identifier) -> Result<()> {
        self.inner.create_queue(instance).await
    }

    async fn drop_queue(&self, instance: &Identifier) -> Result<()> {
        self.inner.drop_queue(instance).await
    }
}

pub fn flaky_provider() -> (TaskReactorInstanceComponentProvider, Arc<FlakyCommandsQueue>) {
    let queue = Arc::new(FlakyCommandsQueue::default());
    let provider = TaskReactorInstanceComponentProvider::new(
        queue.clone(),
        Arc::new(InMemoryInstanceRegistry::new()),
        TaskReactorConfig::default(),
    );
    (provider, queue)
}

/// Job control that records every cancellation request
#[derive(Default)]
pub struct RecordingJobControl {
    pub cancelled: Mutex<Vec<Identifier>>,
}

#[async_trait]
impl WorkerJobControl for RecordingJobControl {
    async fn cancel_ongoing_executions(&self, instance: &Identifier) -> anyhow::Result<()> {
        self.cancelled.lock().push(instance.clone());
        Ok(())
    }
}
