//! # Commands Queue Repository
//!
//! Per-instance FIFO store of pending commands. Enqueue is append-only and
//! the claim performed by `fetch_next` is atomic per instance, so producers
//! (lifecycle services, operators) can enqueue concurrently with dispatch.
//!
//! An instance has at most one claimed command at a time. While a claim is
//! live, `fetch_next` returns `None` for that instance; a claim older than
//! the configured claim timeout is treated as abandoned and redelivered.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::commands::{Command, CommandType, QueuedCommand};
use crate::error::Result;
use crate::identifier::Identifier;

#[async_trait]
pub trait CommandsQueueRepository: Send + Sync {
    /// Append a command to the instance queue
    async fn enqueue(
        &self,
        instance: &Identifier,
        command_type: CommandType,
        payload: Option<serde_json::Value>,
    ) -> Result<Command>;

    /// Claim the oldest unclaimed command without removing it
    async fn fetch_next(&self, instance: &Identifier) -> Result<Option<QueuedCommand>>;

    /// Claim the oldest unclaimed command among the given types
    async fn fetch_next_of_types(
        &self,
        instance: &Identifier,
        types: &[CommandType],
    ) -> Result<Option<QueuedCommand>>;

    /// Acknowledge successful processing, removing the command
    async fn mark_processed(&self, instance: &Identifier, command_id: Uuid) -> Result<()>;

    /// Record a failed attempt and keep the command at the head for redelivery
    async fn mark_retrying(&self, instance: &Identifier, command_id: Uuid, reason: &str)
        -> Result<()>;

    /// Hand a claimed command back untouched, without counting the attempt
    async fn release_claim(&self, instance: &Identifier, command_id: Uuid) -> Result<()>;

    /// Move the command to the dead-letter state
    async fn mark_failed(&self, instance: &Identifier, command_id: Uuid, reason: &str) -> Result<()>;

    /// Number of commands not yet processed or dead-lettered, in-flight included
    async fn pending_count(&self, instance: &Identifier) -> Result<usize>;

    async fn dead_letters(&self, instance: &Identifier) -> Result<Vec<QueuedCommand>>;

    /// Provisioning hook, idempotent
    async fn create_queue(&self, instance: &Identifier) -> Result<()>;

    /// Deprovisioning hook, drops every command of the instance
    async fn drop_queue(&self, instance: &Identifier) -> Result<()>;
}

/// Queue handle bound to a single instance
#[derive(Clone)]
pub struct InstanceCommandsQueue {
    instance: Identifier,
    repository: Arc<dyn CommandsQueueRepository>,
}

impl std::fmt::Debug for InstanceCommandsQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceCommandsQueue")
            .field("instance", &self.instance)
            .finish()
    }
}

impl InstanceCommandsQueue {
    pub fn new(instance: Identifier, repository: Arc<dyn CommandsQueueRepository>) -> Self {
        Self {
            instance,
            repository,
        }
    }

    pub fn instance(&self) -> &Identifier {
        &self.instance
    }

    pub async fn add_command(
        &self,
        command_type: CommandType,
        payload: serde_json::Value,
    ) -> Result<Command> {
        debug!(instance = %self.instance, command_type = %command_type, "Adding command");
        self.repository
            .enqueue(&self.instance, command_type, Some(payload))
            .await
    }

    pub async fn add_command_with_empty_payload(&self, command_type: CommandType) -> Result<Command> {
        debug!(instance = %self.instance, command_type = %command_type, "Adding command with empty payload");
        self.repository.enqueue(&self.instance, command_type, None).await
    }

    pub async fn fetch_next(&self) -> Result<Option<QueuedCommand>> {
        self.repository.fetch_next(&self.instance).await
    }

    pub async fn pending_count(&self) -> Result<usize> {
        self.repository.pending_count(&self.instance).await
    }

    pub async fn dead_letters(&self) -> Result<Vec<QueuedCommand>> {
        self.repository.dead_letters(&self.instance).await
    }
}
