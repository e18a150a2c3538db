//! In-process commands queue, used by tests and embedded deployments

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::commands::{Command, CommandStatus, CommandType, CommandsQueueRepository, QueuedCommand};
use crate::config::DispatcherConfig;
use crate::error::{Result, TaskReactorError};
use crate::identifier::Identifier;

#[derive(Debug, Default)]
struct InstanceQueue {
    next_sequence: i64,
    /// Ordered by sequence; completed commands are removed, dead ones are kept
    entries: Vec<QueuedCommand>,
}

impl InstanceQueue {
    fn entry_mut(&mut self, instance: &Identifier, command_id: Uuid) -> Result<&mut QueuedCommand> {
        self.entries
            .iter_mut()
            .find(|entry| entry.id() == command_id)
            .ok_or_else(|| TaskReactorError::CommandNotFound {
                instance: instance.clone(),
                command_id,
            })
    }

    fn claim_first<F>(&mut self, claim_timeout: Duration, predicate: F) -> Option<QueuedCommand>
    where
        F: Fn(&QueuedCommand) -> bool,
    {
        let now = Utc::now();
        let expired = |entry: &QueuedCommand| {
            (now - entry.updated_at)
                .to_std()
                .is_ok_and(|elapsed| elapsed >= claim_timeout)
        };

        // one command in flight per instance
        if self
            .entries
            .iter()
            .any(|entry| entry.status == CommandStatus::Claimed && !expired(entry))
        {
            return None;
        }

        let entry = self.entries.iter_mut().find(|entry| {
            let available = entry.status.is_deliverable()
                || (entry.status == CommandStatus::Claimed && expired(entry));
            available && predicate(entry)
        })?;

        if entry.status == CommandStatus::Claimed {
            warn!(
                command_id = %entry.id(),
                attempts = entry.attempts,
                "Claim timed out, redelivering command"
            );
        }

        entry.status = CommandStatus::Claimed;
        entry.attempts += 1;
        entry.updated_at = now;
        Some(entry.clone())
    }
}

/// Commands queue held in memory behind a single lock, which makes
/// enqueue and claim atomic with respect to each other.
#[derive(Debug)]
pub struct InMemoryCommandsQueue {
    queues: Mutex<HashMap<Identifier, InstanceQueue>>,
    claim_timeout: Duration,
}

impl Default for InMemoryCommandsQueue {
    fn default() -> Self {
        Self::with_claim_timeout(DispatcherConfig::default().claim_timeout())
    }
}

impl InMemoryCommandsQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_claim_timeout(claim_timeout: Duration) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            claim_timeout,
        }
    }

    /// Snapshot of every command still held for the instance, dead letters included
    pub fn snapshot(&self, instance: &Identifier) -> Vec<QueuedCommand> {
        self.queues
            .lock()
            .get(instance)
            .map(|queue| queue.entries.clone())
            .unwrap_or_default()
    }

    fn with_queue<T>(
        &self,
        instance: &Identifier,
        f: impl FnOnce(&mut InstanceQueue) -> Result<T>,
    ) -> Result<T> {
        let mut queues = self.queues.lock();
        let queue = queues
            .get_mut(instance)
            .ok_or_else(|| TaskReactorError::instance_not_found(instance))?;
        f(queue)
    }
}

#[async_trait]
impl CommandsQueueRepository for InMemoryCommandsQueue {
    async fn enqueue(
        &self,
        instance: &Identifier,
        command_type: CommandType,
        payload: Option<serde_json::Value>,
    ) -> Result<Command> {
        self.with_queue(instance, |queue| {
            let command = Command::new(command_type, payload);
            let sequence = queue.next_sequence;
            queue.next_sequence += 1;
            queue
                .entries
                .push(QueuedCommand::pending(command.clone(), sequence));

            debug!(
                instance = %instance,
                command_id = %command.id,
                command_type = %command.command_type,
                sequence = sequence,
                "Command enqueued"
            );
            Ok(command)
        })
    }

    async fn fetch_next(&self, instance: &Identifier) -> Result<Option<QueuedCommand>> {
        let claim_timeout = self.claim_timeout;
        self.with_queue(instance, |queue| Ok(queue.claim_first(claim_timeout, |_| true)))
    }

    async fn fetch_next_of_types(
        &self,
        instance: &Identifier,
        types: &[CommandType],
    ) -> Result<Option<QueuedCommand>> {
        let claim_timeout = self.claim_timeout;
        self.with_queue(instance, |queue| {
            Ok(queue.claim_first(claim_timeout, |entry| {
                types.contains(&entry.command.command_type)
            }))
        })
    }

    async fn mark_processed(&self, instance: &Identifier, command_id: Uuid) -> Result<()> {
        self.with_queue(instance, |queue| {
            let position = queue
                .entries
                .iter()
                .position(|entry| entry.id() == command_id)
                .ok_or_else(|| TaskReactorError::CommandNotFound {
                    instance: instance.clone(),
                    command_id,
                })?;
            queue.entries.remove(position);
            Ok(())
        })
    }

    async fn mark_retrying(
        &self,
        instance: &Identifier,
        command_id: Uuid,
        reason: &str,
    ) -> Result<()> {
        self.with_queue(instance, |queue| {
            let entry = queue.entry_mut(instance, command_id)?;
            entry.status = CommandStatus::Retrying;
            entry.last_error = Some(reason.to_string());
            entry.updated_at = Utc::now();
            Ok(())
        })
    }

    async fn release_claim(&self, instance: &Identifier, command_id: Uuid) -> Result<()> {
        self.with_queue(instance, |queue| {
            let entry = queue.entry_mut(instance, command_id)?;
            if entry.status != CommandStatus::Claimed {
                return Ok(());
            }
            entry.attempts = entry.attempts.saturating_sub(1);
            entry.status = if entry.attempts == 0 {
                CommandStatus::Pending
            } else {
                CommandStatus::Retrying
            };
            entry.updated_at = Utc::now();
            Ok(())
        })
    }

    async fn mark_failed(&self, instance: &Identifier, command_id: Uuid, reason: &str) -> Result<()> {
        self.with_queue(instance, |queue| {
            let entry = queue.entry_mut(instance, command_id)?;
            entry.status = CommandStatus::Dead;
            entry.last_error = Some(reason.to_string());
            entry.updated_at = Utc::now();
            Ok(())
        })
    }

    async fn pending_count(&self, instance: &Identifier) -> Result<usize> {
        self.with_queue(instance, |queue| {
            Ok(queue
                .entries
                .iter()
                .filter(|entry| !entry.status.is_terminal())
                .count())
        })
    }

    async fn dead_letters(&self, instance: &Identifier) -> Result<Vec<QueuedCommand>> {
        self.with_queue(instance, |queue| {
            Ok(queue
                .entries
                .iter()
                .filter(|entry| entry.status == CommandStatus::Dead)
                .cloned()
                .collect())
        })
    }

    async fn create_queue(&self, instance: &Identifier) -> Result<()> {
        self.queues.lock().entry(instance.clone()).or_default();
        Ok(())
    }

    async fn drop_queue(&self, instance: &Identifier) -> Result<()> {
        if self.queues.lock().remove(instance).is_none() {
            warn!(instance = %instance, "Attempted to drop non-existent commands queue");
        }
        Ok(())
    }
}
