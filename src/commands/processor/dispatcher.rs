//! # Dispatcher
//!
//! Per-instance control loop that turns queued intent into executed effect.
//!
//! Each tick reads the instance from the registry, claims the next command,
//! resolves its executor and acknowledges the outcome:
//!
//! - not initialized: nothing is dispatched
//! - inactive: only `PAUSE_INSTANCE` / `RESUME_INSTANCE` are consumed, other
//!   commands wait for reactivation
//! - no executor registered: the command is dead-lettered immediately
//! - executor failure: retried until the retry policy is exhausted, then
//!   dead-lettered
//! - store outage, including one hit by an executor: the claim is released
//!   without counting the attempt and the tick is retried after a backoff
//!
//! At most one command per instance is in flight. Executors are never
//! interrupted; shutdown is observed between commands.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::commands::processor::executor::{CommandExecutorRegistry, ExecutorError};
use crate::commands::{CommandType, CommandsQueueRepository, QueuedCommand};
use crate::config::{DispatcherConfig, RetryPolicyConfig};
use crate::error::{Result, TaskReactorError};
use crate::identifier::Identifier;
use crate::logging::{log_command_operation, log_error};
use crate::registry::InstanceRegistryRepository;

/// Result of a single dispatcher tick
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Instance is registered but not initialized, nothing dispatched
    NotInitialized,
    /// Instance is paused and has no pending lifecycle command
    Inactive,
    /// Queue has nothing to process
    Idle,
    /// Executor succeeded and the command was removed from the queue
    Completed {
        command_id: Uuid,
        command_type: CommandType,
    },
    /// Executor failed; the command stays at the head of the queue
    Retrying {
        command_id: Uuid,
        command_type: CommandType,
        attempts: u32,
        error: TaskReactorError,
    },
    /// Command moved to the dead-letter state
    DeadLettered {
        command_id: Uuid,
        command_type: CommandType,
        error: TaskReactorError,
    },
}

impl DispatchOutcome {
    /// Whether the tick consumed a command attempt
    pub fn processed_command(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. } | Self::Retrying { .. } | Self::DeadLettered { .. }
        )
    }
}

pub struct Dispatcher {
    instance: Identifier,
    queue: Arc<dyn CommandsQueueRepository>,
    instance_registry: Arc<dyn InstanceRegistryRepository>,
    executors: CommandExecutorRegistry,
    config: DispatcherConfig,
    retry_policy: RetryPolicyConfig,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("instance", &self.instance)
            .field("executors", &self.executors)
            .field("config", &self.config)
            .field("retry_policy", &self.retry_policy)
            .finish()
    }
}

impl Dispatcher {
    pub fn new(
        instance: Identifier,
        queue: Arc<dyn CommandsQueueRepository>,
        instance_registry: Arc<dyn InstanceRegistryRepository>,
        executors: CommandExecutorRegistry,
        config: DispatcherConfig,
        retry_policy: RetryPolicyConfig,
    ) -> Self {
        Self {
            instance,
            queue,
            instance_registry,
            executors,
            config,
            retry_policy,
        }
    }

    pub fn instance(&self) -> &Identifier {
        &self.instance
    }

    /// Process at most one command
    pub async fn tick(&self) -> Result<DispatchOutcome> {
        let instance = self.instance_registry.fetch(&self.instance).await?;

        if !instance.is_initialized {
            debug!(instance = %self.instance, "Instance not initialized, skipping dispatch");
            return Ok(DispatchOutcome::NotInitialized);
        }

        let next = if instance.is_active {
            self.queue.fetch_next(&self.instance).await?
        } else {
            self.queue
                .fetch_next_of_types(&self.instance, &CommandType::lifecycle_types())
                .await?
        };

        match next {
            Some(queued) => self.dispatch(queued).await,
            None if instance.is_active => Ok(DispatchOutcome::Idle),
            None => Ok(DispatchOutcome::Inactive),
        }
    }

    /// Tick until the queue has nothing deliverable or the per-tick bound is hit
    pub async fn drain(&self) -> Result<Vec<DispatchOutcome>> {
        let mut outcomes = Vec::new();

        for _ in 0..self.config.max_commands_per_tick {
            let outcome = self.tick().await?;
            let processed = outcome.processed_command();
            let retrying = matches!(outcome, DispatchOutcome::Retrying { .. });
            outcomes.push(outcome);

            // a retrying command waits for the backoff before the next attempt
            if !processed || retrying {
                break;
            }
        }

        Ok(outcomes)
    }

    async fn dispatch(&self, queued: QueuedCommand) -> Result<DispatchOutcome> {
        let command = &queued.command;
        let command_id = command.id;
        let command_type = command.command_type.clone();

        let Some(executor) = self.executors.resolve(&command_type) else {
            let error = TaskReactorError::UnknownCommandType {
                command_type: command_type.clone(),
            };
            error!(
                instance = %self.instance,
                command_id = %command_id,
                command_type = %command_type,
                "No executor registered, dead-lettering command"
            );
            self.queue
                .mark_failed(&self.instance, command_id, &error.to_string())
                .await?;
            return Ok(DispatchOutcome::DeadLettered {
                command_id,
                command_type,
                error,
            });
        };

        debug!(
            instance = %self.instance,
            command_id = %command_id,
            command_type = %command_type,
            executor = executor.name(),
            attempt = queued.attempts,
            "Executing command"
        );

        match executor.execute(command).await {
            Ok(()) => {
                self.queue.mark_processed(&self.instance, command_id).await?;
                log_command_operation(
                    "execute",
                    &self.instance,
                    command_id,
                    &command_type,
                    "completed",
                    None,
                );
                Ok(DispatchOutcome::Completed {
                    command_id,
                    command_type,
                })
            }
            Err(ExecutorError::TaskReactor(err)) if err.is_transient() => {
                warn!(
                    instance = %self.instance,
                    command_id = %command_id,
                    command_type = %command_type,
                    error = %err,
                    "Store unavailable during execution, releasing command"
                );
                if let Err(release_err) = self.queue.release_claim(&self.instance, command_id).await {
                    // redelivered once the claim times out
                    warn!(
                        instance = %self.instance,
                        command_id = %command_id,
                        error = %release_err,
                        "Failed to release claim"
                    );
                }
                Err(err)
            }
            Err(e) => {
                let error = TaskReactorError::ExecutorFailure {
                    command_type: command_type.clone(),
                    command_id,
                    message: e.to_string(),
                };
                let reason = error.to_string();

                if self.retry_policy.allows_retry(queued.attempts) {
                    warn!(
                        instance = %self.instance,
                        command_id = %command_id,
                        command_type = %command_type,
                        attempt = queued.attempts,
                        max_attempts = self.retry_policy.max_attempts,
                        error = %e,
                        "Command execution failed, will retry"
                    );
                    self.queue
                        .mark_retrying(&self.instance, command_id, &reason)
                        .await?;
                    Ok(DispatchOutcome::Retrying {
                        command_id,
                        command_type,
                        attempts: queued.attempts,
                        error,
                    })
                } else {
                    log_error(
                        "dispatcher",
                        "execute",
                        &reason,
                        Some(self.instance.to_sql_string()),
                    );
                    self.queue
                        .mark_failed(&self.instance, command_id, &reason)
                        .await?;
                    log_command_operation(
                        "execute",
                        &self.instance,
                        command_id,
                        &command_type,
                        "dead",
                        Some(&reason),
                    );
                    Ok(DispatchOutcome::DeadLettered {
                        command_id,
                        command_type,
                        error,
                    })
                }
            }
        }
    }

    /// Poll the queue until the shutdown signal fires.
    ///
    /// Errors never end the loop: store outages back off and are retried,
    /// every other error is logged and the next tick proceeds.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            instance = %self.instance,
            poll_interval_ms = self.config.poll_interval_ms,
            "Dispatcher started"
        );

        loop {
            let delay = match self.drain().await {
                Ok(outcomes) => match outcomes.last() {
                    Some(DispatchOutcome::Retrying { .. }) => self.retry_policy.backoff(),
                    Some(outcome) if outcome.processed_command() => std::time::Duration::ZERO,
                    _ => self.config.poll_interval(),
                },
                Err(e) if e.is_transient() => {
                    warn!(instance = %self.instance, error = %e, "Store unavailable, backing off");
                    self.config.store_backoff()
                }
                Err(TaskReactorError::InstanceNotFound { .. }) => {
                    debug!(instance = %self.instance, "Instance not registered, waiting for provisioning");
                    self.config.poll_interval()
                }
                Err(e) => {
                    log_error(
                        "dispatcher",
                        "tick",
                        &e.to_string(),
                        Some(self.instance.to_sql_string()),
                    );
                    self.config.poll_interval()
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown_rx.recv() => {
                    info!(instance = %self.instance, "Dispatcher shutting down");
                    break;
                }
            }
        }
    }
}
