//! # Task Reactor Error Types
//!
//! Structured error handling for the queue, registry and dispatch layers.

use crate::commands::CommandType;
use crate::identifier::Identifier;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TaskReactorError {
    #[error("Task reactor instance not found: {instance}")]
    InstanceNotFound { instance: Identifier },

    #[error("No executor registered for command type: {command_type}")]
    UnknownCommandType { command_type: CommandType },

    #[error("Executor failed for command {command_id} ({command_type}): {message}")]
    ExecutorFailure {
        command_type: CommandType,
        command_id: Uuid,
        message: String,
    },

    #[error("Store unavailable: {store}: {message}")]
    StoreUnavailable { store: String, message: String },

    #[error("Command not found in queue of {instance}: {command_id}")]
    CommandNotFound { instance: Identifier, command_id: Uuid },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl TaskReactorError {
    pub fn instance_not_found(instance: &Identifier) -> Self {
        Self::InstanceNotFound {
            instance: instance.clone(),
        }
    }

    pub fn store_unavailable(store: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            store: store.into(),
            message: message.into(),
        }
    }

    /// Transient errors leave the command untouched and are retried on the next tick
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }
}

impl From<serde_json::Error> for TaskReactorError {
    fn from(error: serde_json::Error) -> Self {
        TaskReactorError::Serialization(format!("JSON serialization error: {error}"))
    }
}

impl From<sqlx::Error> for TaskReactorError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => {
                TaskReactorError::store_unavailable("postgres", err.to_string())
            }
            other => TaskReactorError::Database(other.to_string()),
        }
    }
}

impl From<config::ConfigError> for TaskReactorError {
    fn from(err: config::ConfigError) -> Self {
        TaskReactorError::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TaskReactorError>;
