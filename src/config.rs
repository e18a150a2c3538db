//! # Configuration
//!
//! Defaults, environment overrides and optional file-based configuration
//! layered with the `config` crate.

use crate::error::{Result, TaskReactorError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TaskReactorConfig {
    pub database: DatabaseConfig,
    pub dispatcher: DispatcherConfig,
    pub retry: RetryPolicyConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/task_reactor_development".to_string(),
            max_connections: 10,
            acquire_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Delay between polls of an idle queue
    pub poll_interval_ms: u64,

    /// Upper bound of commands drained back to back before yielding to the next tick
    pub max_commands_per_tick: usize,

    /// Delay after a store outage before the queue is polled again
    pub store_backoff_ms: u64,

    /// How long a claimed command stays in flight before another poller may
    /// take it over
    pub claim_timeout_seconds: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            max_commands_per_tick: 100,
            store_backoff_ms: 5000,
            claim_timeout_seconds: 300, // 5 minutes
        }
    }
}

impl DispatcherConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn store_backoff(&self) -> Duration {
        Duration::from_millis(self.store_backoff_ms)
    }

    pub fn claim_timeout(&self) -> Duration {
        Duration::from_secs(self.claim_timeout_seconds)
    }
}

/// Bounded retry applied to executor failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicyConfig {
    /// Total executions allowed before a command is dead-lettered
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 0,
        }
    }
}

impl RetryPolicyConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    /// Whether a command that has been attempted `attempts` times may run again
    pub fn allows_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

impl TaskReactorConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(db_url) = std::env::var("DATABASE_URL") {
            config.database.url = db_url;
        }

        if let Ok(poll_interval) = std::env::var("TASK_REACTOR_POLL_INTERVAL_MS") {
            config.dispatcher.poll_interval_ms = poll_interval.parse().map_err(|e| {
                TaskReactorError::Configuration(format!("Invalid poll_interval_ms: {e}"))
            })?;
        }

        if let Ok(max_attempts) = std::env::var("TASK_REACTOR_RETRY_MAX_ATTEMPTS") {
            config.retry.max_attempts = max_attempts.parse().map_err(|e| {
                TaskReactorError::Configuration(format!("Invalid retry max_attempts: {e}"))
            })?;
        }

        if let Ok(backoff) = std::env::var("TASK_REACTOR_RETRY_BACKOFF_MS") {
            config.retry.backoff_ms = backoff.parse().map_err(|e| {
                TaskReactorError::Configuration(format!("Invalid retry backoff_ms: {e}"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Defaults, then the optional file (format from its extension), then
    /// `TASK_REACTOR__<SECTION>__<KEY>` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config: Self = builder
            .add_source(
                config::Environment::with_prefix("TASK_REACTOR")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(TaskReactorError::Configuration(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.dispatcher.poll_interval_ms == 0 {
            return Err(TaskReactorError::Configuration(
                "dispatcher.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.dispatcher.max_commands_per_tick == 0 {
            return Err(TaskReactorError::Configuration(
                "dispatcher.max_commands_per_tick must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = TaskReactorConfig::default();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.backoff(), Duration::ZERO);
        assert_eq!(config.dispatcher.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.dispatcher.claim_timeout(), Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_retry_policy_bounds() {
        let retry = RetryPolicyConfig::default();
        assert!(retry.allows_retry(1));
        assert!(retry.allows_retry(2));
        assert!(!retry.allows_retry(3));
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = TaskReactorConfig::default();
        config.retry.max_attempts = 0;
        assert!(matches!(
            config.validate(),
            Err(TaskReactorError::Configuration(_))
        ));
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "[dispatcher]\npoll_interval_ms = 250\n\n[retry]\nmax_attempts = 5\nbackoff_ms = 100"
        )
        .unwrap();

        let config = TaskReactorConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.dispatcher.poll_interval_ms, 250);
        assert_eq!(config.dispatcher.max_commands_per_tick, 100);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.backoff(), Duration::from_millis(100));
    }

    #[test]
    fn test_load_rejects_invalid_file_values() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(file, "[retry]\nmax_attempts = 0").unwrap();

        assert!(TaskReactorConfig::load(Some(file.path())).is_err());
    }
}
