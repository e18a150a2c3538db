//! # Structured Logging Module
//!
//! Environment-aware structured logging for dispatcher loops and lifecycle
//! fan-out. Human-readable output in development and test, JSON lines in
//! production.

use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use uuid::Uuid;

use crate::commands::CommandType;
use crate::identifier::Identifier;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));

        let layer = if environment == "production" {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        // An embedding application may already own the global subscriber
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            "Structured logging initialized"
        );
    });
}

fn get_environment() -> String {
    std::env::var("TASK_REACTOR_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

fn get_log_level(environment: &str) -> String {
    match environment {
        "test" => "debug".to_string(),
        "development" => "debug".to_string(),
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for command processing
pub fn log_command_operation(
    operation: &str,
    instance: &Identifier,
    command_id: Uuid,
    command_type: &CommandType,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        instance = %instance,
        command_id = %command_id,
        command_type = %command_type,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "COMMAND_OPERATION"
    );
}

/// Log structured data for instance lifecycle operations
pub fn log_instance_operation(
    operation: &str,
    instance: Option<&Identifier>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        instance = instance.map(Identifier::to_sql_string),
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "INSTANCE_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "ERROR"
    );
}
