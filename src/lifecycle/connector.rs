//! # Connector Resume Flow
//!
//! Application-level resume: validate the connector state, run the
//! connector's own resume callback and only then ask every task reactor
//! instance to resume.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::lifecycle::resume::ResumeTaskReactorService;
use crate::logging::log_error;

pub const OK_CODE: &str = "OK";
pub const ROLLBACK_CODE: &str = "ROLLBACK";
pub const TASK_REACTOR_RESUME_FAILED_CODE: &str = "TASK_REACTOR_RESUME_FAILED";

/// Outcome reported back to whoever triggered a lifecycle operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorResponse {
    pub response_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ConnectorResponse {
    pub fn ok() -> Self {
        Self {
            response_code: OK_CODE.to_string(),
            message: None,
        }
    }

    pub fn rollback(message: impl Into<String>) -> Self {
        Self::error(ROLLBACK_CODE, message)
    }

    pub fn error(response_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            response_code: response_code.into(),
            message: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.response_code == OK_CODE
    }
}

#[async_trait]
pub trait ResumeConnectorStateValidator: Send + Sync {
    /// `OK` when the connector may be resumed
    async fn validate(&self) -> ConnectorResponse;
}

#[async_trait]
pub trait ResumeConnectorCallback: Send + Sync {
    /// `OK` on success, `ROLLBACK` when the callback undid its own changes
    async fn execute(&self) -> ConnectorResponse;
}

/// Accepts every resume request
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultResumeConnectorStateValidator;

#[async_trait]
impl ResumeConnectorStateValidator for DefaultResumeConnectorStateValidator {
    async fn validate(&self) -> ConnectorResponse {
        ConnectorResponse::ok()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopResumeConnectorCallback;

#[async_trait]
impl ResumeConnectorCallback for NoopResumeConnectorCallback {
    async fn execute(&self) -> ConnectorResponse {
        ConnectorResponse::ok()
    }
}

pub struct ResumeConnectorHandler {
    validator: Box<dyn ResumeConnectorStateValidator>,
    callback: Box<dyn ResumeConnectorCallback>,
    task_reactor: ResumeTaskReactorService,
}

impl std::fmt::Debug for ResumeConnectorHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResumeConnectorHandler")
            .field("task_reactor", &self.task_reactor)
            .finish()
    }
}

impl ResumeConnectorHandler {
    pub fn new(
        validator: Box<dyn ResumeConnectorStateValidator>,
        callback: Box<dyn ResumeConnectorCallback>,
        task_reactor: ResumeTaskReactorService,
    ) -> Self {
        Self {
            validator,
            callback,
            task_reactor,
        }
    }

    pub fn with_defaults(task_reactor: ResumeTaskReactorService) -> Self {
        Self::new(
            Box::new(DefaultResumeConnectorStateValidator),
            Box::new(NoopResumeConnectorCallback),
            task_reactor,
        )
    }

    /// Any non-`OK` response from the validator or the callback is returned
    /// as-is and the task reactor is left untouched.
    pub async fn resume_connector(&self) -> ConnectorResponse {
        let validation = self.validator.validate().await;
        if !validation.is_ok() {
            warn!(response_code = %validation.response_code, "Resume rejected by state validator");
            return validation;
        }

        let callback = self.callback.execute().await;
        if !callback.is_ok() {
            warn!(response_code = %callback.response_code, "Resume callback did not succeed");
            return callback;
        }

        match self.task_reactor.resume_all_instances().await {
            Ok(report) if report.is_success() => {
                info!(instances = report.succeeded.len(), "Connector resumed");
                ConnectorResponse::ok()
            }
            Ok(report) => {
                let failed: Vec<String> = report
                    .failed
                    .iter()
                    .map(|(instance, e)| format!("{instance}: {e}"))
                    .collect();
                let message = format!("Failed to resume instances: {}", failed.join("; "));
                log_error("resume_connector_handler", "resume_all_instances", &message, None);
                ConnectorResponse::error(TASK_REACTOR_RESUME_FAILED_CODE, message)
            }
            Err(e) => {
                log_error("resume_connector_handler", "resume_all_instances", &e.to_string(), None);
                ConnectorResponse::error(TASK_REACTOR_RESUME_FAILED_CODE, e.to_string())
            }
        }
    }
}
