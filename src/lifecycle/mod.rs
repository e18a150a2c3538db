//! # Lifecycle
//!
//! Services translating "pause/resume this instance" and "pause/resume
//! everything" into enqueued commands, plus the connector-level resume flow.

pub mod action_executor;
pub mod connector;
pub mod pause;
pub mod resume;

pub use action_executor::{FanOutReport, InstanceSelector, TaskReactorInstanceActionExecutor};
pub use connector::{
    ConnectorResponse, ResumeConnectorCallback, ResumeConnectorHandler,
    ResumeConnectorStateValidator,
};
pub use pause::PauseTaskReactorService;
pub use resume::ResumeTaskReactorService;
