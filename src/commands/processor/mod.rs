//! # Command Processor
//!
//! Executor registry, the built-in executors and the per-instance
//! dispatcher that drives them.

pub mod dispatcher;
pub mod executor;
pub mod executors;
pub mod job_control;

pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use executor::{
    CommandExecutor, CommandExecutorRegistry, CommandExecutorRegistryBuilder, ExecutorError,
};
pub use job_control::{NoopJobControl, WorkerJobControl};
