//! Concrete executors for the built-in command types

pub mod cancel_ongoing_executions;
pub mod pause_instance;
pub mod resume_instance;

pub use cancel_ongoing_executions::CancelOngoingExecutionsExecutor;
pub use pause_instance::PauseInstanceExecutor;
pub use resume_instance::ResumeInstanceExecutor;
