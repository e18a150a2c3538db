#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Task Reactor
//!
//! Per-instance command queues, dispatchers and lifecycle fan-out for a
//! fleet of connector task reactor instances.
//!
//! ## Overview
//!
//! Each task reactor instance is an isolated execution domain. Control
//! operations are never invoked on an instance directly: callers enqueue a
//! typed [`commands::Command`] into the instance's queue and the instance's
//! [`commands::processor::Dispatcher`] later executes it through the
//! executor registered for its type. Pausing, resuming or cancelling work
//! can therefore be requested from anywhere without touching the instance's
//! internal state.
//!
//! ## Module Organization
//!
//! - [`identifier`] - validated, case-handling instance names
//! - [`commands`] - command model, queue stores, executors and the dispatcher
//! - [`registry`] - instance registry and its initialized/active flags
//! - [`lifecycle`] - pause/resume services, fan-out and the connector resume flow
//! - [`component_provider`] - dependency root wiring the stores together
//! - [`supervisor`] - one dispatcher loop per initialized instance
//! - [`database`] - PostgreSQL connection and schema migrations
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust
//! use task_reactor::component_provider::TaskReactorInstanceComponentProvider;
//! use task_reactor::config::TaskReactorConfig;
//! use task_reactor::lifecycle::PauseTaskReactorService;
//! use task_reactor::test_utils::provision_instance;
//!
//! # async fn example() -> task_reactor::Result<()> {
//! let provider = TaskReactorInstanceComponentProvider::in_memory(TaskReactorConfig::default());
//! let instance = provision_instance(&provider, "ziemniaczek", true, true).await?;
//!
//! PauseTaskReactorService::new(provider.clone())
//!     .pause_instance(&instance)
//!     .await?;
//! provider.dispatcher(&instance).tick().await?;
//!
//! assert!(!provider.instance_registry().fetch(&instance).await?.is_active);
//! # Ok(())
//! # }
//! ```

pub mod commands;
pub mod component_provider;
pub mod config;
#[cfg(feature = "postgres")]
pub mod database;
pub mod error;
pub mod identifier;
pub mod lifecycle;
pub mod logging;
pub mod registry;
pub mod supervisor;
pub mod test_utils;

pub use commands::{Command, CommandType, CommandsQueueRepository, InstanceCommandsQueue};
pub use component_provider::TaskReactorInstanceComponentProvider;
pub use config::TaskReactorConfig;
pub use error::{Result, TaskReactorError};
pub use identifier::Identifier;
pub use registry::{InstanceRegistryRepository, TaskReactorInstance};
pub use supervisor::DispatcherSupervisor;
