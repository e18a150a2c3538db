//! # Commands
//!
//! Command model, the per-instance commands queue and the processor that
//! drains it.
//!
//! - [`command`] - `Command`, `CommandType` and queue bookkeeping types
//! - [`queue`] - `CommandsQueueRepository` trait and the per-instance handle
//! - [`memory`] - in-process queue
//! - [`postgres`] - sqlx-backed durable queue
//! - [`processor`] - executor registry, executors and the dispatcher

pub mod command;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod processor;
pub mod queue;

pub use command::{Command, CommandStatus, CommandType, QueuedCommand};
pub use memory::InMemoryCommandsQueue;
#[cfg(feature = "postgres")]
pub use postgres::PgCommandsQueue;
pub use queue::{CommandsQueueRepository, InstanceCommandsQueue};
