//! # Instance Registry
//!
//! Durable record of every task reactor instance and its
//! initialized/active flags.

pub mod instance;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod repository;

pub use instance::TaskReactorInstance;
pub use memory::InMemoryInstanceRegistry;
#[cfg(feature = "postgres")]
pub use postgres::PgInstanceRegistry;
pub use repository::InstanceRegistryRepository;
