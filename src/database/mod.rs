//! # Database
//!
//! PostgreSQL connection management and schema migrations for the durable
//! stores.

pub mod connection;
pub mod migrations;

pub use connection::DatabaseConnection;
pub use migrations::DatabaseMigrations;
