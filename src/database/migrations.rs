//! # Database Migrations
//!
//! Installs the `task_reactor` schema. Migrations are embedded in the
//! binary, applied in version order and recorded in
//! `task_reactor_schema_migrations`.
//!
//! A session-level PostgreSQL advisory lock serializes concurrent runs, so
//! several processes (or parallel tests) can call [`DatabaseMigrations::run_all`]
//! against the same database:
//!
//! ```sql
//! SELECT pg_advisory_lock(7318029472610385)
//! ```

use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres};
use std::collections::HashSet;
use tracing::info;

use crate::error::Result;

const LOCK_KEY: i64 = 7_318_029_472_610_385;

/// A single embedded schema migration
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    /// Version timestamp (YYYYMMDDHHMMSS format)
    pub version: &'static str,
    pub name: &'static str,
    pub sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: "20250101000000",
    name: "create task reactor schema",
    sql: include_str!("../../migrations/20250101000000_create_task_reactor_schema.sql"),
}];

pub struct DatabaseMigrations;

impl DatabaseMigrations {
    pub fn migrations() -> &'static [Migration] {
        MIGRATIONS
    }

    /// Apply every outstanding migration
    pub async fn run_all(pool: &PgPool) -> Result<usize> {
        // advisory locks belong to the session, so lock and unlock on one connection
        let mut conn = pool.acquire().await?;

        sqlx::query("SELECT pg_advisory_lock($1)")
            .bind(LOCK_KEY)
            .execute(&mut *conn)
            .await?;

        let result = Self::run_outstanding(&mut conn).await;

        sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(LOCK_KEY)
            .execute(&mut *conn)
            .await?;

        result
    }

    async fn run_outstanding(conn: &mut PoolConnection<Postgres>) -> Result<usize> {
        sqlx::raw_sql(
            r#"
            CREATE TABLE IF NOT EXISTS task_reactor_schema_migrations (
                version VARCHAR(14) PRIMARY KEY,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&mut **conn)
        .await?;

        let applied: HashSet<String> =
            sqlx::query_scalar::<_, String>("SELECT version FROM task_reactor_schema_migrations")
                .fetch_all(&mut **conn)
                .await?
                .into_iter()
                .collect();

        let mut count = 0;
        for migration in MIGRATIONS.iter().filter(|m| !applied.contains(m.version)) {
            info!(version = migration.version, name = migration.name, "Applying migration");

            sqlx::raw_sql(migration.sql).execute(&mut **conn).await?;
            sqlx::query("INSERT INTO task_reactor_schema_migrations (version) VALUES ($1)")
                .bind(migration.version)
                .execute(&mut **conn)
                .await?;
            count += 1;
        }

        Ok(count)
    }
}
