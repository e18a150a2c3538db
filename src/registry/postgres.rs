use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::debug;

use crate::error::{Result, TaskReactorError};
use crate::identifier::Identifier;
use crate::registry::{InstanceRegistryRepository, TaskReactorInstance};

/// Instance registry stored in `task_reactor.instance_registry`
#[derive(Debug, Clone)]
pub struct PgInstanceRegistry {
    pool: PgPool,
}

impl PgInstanceRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn set_active_flag(&self, instance_name: &Identifier, active: bool) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE task_reactor.instance_registry
            SET is_active = $2, updated_at = NOW()
            WHERE instance_name = $1
            "#,
        )
        .bind(instance_name.canonical())
        .bind(active)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(TaskReactorError::instance_not_found(instance_name));
        }

        debug!(instance = %instance_name, is_active = active, "Instance active flag written");
        Ok(())
    }
}

fn instance_from_row(row: &PgRow) -> Result<TaskReactorInstance> {
    let sql_name: String = row.try_get("instance_sql_name")?;
    Ok(TaskReactorInstance {
        instance_name: Identifier::from_with_auto_quoting(sql_name),
        is_initialized: row.try_get("is_initialized")?,
        is_active: row.try_get("is_active")?,
    })
}

#[async_trait]
impl InstanceRegistryRepository for PgInstanceRegistry {
    async fn fetch_all(&self) -> Result<Vec<TaskReactorInstance>> {
        let rows = sqlx::query(
            "SELECT instance_sql_name, is_initialized, is_active FROM task_reactor.instance_registry",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(instance_from_row).collect()
    }

    async fn fetch(&self, instance_name: &Identifier) -> Result<TaskReactorInstance> {
        let row = sqlx::query(
            r#"
            SELECT instance_sql_name, is_initialized, is_active
            FROM task_reactor.instance_registry
            WHERE instance_name = $1
            "#,
        )
        .bind(instance_name.canonical())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => instance_from_row(&row),
            None => Err(TaskReactorError::instance_not_found(instance_name)),
        }
    }

    async fn set_active(&self, instance_name: &Identifier) -> Result<()> {
        self.set_active_flag(instance_name, true).await
    }

    async fn set_inactive(&self, instance_name: &Identifier) -> Result<()> {
        self.set_active_flag(instance_name, false).await
    }

    async fn insert(&self, instance: TaskReactorInstance) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO task_reactor.instance_registry
                (instance_name, instance_sql_name, is_initialized, is_active)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (instance_name) DO UPDATE
            SET instance_sql_name = EXCLUDED.instance_sql_name,
                is_initialized = EXCLUDED.is_initialized,
                is_active = EXCLUDED.is_active,
                updated_at = NOW()
            "#,
        )
        .bind(instance.instance_name.canonical())
        .bind(instance.instance_name.to_sql_string())
        .bind(instance.is_initialized)
        .bind(instance.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, instance_name: &Identifier) -> Result<bool> {
        let result = sqlx::query("DELETE FROM task_reactor.instance_registry WHERE instance_name = $1")
            .bind(instance_name.canonical())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
