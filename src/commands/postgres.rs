//! PostgreSQL-backed commands queue
//!
//! A claim first locks the instance row of `commands_queues` with
//! `FOR UPDATE SKIP LOCKED`, so claims of one instance are serialized across
//! processes. Under that lock a command is only claimed when the instance
//! has no live claim, which keeps at most one command in flight.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::commands::{Command, CommandStatus, CommandType, CommandsQueueRepository, QueuedCommand};
use crate::config::DispatcherConfig;
use crate::error::{Result, TaskReactorError};
use crate::identifier::Identifier;

const UNFINISHED_STATUSES: [&str; 3] = ["pending", "claimed", "retrying"];

#[derive(Debug, Clone)]
pub struct PgCommandsQueue {
    pool: PgPool,
    claim_timeout: Duration,
}

impl PgCommandsQueue {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            claim_timeout: DispatcherConfig::default().claim_timeout(),
        }
    }

    pub fn with_claim_timeout(mut self, claim_timeout: Duration) -> Self {
        self.claim_timeout = claim_timeout;
        self
    }

    async fn ensure_queue_exists(&self, instance: &Identifier) -> Result<()> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM task_reactor.commands_queues WHERE instance_name = $1)",
        )
        .bind(instance.canonical())
        .fetch_one(&self.pool)
        .await?;

        if exists {
            Ok(())
        } else {
            Err(TaskReactorError::instance_not_found(instance))
        }
    }

    async fn claim(
        &self,
        instance: &Identifier,
        types: Option<Vec<String>>,
    ) -> Result<Option<QueuedCommand>> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<String> = sqlx::query_scalar(
            r#"
            SELECT instance_name FROM task_reactor.commands_queues
            WHERE instance_name = $1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(instance.canonical())
        .fetch_optional(&mut *tx)
        .await?;

        if locked.is_none() {
            tx.rollback().await?;
            // unknown instance, or another poller is claiming right now
            self.ensure_queue_exists(instance).await?;
            return Ok(None);
        }

        let row = sqlx::query(
            r#"
            UPDATE task_reactor.commands_queue
            SET status = 'claimed', attempts = attempts + 1, updated_at = NOW()
            WHERE id = (
                SELECT id FROM task_reactor.commands_queue
                WHERE instance_name = $1
                  AND (
                    status IN ('pending', 'retrying')
                    OR (status = 'claimed' AND updated_at <= NOW() - make_interval(secs => $3))
                  )
                  AND ($2::TEXT[] IS NULL OR command_type = ANY($2))
                  AND NOT EXISTS (
                    SELECT 1 FROM task_reactor.commands_queue in_flight
                    WHERE in_flight.instance_name = $1
                      AND in_flight.status = 'claimed'
                      AND in_flight.updated_at > NOW() - make_interval(secs => $3)
                  )
                ORDER BY sequence
                LIMIT 1
            )
            RETURNING id, command_type, payload, enqueued_at, sequence, status, attempts,
                      last_error, updated_at
            "#,
        )
        .bind(instance.canonical())
        .bind(&types)
        .bind(self.claim_timeout.as_secs_f64())
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;

        row.as_ref().map(queued_command_from_row).transpose()
    }

    async fn update_status(
        &self,
        instance: &Identifier,
        command_id: Uuid,
        status: CommandStatus,
        reason: &str,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE task_reactor.commands_queue
            SET status = $3, last_error = $4, updated_at = NOW()
            WHERE instance_name = $1 AND id = $2
            "#,
        )
        .bind(instance.canonical())
        .bind(command_id)
        .bind(status.to_string())
        .bind(reason)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(TaskReactorError::CommandNotFound {
                instance: instance.clone(),
                command_id,
            });
        }
        Ok(())
    }
}

fn queued_command_from_row(row: &PgRow) -> Result<QueuedCommand> {
    let command_type: String = row.try_get("command_type")?;
    let status: String = row.try_get("status")?;
    let attempts: i32 = row.try_get("attempts")?;

    Ok(QueuedCommand {
        command: Command {
            id: row.try_get("id")?,
            command_type: CommandType::from(command_type.as_str()),
            payload: row.try_get("payload")?,
            enqueued_at: row.try_get::<DateTime<Utc>, _>("enqueued_at")?,
        },
        sequence: row.try_get("sequence")?,
        status: status.parse().map_err(TaskReactorError::Database)?,
        attempts: u32::try_from(attempts).unwrap_or_default(),
        last_error: row.try_get("last_error")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl CommandsQueueRepository for PgCommandsQueue {
    async fn enqueue(
        &self,
        instance: &Identifier,
        command_type: CommandType,
        payload: Option<serde_json::Value>,
    ) -> Result<Command> {
        let command = Command::new(command_type, payload);

        let sequence: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO task_reactor.commands_queue
                (id, instance_name, command_type, payload, status, attempts, enqueued_at, updated_at)
            SELECT $1, q.instance_name, $3, $4, 'pending', 0, $5, $5
            FROM task_reactor.commands_queues q
            WHERE q.instance_name = $2
            RETURNING sequence
            "#,
        )
        .bind(command.id)
        .bind(instance.canonical())
        .bind(command.command_type.as_str())
        .bind(&command.payload)
        .bind(command.enqueued_at)
        .fetch_optional(&self.pool)
        .await?;

        let Some(sequence) = sequence else {
            return Err(TaskReactorError::instance_not_found(instance));
        };

        debug!(
            instance = %instance,
            command_id = %command.id,
            command_type = %command.command_type,
            sequence = sequence,
            "Command enqueued"
        );
        Ok(command)
    }

    async fn fetch_next(&self, instance: &Identifier) -> Result<Option<QueuedCommand>> {
        self.claim(instance, None).await
    }

    async fn fetch_next_of_types(
        &self,
        instance: &Identifier,
        types: &[CommandType],
    ) -> Result<Option<QueuedCommand>> {
        let names = types.iter().map(|t| t.as_str().to_string()).collect();
        self.claim(instance, Some(names)).await
    }

    async fn mark_processed(&self, instance: &Identifier, command_id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "DELETE FROM task_reactor.commands_queue WHERE instance_name = $1 AND id = $2",
        )
        .bind(instance.canonical())
        .bind(command_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(TaskReactorError::CommandNotFound {
                instance: instance.clone(),
                command_id,
            });
        }
        Ok(())
    }

    async fn mark_retrying(
        &self,
        instance: &Identifier,
        command_id: Uuid,
        reason: &str,
    ) -> Result<()> {
        self.update_status(instance, command_id, CommandStatus::Retrying, reason)
            .await
    }

    async fn release_claim(&self, instance: &Identifier, command_id: Uuid) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE task_reactor.commands_queue
            SET attempts = GREATEST(attempts - 1, 0),
                status = CASE WHEN attempts <= 1 THEN 'pending' ELSE 'retrying' END,
                updated_at = NOW()
            WHERE instance_name = $1 AND id = $2 AND status = 'claimed'
            "#,
        )
        .bind(instance.canonical())
        .bind(command_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM task_reactor.commands_queue WHERE instance_name = $1 AND id = $2)",
            )
            .bind(instance.canonical())
            .bind(command_id)
            .fetch_one(&self.pool)
            .await?;

            if !exists {
                return Err(TaskReactorError::CommandNotFound {
                    instance: instance.clone(),
                    command_id,
                });
            }
        }
        Ok(())
    }

    async fn mark_failed(&self, instance: &Identifier, command_id: Uuid, reason: &str) -> Result<()> {
        self.update_status(instance, command_id, CommandStatus::Dead, reason)
            .await
    }

    async fn pending_count(&self, instance: &Identifier) -> Result<usize> {
        self.ensure_queue_exists(instance).await?;
        let statuses: Vec<String> = UNFINISHED_STATUSES.iter().map(|s| s.to_string()).collect();

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM task_reactor.commands_queue WHERE instance_name = $1 AND status = ANY($2)",
        )
        .bind(instance.canonical())
        .bind(&statuses)
        .fetch_one(&self.pool)
        .await?;

        Ok(usize::try_from(count).unwrap_or_default())
    }

    async fn dead_letters(&self, instance: &Identifier) -> Result<Vec<QueuedCommand>> {
        self.ensure_queue_exists(instance).await?;

        let rows = sqlx::query(
            r#"
            SELECT id, command_type, payload, enqueued_at, sequence, status, attempts,
                   last_error, updated_at
            FROM task_reactor.commands_queue
            WHERE instance_name = $1 AND status = 'dead'
            ORDER BY sequence
            "#,
        )
        .bind(instance.canonical())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(queued_command_from_row).collect()
    }

    async fn create_queue(&self, instance: &Identifier) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO task_reactor.commands_queues (instance_name)
            VALUES ($1)
            ON CONFLICT (instance_name) DO NOTHING
            "#,
        )
        .bind(instance.canonical())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn drop_queue(&self, instance: &Identifier) -> Result<()> {
        let result = sqlx::query("DELETE FROM task_reactor.commands_queues WHERE instance_name = $1")
            .bind(instance.canonical())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            warn!(instance = %instance, "Attempted to drop non-existent commands queue");
        }
        Ok(())
    }
}
