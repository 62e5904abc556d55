//! PostgreSQL-backed durable task queue.
//!
//! Claiming uses `FOR UPDATE SKIP LOCKED` so many workers can poll the same
//! table without contention. Every claim takes a lease; a task whose lease
//! expires before completion becomes claimable again, which makes delivery
//! at-least-once. Task-level failures retry with exponential backoff and
//! dead-letter when the attempt budget runs out.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::types::Json;
use tracing::info;
use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::traits::queue::{ClaimedTask, Task, TaskQueue};

/// PostgreSQL task queue.
pub struct PostgresQueue {
    pool: PgPool,
    lease_ms: i64,
    max_attempts: i32,
}

impl PostgresQueue {
    /// Create a queue over an existing pool and run its migration.
    pub async fn from_pool(pool: PgPool) -> Result<Self> {
        let queue = Self {
            pool,
            lease_ms: 60_000,
            max_attempts: 3,
        };
        queue.run_migrations().await?;
        Ok(queue)
    }

    /// Override the lease duration.
    pub fn with_lease_ms(mut self, lease_ms: i64) -> Self {
        self.lease_ms = lease_ms;
        self
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pipeline_tasks (
                id UUID PRIMARY KEY,
                task_type TEXT NOT NULL,
                payload JSONB NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                run_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                attempt INTEGER NOT NULL DEFAULT 0,
                max_attempts INTEGER NOT NULL DEFAULT 3,
                lease_expires_at TIMESTAMPTZ,
                worker_id TEXT,
                last_error TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(queue_err)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_pipeline_tasks_ready \
             ON pipeline_tasks(status, run_at)",
        )
        .execute(&self.pool)
        .await
        .ok();

        info!("task queue migrations complete");
        Ok(())
    }

    async fn insert(&self, task: Task, run_at: DateTime<Utc>) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO pipeline_tasks (id, task_type, payload, run_at, max_attempts)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(id)
        .bind(task.task_type())
        .bind(Json(&task))
        .bind(run_at)
        .bind(self.max_attempts)
        .execute(&self.pool)
        .await
        .map_err(queue_err)?;

        Ok(id)
    }
}

fn queue_err(e: sqlx::Error) -> PipelineError {
    PipelineError::Queue(e.to_string().into())
}

#[async_trait]
impl TaskQueue for PostgresQueue {
    async fn enqueue(&self, task: Task) -> Result<Uuid> {
        self.insert(task, Utc::now()).await
    }

    async fn enqueue_at(&self, task: Task, run_at: DateTime<Utc>) -> Result<Uuid> {
        self.insert(task, run_at).await
    }

    async fn claim(&self, worker_id: &str, limit: i64) -> Result<Vec<ClaimedTask>> {
        let rows: Vec<(Uuid, Json<Task>, i32)> = sqlx::query_as(
            r#"
            WITH ready AS (
                SELECT id FROM pipeline_tasks
                WHERE (status = 'pending' AND run_at <= NOW())
                   OR (status = 'running' AND lease_expires_at < NOW())
                ORDER BY run_at
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE pipeline_tasks t
            SET status = 'running',
                worker_id = $2,
                attempt = t.attempt + 1,
                lease_expires_at = NOW() + ($3 || ' milliseconds')::INTERVAL,
                updated_at = NOW()
            FROM ready
            WHERE t.id = ready.id
            RETURNING t.id, t.payload, t.attempt
            "#,
        )
        .bind(limit)
        .bind(worker_id)
        .bind(self.lease_ms.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(queue_err)?;

        Ok(rows
            .into_iter()
            .map(|(id, payload, attempt)| ClaimedTask {
                id,
                task: payload.0,
                attempt,
            })
            .collect())
    }

    async fn mark_succeeded(&self, task_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE pipeline_tasks
            SET status = 'succeeded', updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(task_id)
        .execute(&self.pool)
        .await
        .map_err(queue_err)?;

        Ok(())
    }

    async fn mark_failed(&self, task_id: Uuid, error: &str) -> Result<()> {
        let row: Option<(i32, i32)> = sqlx::query_as(
            "SELECT attempt, max_attempts FROM pipeline_tasks WHERE id = $1",
        )
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(queue_err)?;

        let Some((attempt, max_attempts)) = row else {
            return Ok(());
        };

        if attempt < max_attempts {
            // Exponential backoff, capped at an hour
            let delay_secs = 2i64.pow(attempt.max(0) as u32).min(3600);
            sqlx::query(
                r#"
                UPDATE pipeline_tasks
                SET status = 'pending',
                    run_at = NOW() + ($2 || ' seconds')::INTERVAL,
                    last_error = $3,
                    lease_expires_at = NULL,
                    worker_id = NULL,
                    updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(task_id)
            .bind(delay_secs.to_string())
            .bind(error)
            .execute(&self.pool)
            .await
            .map_err(queue_err)?;
        } else {
            sqlx::query(
                r#"
                UPDATE pipeline_tasks
                SET status = 'dead_letter',
                    last_error = $2,
                    updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(task_id)
            .bind(error)
            .execute(&self.pool)
            .await
            .map_err(queue_err)?;
        }

        Ok(())
    }
}
