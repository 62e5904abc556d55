//! Durable task queue seam.
//!
//! Delivery is at-least-once: a claimed task whose lease expires becomes
//! claimable again, so every task handler must be idempotent. The record
//! store's compare-and-set transitions carry that burden.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// Work items the pipeline enqueues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum Task {
    /// Stage 1: fetch and normalize one posting
    Download { record_id: Uuid },
    /// Stage 2: LLM extraction for one downloaded posting
    Extract { record_id: Uuid },
}

impl Task {
    pub fn record_id(&self) -> Uuid {
        match self {
            Task::Download { record_id } | Task::Extract { record_id } => *record_id,
        }
    }

    pub fn task_type(&self) -> &'static str {
        match self {
            Task::Download { .. } => "download",
            Task::Extract { .. } => "extract",
        }
    }
}

/// A task claimed by a worker.
#[derive(Debug, Clone)]
pub struct ClaimedTask {
    pub id: Uuid,
    pub task: Task,
    /// Delivery count including this claim
    pub attempt: i32,
}

/// Trait for task queue operations.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Enqueue a task for immediate execution.
    async fn enqueue(&self, task: Task) -> Result<Uuid>;

    /// Schedule a task for future execution.
    async fn enqueue_at(&self, task: Task, run_at: DateTime<Utc>) -> Result<Uuid>;

    /// Claim up to `limit` due tasks for this worker.
    async fn claim(&self, worker_id: &str, limit: i64) -> Result<Vec<ClaimedTask>>;

    /// Mark a claimed task as completed.
    async fn mark_succeeded(&self, task_id: Uuid) -> Result<()>;

    /// Mark a claimed task as failed. Implementations retry with backoff
    /// until their attempt budget runs out, then dead-letter.
    async fn mark_failed(&self, task_id: Uuid, error: &str) -> Result<()>;
}
