//! Task worker: a long-running service that claims tasks from the queue
//! and dispatches them to the matching pipeline stage.
//!
//! Stage-level outcomes (retry scheduled, record failed terminally) are the
//! pipeline's business and count as task success here; only task-level
//! errors (store unreachable, record missing) flow back to the queue's own
//! retry machinery.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::traits::queue::{ClaimedTask, Task, TaskQueue};

/// Configuration for the task worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum number of tasks to claim at once
    pub batch_size: i64,
    /// How long to wait when no tasks are available
    pub poll_interval: Duration,
    /// Worker ID for this instance
    pub worker_id: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            poll_interval: Duration::from_secs(5),
            worker_id: format!("worker-{}", Uuid::new_v4()),
        }
    }
}

impl WorkerConfig {
    /// Create a config with a specific worker ID.
    pub fn with_worker_id(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            ..Default::default()
        }
    }
}

/// A worker that processes pipeline tasks from a queue.
pub struct Worker {
    queue: Arc<dyn TaskQueue>,
    pipeline: Arc<Pipeline>,
    config: WorkerConfig,
}

impl Worker {
    pub fn new(queue: Arc<dyn TaskQueue>, pipeline: Arc<Pipeline>) -> Self {
        Self {
            queue,
            pipeline,
            config: WorkerConfig::default(),
        }
    }

    pub fn with_config(
        queue: Arc<dyn TaskQueue>,
        pipeline: Arc<Pipeline>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            pipeline,
            config,
        }
    }

    /// Run until the shutdown token fires.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            worker_id = %self.config.worker_id,
            batch_size = self.config.batch_size,
            "task worker starting"
        );

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let tasks = match self
                .queue
                .claim(&self.config.worker_id, self.config.batch_size)
                .await
            {
                Ok(tasks) => tasks,
                Err(e) => {
                    error!(error = %e, "failed to claim tasks");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            if tasks.is_empty() {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                }
                continue;
            }

            debug!(count = tasks.len(), "claimed tasks");

            let handles: Vec<_> = tasks
                .into_iter()
                .map(|task| self.process_task(task))
                .collect();
            join_all(handles).await;
        }

        info!(worker_id = %self.config.worker_id, "task worker stopped");
    }

    /// Claim and process until the queue has nothing due. Returns the
    /// number of tasks processed. Used by one-shot runners and tests.
    pub async fn run_until_empty(&self) -> Result<usize> {
        let mut processed = 0;
        loop {
            let tasks = self
                .queue
                .claim(&self.config.worker_id, self.config.batch_size)
                .await?;
            if tasks.is_empty() {
                return Ok(processed);
            }
            for task in tasks {
                self.process_task(task).await;
                processed += 1;
            }
        }
    }

    async fn process_task(&self, claimed: ClaimedTask) {
        let task_id = claimed.id;
        let task_type = claimed.task.task_type();
        let record_id = claimed.task.record_id();

        let result = match claimed.task {
            Task::Download { record_id } => self
                .pipeline
                .run_download(record_id)
                .await
                .map(|outcome| debug!(record_id = %record_id, ?outcome, "download stage done")),
            Task::Extract { record_id } => self
                .pipeline
                .run_extract(record_id)
                .await
                .map(|outcome| debug!(record_id = %record_id, ?outcome, "extract stage done")),
        };

        match result {
            Ok(()) => {
                if let Err(e) = self.queue.mark_succeeded(task_id).await {
                    error!(task_id = %task_id, error = %e, "failed to mark task as succeeded");
                }
            }
            Err(e) => {
                warn!(
                    task_id = %task_id,
                    task_type = %task_type,
                    record_id = %record_id,
                    error = %e,
                    "task failed"
                );
                if let Err(e) = self.queue.mark_failed(task_id, &e.to_string()).await {
                    error!(task_id = %task_id, error = %e, "failed to mark task as failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.batch_size, 10);
        assert!(config.worker_id.starts_with("worker-"));
    }

    #[test]
    fn test_config_with_worker_id() {
        let config = WorkerConfig::with_worker_id("my-worker");
        assert_eq!(config.worker_id, "my-worker");
    }
}
