//! In-memory task queue for testing and development.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::traits::queue::{ClaimedTask, Task, TaskQueue};

/// Task delivery state, mirroring the durable queue's statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
    Succeeded,
    DeadLetter,
}

#[derive(Debug, Clone)]
pub struct QueuedTask {
    pub id: Uuid,
    pub task: Task,
    pub state: TaskState,
    pub run_at: DateTime<Utc>,
    pub attempt: i32,
    pub max_attempts: i32,
    pub last_error: Option<String>,
}

/// In-memory queue with the same claim semantics as the Postgres queue:
/// due pending tasks are claimed in `run_at` order and redelivery can be
/// forced for tests via [`MemoryQueue::redeliver`].
pub struct MemoryQueue {
    tasks: RwLock<Vec<QueuedTask>>,
    max_attempts: i32,
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self {
            tasks: RwLock::new(Vec::new()),
            max_attempts: 3,
        }
    }

    /// Tasks not yet succeeded or dead-lettered.
    pub fn open_count(&self) -> usize {
        self.tasks
            .read()
            .unwrap()
            .iter()
            .filter(|t| matches!(t.state, TaskState::Pending | TaskState::Running))
            .count()
    }

    /// Snapshot of every task ever enqueued, in insertion order.
    pub fn snapshot(&self) -> Vec<QueuedTask> {
        self.tasks.read().unwrap().clone()
    }

    /// Make every pending task due now (collapses retry delays in tests).
    pub fn make_all_due(&self) {
        let now = Utc::now();
        for task in self.tasks.write().unwrap().iter_mut() {
            if task.state == TaskState::Pending {
                task.run_at = now;
            }
        }
    }

    /// Force a claimed task back to pending, simulating lease expiry.
    pub fn redeliver(&self, task_id: Uuid) -> bool {
        let mut tasks = self.tasks.write().unwrap();
        for task in tasks.iter_mut() {
            if task.id == task_id && task.state == TaskState::Running {
                task.state = TaskState::Pending;
                task.run_at = Utc::now();
                return true;
            }
        }
        false
    }

    fn push(&self, task: Task, run_at: DateTime<Utc>) -> Uuid {
        let id = Uuid::new_v4();
        self.tasks.write().unwrap().push(QueuedTask {
            id,
            task,
            state: TaskState::Pending,
            run_at,
            attempt: 0,
            max_attempts: self.max_attempts,
            last_error: None,
        });
        id
    }
}

#[async_trait]
impl TaskQueue for MemoryQueue {
    async fn enqueue(&self, task: Task) -> Result<Uuid> {
        Ok(self.push(task, Utc::now()))
    }

    async fn enqueue_at(&self, task: Task, run_at: DateTime<Utc>) -> Result<Uuid> {
        Ok(self.push(task, run_at))
    }

    async fn claim(&self, _worker_id: &str, limit: i64) -> Result<Vec<ClaimedTask>> {
        let now = Utc::now();
        let mut tasks = self.tasks.write().unwrap();

        let mut due: Vec<usize> = tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.state == TaskState::Pending && t.run_at <= now)
            .map(|(i, _)| i)
            .collect();
        due.sort_by_key(|&i| tasks[i].run_at);

        let mut claimed = Vec::new();
        for i in due.into_iter().take(limit.max(0) as usize) {
            let task = &mut tasks[i];
            task.state = TaskState::Running;
            task.attempt += 1;
            claimed.push(ClaimedTask {
                id: task.id,
                task: task.task,
                attempt: task.attempt,
            });
        }
        Ok(claimed)
    }

    async fn mark_succeeded(&self, task_id: Uuid) -> Result<()> {
        let mut tasks = self.tasks.write().unwrap();
        if let Some(task) = tasks.iter_mut().find(|t| t.id == task_id) {
            task.state = TaskState::Succeeded;
        }
        Ok(())
    }

    async fn mark_failed(&self, task_id: Uuid, error: &str) -> Result<()> {
        let mut tasks = self.tasks.write().unwrap();
        if let Some(task) = tasks.iter_mut().find(|t| t.id == task_id) {
            task.last_error = Some(error.to_string());
            if task.attempt < task.max_attempts {
                let delay_secs = 2i64.pow(task.attempt.max(0) as u32).min(3600);
                task.state = TaskState::Pending;
                task.run_at = Utc::now() + chrono::Duration::seconds(delay_secs);
            } else {
                task.state = TaskState::DeadLetter;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_claim_respects_due_time() {
        let queue = MemoryQueue::new();
        let record_id = Uuid::new_v4();
        queue.enqueue(Task::Download { record_id }).await.unwrap();
        queue
            .enqueue_at(
                Task::Extract { record_id },
                Utc::now() + chrono::Duration::hours(1),
            )
            .await
            .unwrap();

        let claimed = queue.claim("w1", 10).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].task.task_type(), "download");

        // Claimed tasks are not redelivered while running
        assert!(queue.claim("w2", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_claim_orders_by_run_at() {
        let queue = MemoryQueue::new();
        let record_id = Uuid::new_v4();
        let later = queue.enqueue(Task::Extract { record_id }).await.unwrap();
        let earlier = queue
            .enqueue_at(
                Task::Download { record_id },
                Utc::now() - chrono::Duration::hours(1),
            )
            .await
            .unwrap();

        let claimed = queue.claim("w1", 10).await.unwrap();
        assert_eq!(claimed.len(), 2);
        assert_eq!(claimed[0].id, earlier);
        assert_eq!(claimed[1].id, later);
    }

    #[tokio::test]
    async fn test_failed_task_retries_then_dead_letters() {
        let queue = MemoryQueue::new();
        let id = queue
            .enqueue(Task::Download {
                record_id: Uuid::new_v4(),
            })
            .await
            .unwrap();

        for _ in 0..3 {
            queue.make_all_due();
            let claimed = queue.claim("w1", 10).await.unwrap();
            assert_eq!(claimed.len(), 1);
            queue.mark_failed(id, "store offline").await.unwrap();
        }

        queue.make_all_due();
        assert!(queue.claim("w1", 10).await.unwrap().is_empty());
        let snapshot = queue.snapshot();
        assert_eq!(snapshot[0].state, TaskState::DeadLetter);
        assert_eq!(snapshot[0].last_error.as_deref(), Some("store offline"));
    }

    #[tokio::test]
    async fn test_redeliver_simulates_lease_expiry() {
        let queue = MemoryQueue::new();
        let id = queue
            .enqueue(Task::Download {
                record_id: Uuid::new_v4(),
            })
            .await
            .unwrap();

        let first = queue.claim("w1", 10).await.unwrap();
        assert_eq!(first.len(), 1);
        assert!(queue.redeliver(id));

        let second = queue.claim("w2", 10).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].attempt, 2);
    }
}
