//! Task queue implementations and the worker loop.

pub mod memory;
pub mod postgres;
pub mod worker;

pub use memory::{MemoryQueue, QueuedTask, TaskState};
pub use postgres::PostgresQueue;
pub use worker::{Worker, WorkerConfig};
