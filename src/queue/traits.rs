//! Seams of the task queue:
//! - TaskStore: durable task persistence and the claim transition
//! - SiteExecutor: per-site source of raw documents
//! - Sleeper: blocking backoff delay

use std::time::Duration;

use rusqlite::Connection;

use super::error::{ExecutionError, QueueError};
use super::types::{Task, TaskStatus};
use crate::pipeline::extract::RawDocument;

pub trait TaskStore: Send + Sync {
    fn add_task(&self, conn: &Connection, task: &Task) -> Result<(), QueueError>;

    fn get_task(&self, conn: &Connection, task_id: &str) -> Result<Task, QueueError>;

    /// Oldest pending task by creation time, without claiming it.
    fn get_next_pending(&self, conn: &Connection) -> Result<Option<Task>, QueueError>;

    /// Move a pending task to running and increment attempts in one statement.
    /// Returns None if the task is no longer pending.
    fn mark_running(&self, conn: &Connection, task_id: &str) -> Result<Option<Task>, QueueError>;

    /// Persist status, cursor, attempts and last_error; refreshes `updated_at`.
    fn update_task(&self, conn: &Connection, task: &mut Task) -> Result<(), QueueError>;

    /// Newest first.
    fn list_tasks(
        &self,
        conn: &Connection,
        status: Option<TaskStatus>,
    ) -> Result<Vec<Task>, QueueError>;

    /// Return `running` tasks not updated since `older_than` to the queue.
    fn requeue_stale_running(
        &self,
        conn: &Connection,
        older_than: &str,
        max_attempts: u32,
    ) -> Result<Vec<Task>, QueueError>;
}

/// Produces raw documents for one site. Navigation and OCR live behind this.
pub trait SiteExecutor: Send + Sync {
    fn site_id(&self) -> &str;

    fn fetch_documents(&self, task: &Task) -> Result<Vec<RawDocument>, ExecutionError>;
}

pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Blocks the current thread.
#[derive(Debug, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
