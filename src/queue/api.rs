//! Enqueue and introspection entry points used by the CLI.

use rusqlite::Connection;

use super::error::QueueError;
use super::traits::TaskStore;
use super::types::{NewTask, Task, TaskStatus};

/// Validate and persist a new pending task. Returns the task id.
pub fn enqueue(
    conn: &Connection,
    store: &dyn TaskStore,
    site_id: &str,
    date_start: &str,
    date_end: &str,
    max_records: u32,
) -> Result<String, QueueError> {
    let request = NewTask::new(site_id, date_start, date_end, max_records);
    request.validate()?;

    let task = request.into_task();
    store.add_task(conn, &task)?;

    tracing::info!(
        task_id = %task.id,
        site_id = %task.site_id,
        date_start = %task.date_start,
        date_end = %task.date_end,
        max_records = task.max_records,
        "Task enqueued"
    );
    Ok(task.id)
}

pub fn list_tasks(
    conn: &Connection,
    store: &dyn TaskStore,
    status: Option<&str>,
) -> Result<Vec<Task>, QueueError> {
    let status = status
        .map(|s| {
            TaskStatus::from_str(s)
                .ok_or_else(|| QueueError::InvalidRequest(format!("Unknown task status: {s}")))
        })
        .transpose()?;
    store.list_tasks(conn, status)
}
