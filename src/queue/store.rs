//! SQLite task store.

use rusqlite::{params, Connection, OptionalExtension};

use super::error::QueueError;
use super::traits::TaskStore;
use super::types::{Task, TaskStatus};
use crate::db::{now_timestamp, DatabaseError};

pub const STALE_RECOVERED_MESSAGE: &str = "Recovered from stale running state";

const TASK_COLUMNS: &str = "id, site_id, date_start, date_end, max_records, cursor, status,
        attempts, last_error, created_at, updated_at";

#[derive(Debug, Default)]
pub struct SqliteTaskStore;

impl SqliteTaskStore {
    pub fn new() -> Self {
        Self
    }
}

impl TaskStore for SqliteTaskStore {
    fn add_task(&self, conn: &Connection, task: &Task) -> Result<(), QueueError> {
        conn.execute(
            "INSERT INTO tasks
             (id, site_id, date_start, date_end, max_records, cursor, status,
              attempts, last_error, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                task.id,
                task.site_id,
                task.date_start,
                task.date_end,
                task.max_records,
                task.cursor,
                task.status.as_str(),
                task.attempts,
                task.last_error,
                task.created_at,
                task.updated_at,
            ],
        )
        .map_err(DatabaseError::from)?;
        Ok(())
    }

    fn get_task(&self, conn: &Connection, task_id: &str) -> Result<Task, QueueError> {
        let row = conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                params![task_id],
                task_row,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => QueueError::NotFound(task_id.to_string()),
                _ => QueueError::Database(DatabaseError::Sqlite(e)),
            })?;
        task_from_row(row)
    }

    fn get_next_pending(&self, conn: &Connection) -> Result<Option<Task>, QueueError> {
        let row = conn
            .query_row(
                &format!(
                    "SELECT {TASK_COLUMNS} FROM tasks
                     WHERE status = 'pending'
                     ORDER BY created_at ASC, rowid ASC
                     LIMIT 1"
                ),
                [],
                task_row,
            )
            .optional()
            .map_err(DatabaseError::from)?;
        row.map(task_from_row).transpose()
    }

    fn mark_running(&self, conn: &Connection, task_id: &str) -> Result<Option<Task>, QueueError> {
        let row = conn
            .query_row(
                &format!(
                    "UPDATE tasks
                     SET status = 'running', attempts = attempts + 1, updated_at = ?2
                     WHERE id = ?1 AND status = 'pending'
                     RETURNING {TASK_COLUMNS}"
                ),
                params![task_id, now_timestamp()],
                task_row,
            )
            .optional()
            .map_err(DatabaseError::from)?;
        row.map(task_from_row).transpose()
    }

    fn update_task(&self, conn: &Connection, task: &mut Task) -> Result<(), QueueError> {
        task.updated_at = now_timestamp();
        // attempts never moves backwards, whatever the caller holds
        let changed = conn
            .execute(
                "UPDATE tasks
                 SET status = ?1, cursor = ?2, attempts = MAX(attempts, ?3),
                     last_error = ?4, updated_at = ?5
                 WHERE id = ?6",
                params![
                    task.status.as_str(),
                    task.cursor,
                    task.attempts,
                    task.last_error,
                    task.updated_at,
                    task.id,
                ],
            )
            .map_err(DatabaseError::from)?;
        if changed == 0 {
            return Err(QueueError::NotFound(task.id.clone()));
        }
        Ok(())
    }

    fn list_tasks(
        &self,
        conn: &Connection,
        status: Option<TaskStatus>,
    ) -> Result<Vec<Task>, QueueError> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {TASK_COLUMNS} FROM tasks
                 WHERE ?1 IS NULL OR status = ?1
                 ORDER BY created_at DESC, rowid DESC"
            ))
            .map_err(DatabaseError::from)?;

        let rows = stmt
            .query_map(params![status.map(|s| s.as_str())], task_row)
            .map_err(DatabaseError::from)?;

        let mut tasks = Vec::new();
        for row in rows {
            let row = row.map_err(DatabaseError::from)?;
            tasks.push(task_from_row(row)?);
        }
        Ok(tasks)
    }

    fn requeue_stale_running(
        &self,
        conn: &Connection,
        older_than: &str,
        max_attempts: u32,
    ) -> Result<Vec<Task>, QueueError> {
        let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;

        let stale = {
            let mut stmt = tx
                .prepare(&format!(
                    "SELECT {TASK_COLUMNS} FROM tasks
                     WHERE status = 'running' AND updated_at < ?1
                     ORDER BY created_at ASC, rowid ASC"
                ))
                .map_err(DatabaseError::from)?;
            let rows = stmt
                .query_map(params![older_than], task_row)
                .map_err(DatabaseError::from)?;
            let mut stale = Vec::new();
            for row in rows {
                let row = row.map_err(DatabaseError::from)?;
                stale.push(task_from_row(row)?);
            }
            stale
        };

        let now = now_timestamp();
        let mut recovered = Vec::with_capacity(stale.len());
        for mut task in stale {
            // The crashed run already counted as an attempt.
            if task.attempts >= max_attempts {
                task.status = TaskStatus::Failed;
                task.last_error = format!(
                    "{STALE_RECOVERED_MESSAGE}; attempts exhausted ({}/{max_attempts})",
                    task.attempts
                );
            } else {
                task.status = TaskStatus::Pending;
                task.last_error = STALE_RECOVERED_MESSAGE.to_string();
            }
            task.updated_at = now.clone();

            tx.execute(
                "UPDATE tasks SET status = ?1, last_error = ?2, updated_at = ?3
                 WHERE id = ?4 AND status = 'running'",
                params![task.status.as_str(), task.last_error, task.updated_at, task.id],
            )
            .map_err(DatabaseError::from)?;

            tracing::warn!(
                task_id = %task.id,
                site_id = %task.site_id,
                attempts = task.attempts,
                status = %task.status,
                "Recovered stale running task"
            );
            recovered.push(task);
        }

        tx.commit().map_err(DatabaseError::from)?;
        Ok(recovered)
    }
}

// ═══════════════════════════════════════════
// Internal row mapping
// ═══════════════════════════════════════════

struct TaskRow {
    id: String,
    site_id: String,
    date_start: String,
    date_end: String,
    max_records: u32,
    cursor: String,
    status: String,
    attempts: u32,
    last_error: String,
    created_at: String,
    updated_at: String,
}

fn task_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskRow> {
    Ok(TaskRow {
        id: row.get(0)?,
        site_id: row.get(1)?,
        date_start: row.get(2)?,
        date_end: row.get(3)?,
        max_records: row.get(4)?,
        cursor: row.get(5)?,
        status: row.get(6)?,
        attempts: row.get(7)?,
        last_error: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn task_from_row(row: TaskRow) -> Result<Task, QueueError> {
    let status = TaskStatus::from_str(&row.status).ok_or_else(|| {
        QueueError::Database(DatabaseError::InvalidEnum {
            field: "tasks.status".to_string(),
            value: row.status.clone(),
        })
    })?;

    Ok(Task {
        id: row.id,
        site_id: row.site_id,
        date_start: row.date_start,
        date_end: row.date_end,
        max_records: row.max_records,
        cursor: row.cursor,
        status,
        attempts: row.attempts,
        last_error: row.last_error,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::queue::types::NewTask;

    fn setup_db() -> Connection {
        open_memory_database().expect("Failed to open in-memory DB")
    }

    fn make_task(site_id: &str) -> Task {
        NewTask::new(site_id, "01/01/2024", "01/31/2024", 10).into_task()
    }

    #[test]
    fn add_and_get() {
        let conn = setup_db();
        let store = SqliteTaskStore::new();
        let task = make_task("12");
        store.add_task(&conn, &task).unwrap();

        let loaded = store.get_task(&conn, &task.id).unwrap();
        assert_eq!(loaded, task);
    }

    #[test]
    fn get_missing_is_not_found() {
        let conn = setup_db();
        let err = SqliteTaskStore::new().get_task(&conn, "nope").unwrap_err();
        assert!(matches!(err, QueueError::NotFound(id) if id == "nope"));
    }

    #[test]
    fn next_pending_is_fifo() {
        let conn = setup_db();
        let store = SqliteTaskStore::new();
        let first = make_task("12");
        let second = make_task("10");
        store.add_task(&conn, &first).unwrap();
        store.add_task(&conn, &second).unwrap();

        assert_eq!(store.get_next_pending(&conn).unwrap().unwrap().id, first.id);
    }

    #[test]
    fn fifo_tie_breaks_on_insert_order() {
        let conn = setup_db();
        let store = SqliteTaskStore::new();
        let first = make_task("12");
        let mut second = make_task("10");
        second.created_at = first.created_at.clone();
        store.add_task(&conn, &first).unwrap();
        store.add_task(&conn, &second).unwrap();

        let next = store.get_next_pending(&conn).unwrap().unwrap();
        assert_eq!(next.id, first.id);
        store.mark_running(&conn, &next.id).unwrap();
        assert_eq!(store.get_next_pending(&conn).unwrap().unwrap().id, second.id);
    }

    #[test]
    fn empty_queue_has_no_next() {
        let conn = setup_db();
        assert!(SqliteTaskStore::new().get_next_pending(&conn).unwrap().is_none());
    }

    #[test]
    fn mark_running_claims_once() {
        let conn = setup_db();
        let store = SqliteTaskStore::new();
        let task = make_task("12");
        store.add_task(&conn, &task).unwrap();

        let claimed = store.mark_running(&conn, &task.id).unwrap().unwrap();
        assert_eq!(claimed.status, TaskStatus::Running);
        assert_eq!(claimed.attempts, 1);

        assert!(store.mark_running(&conn, &task.id).unwrap().is_none());
        assert_eq!(store.get_task(&conn, &task.id).unwrap().attempts, 1);
    }

    #[test]
    fn update_persists_and_refreshes_timestamp() {
        let conn = setup_db();
        let store = SqliteTaskStore::new();
        let task = make_task("12");
        store.add_task(&conn, &task).unwrap();

        let mut claimed = store.mark_running(&conn, &task.id).unwrap().unwrap();
        let before = claimed.updated_at.clone();
        claimed.status = TaskStatus::Completed;
        claimed.cursor = "records_written=3".into();
        store.update_task(&conn, &mut claimed).unwrap();

        let loaded = store.get_task(&conn, &task.id).unwrap();
        assert_eq!(loaded.status, TaskStatus::Completed);
        assert_eq!(loaded.cursor, "records_written=3");
        assert!(loaded.updated_at >= before);
    }

    #[test]
    fn update_never_lowers_attempts() {
        let conn = setup_db();
        let store = SqliteTaskStore::new();
        let task = make_task("12");
        store.add_task(&conn, &task).unwrap();

        let mut claimed = store.mark_running(&conn, &task.id).unwrap().unwrap();
        claimed.attempts = 0;
        store.update_task(&conn, &mut claimed).unwrap();
        assert_eq!(store.get_task(&conn, &task.id).unwrap().attempts, 1);
    }

    #[test]
    fn update_missing_is_not_found() {
        let conn = setup_db();
        let mut task = make_task("12");
        let err = SqliteTaskStore::new().update_task(&conn, &mut task).unwrap_err();
        assert!(matches!(err, QueueError::NotFound(_)));
    }

    #[test]
    fn list_filters_by_status() {
        let conn = setup_db();
        let store = SqliteTaskStore::new();
        let a = make_task("12");
        let b = make_task("10");
        store.add_task(&conn, &a).unwrap();
        store.add_task(&conn, &b).unwrap();
        store.mark_running(&conn, &a.id).unwrap();

        assert_eq!(store.list_tasks(&conn, None).unwrap().len(), 2);
        let running = store.list_tasks(&conn, Some(TaskStatus::Running)).unwrap();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].id, a.id);
        assert!(store.list_tasks(&conn, Some(TaskStatus::Failed)).unwrap().is_empty());
    }

    #[test]
    fn list_is_newest_first() {
        let conn = setup_db();
        let store = SqliteTaskStore::new();
        let a = make_task("12");
        let b = make_task("10");
        store.add_task(&conn, &a).unwrap();
        store.add_task(&conn, &b).unwrap();

        let ids: Vec<String> = store.list_tasks(&conn, None).unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);
    }

    #[test]
    fn stale_running_is_requeued_with_attempts_kept() {
        let conn = setup_db();
        let store = SqliteTaskStore::new();
        let task = make_task("12");
        store.add_task(&conn, &task).unwrap();
        store.mark_running(&conn, &task.id).unwrap();

        let recovered = store
            .requeue_stale_running(&conn, "9999-12-31T00:00:00.000000Z", 3)
            .unwrap();
        assert_eq!(recovered.len(), 1);

        let loaded = store.get_task(&conn, &task.id).unwrap();
        assert_eq!(loaded.status, TaskStatus::Pending);
        assert_eq!(loaded.attempts, 1);
        assert_eq!(loaded.last_error, STALE_RECOVERED_MESSAGE);
    }

    #[test]
    fn stale_running_with_exhausted_attempts_fails() {
        let conn = setup_db();
        let store = SqliteTaskStore::new();
        let task = make_task("12");
        store.add_task(&conn, &task).unwrap();
        store.mark_running(&conn, &task.id).unwrap();

        store
            .requeue_stale_running(&conn, "9999-12-31T00:00:00.000000Z", 1)
            .unwrap();
        let loaded = store.get_task(&conn, &task.id).unwrap();
        assert_eq!(loaded.status, TaskStatus::Failed);
        assert!(loaded.last_error.contains("attempts exhausted"));
    }

    #[test]
    fn fresh_running_is_left_alone() {
        let conn = setup_db();
        let store = SqliteTaskStore::new();
        let task = make_task("12");
        store.add_task(&conn, &task).unwrap();
        store.mark_running(&conn, &task.id).unwrap();

        let recovered = store
            .requeue_stale_running(&conn, "2000-01-01T00:00:00.000000Z", 3)
            .unwrap();
        assert!(recovered.is_empty());
        assert_eq!(store.get_task(&conn, &task.id).unwrap().status, TaskStatus::Running);
    }
}
