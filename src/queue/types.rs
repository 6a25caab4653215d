use std::fmt;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::QueueError;
use crate::db::now_timestamp;

/// Attempts allowed before a task becomes terminally `failed`.
pub const MAX_ATTEMPTS: u32 = 3;

pub const DEFAULT_MAX_RECORDS: u32 = 50;

/// Format of `date_start` / `date_end`.
pub const TASK_DATE_FORMAT: &str = "%m/%d/%Y";

// ═══════════════════════════════════════════
// Status
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn all() -> &'static [TaskStatus] {
        &[Self::Pending, Self::Running, Self::Completed, Self::Failed]
    }

    /// Terminal tasks are never dispatched again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════
// Task
// ═══════════════════════════════════════════

/// A durable scrape job for one site and date window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub site_id: String,
    pub date_start: String,
    pub date_end: String,
    pub max_records: u32,
    /// Opaque progress token; after a successful run it holds the publish counts.
    pub cursor: String,
    pub status: TaskStatus,
    pub attempts: u32,
    pub last_error: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Task {
    /// Parsed date window, or None if either bound is malformed.
    pub fn date_window(&self) -> Option<(NaiveDate, NaiveDate)> {
        let start = NaiveDate::parse_from_str(self.date_start.trim(), TASK_DATE_FORMAT).ok()?;
        let end = NaiveDate::parse_from_str(self.date_end.trim(), TASK_DATE_FORMAT).ok()?;
        Some((start, end))
    }
}

/// Enqueue request, validated before it becomes a `Task`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub site_id: String,
    pub date_start: String,
    pub date_end: String,
    #[serde(default = "default_max_records")]
    pub max_records: u32,
}

fn default_max_records() -> u32 {
    DEFAULT_MAX_RECORDS
}

impl NewTask {
    pub fn new(site_id: &str, date_start: &str, date_end: &str, max_records: u32) -> Self {
        Self {
            site_id: site_id.trim().to_string(),
            date_start: date_start.trim().to_string(),
            date_end: date_end.trim().to_string(),
            max_records,
        }
    }

    pub fn validate(&self) -> Result<(), QueueError> {
        if self.site_id.trim().is_empty() {
            return Err(QueueError::InvalidRequest("site_id must not be empty".into()));
        }
        if self.max_records == 0 {
            return Err(QueueError::InvalidRequest("max_records must be at least 1".into()));
        }
        let start = parse_task_date("date_start", &self.date_start)?;
        let end = parse_task_date("date_end", &self.date_end)?;
        if start > end {
            return Err(QueueError::InvalidRequest(format!(
                "date_start {} is after date_end {}",
                self.date_start, self.date_end
            )));
        }
        Ok(())
    }

    /// Build the pending task with a fresh id and `attempts = 0`.
    pub fn into_task(self) -> Task {
        let now = now_timestamp();
        Task {
            id: Uuid::new_v4().simple().to_string(),
            site_id: self.site_id,
            date_start: self.date_start,
            date_end: self.date_end,
            max_records: self.max_records,
            cursor: String::new(),
            status: TaskStatus::Pending,
            attempts: 0,
            last_error: String::new(),
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

fn parse_task_date(field: &str, value: &str) -> Result<NaiveDate, QueueError> {
    NaiveDate::parse_from_str(value.trim(), TASK_DATE_FORMAT).map_err(|_| {
        QueueError::InvalidRequest(format!("{field} must be MM/DD/YYYY, got {value:?}"))
    })
}

// ═══════════════════════════════════════════
// Retry policy
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            backoff_base_secs: 1,
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt: `base * 2^attempts`.
    pub fn backoff_for(&self, attempts: u32) -> Duration {
        let factor = 2u64.checked_pow(attempts).unwrap_or(u64::MAX);
        Duration::from_secs(self.backoff_base_secs.saturating_mul(factor))
    }

    pub fn exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }
}

// ═══════════════════════════════════════════
// Run outcome
// ═══════════════════════════════════════════

/// What happened to a task on one worker pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TaskRun {
    Completed { task_id: String, cursor: String },
    Retrying { task_id: String, attempts: u32, backoff_secs: u64, error: String },
    Failed { task_id: String, attempts: u32, error: String },
    /// Another worker claimed the task first.
    NotClaimed { task_id: String },
}

impl TaskRun {
    pub fn task_id(&self) -> &str {
        match self {
            Self::Completed { task_id, .. }
            | Self::Retrying { task_id, .. }
            | Self::Failed { task_id, .. }
            | Self::NotClaimed { task_id } => task_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrip() {
        for status in TaskStatus::all() {
            assert_eq!(TaskStatus::from_str(status.as_str()), Some(*status));
        }
        assert_eq!(TaskStatus::from_str("cancelled"), None);
    }

    #[test]
    fn terminal_states() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
    }

    #[test]
    fn new_task_validation() {
        assert!(NewTask::new("12", "01/01/2024", "01/31/2024", 50).validate().is_ok());
        assert!(NewTask::new("12", "01/01/2024", "01/01/2024", 1).validate().is_ok());
        assert!(NewTask::new("", "01/01/2024", "01/31/2024", 50).validate().is_err());
        assert!(NewTask::new("12", "2024-01-01", "01/31/2024", 50).validate().is_err());
        assert!(NewTask::new("12", "02/30/2024", "03/01/2024", 50).validate().is_err());
        assert!(NewTask::new("12", "02/01/2024", "01/01/2024", 50).validate().is_err());
        assert!(NewTask::new("12", "01/01/2024", "01/31/2024", 0).validate().is_err());
    }

    #[test]
    fn into_task_starts_pending() {
        let task = NewTask::new(" 10 ", "01/01/2024", "01/31/2024", 5).into_task();
        assert_eq!(task.site_id, "10");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.attempts, 0);
        assert_eq!(task.id.len(), 32);
        assert_eq!(task.created_at, task.updated_at);
    }

    #[test]
    fn date_window_parses() {
        let task = NewTask::new("10", "01/01/2024", "01/31/2024", 5).into_task();
        let (start, end) = task.date_window().unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_for(1), Duration::from_secs(2));
        assert_eq!(policy.backoff_for(2), Duration::from_secs(4));
        assert_eq!(policy.backoff_for(200), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn exhaustion() {
        let policy = RetryPolicy::default();
        assert!(!policy.exhausted(2));
        assert!(policy.exhausted(3));
    }
}
