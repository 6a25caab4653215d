//! Worker: claims pending tasks and drives them through the pipeline.
//!
//! Single-worker, sequential: one task is claimed and fully executed before
//! the next selection. The retry backoff blocks through the `Sleeper`.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use rusqlite::Connection;

use super::error::{ExecutionError, QueueError};
use super::executor::ExecutorRegistry;
use super::store::SqliteTaskStore;
use super::traits::{SiteExecutor, Sleeper, TaskStore, ThreadSleeper};
use super::types::{RetryPolicy, Task, TaskRun, TaskStatus};
use crate::config::AppConfig;
use crate::db::format_timestamp;
use crate::pipeline::dedupe::{DedupeKey, RowStore};
use crate::pipeline::mapping::{SiteMetadata, YearPivot};
use crate::pipeline::publish::{publish, LienPipeline, PublishOutcome};
use crate::pipeline::review::{create_review_item, ReviewStore, SqliteReviewStore};

pub struct Worker {
    tasks: Box<dyn TaskStore>,
    reviews: Box<dyn ReviewStore>,
    sleeper: Box<dyn Sleeper>,
    executors: ExecutorRegistry,
    pipeline: LienPipeline,
    retry: RetryPolicy,
    sites: BTreeMap<String, SiteMetadata>,
    key: DedupeKey,
}

impl Worker {
    pub fn new(
        executors: ExecutorRegistry,
        pipeline: LienPipeline,
        retry: RetryPolicy,
        sites: Vec<SiteMetadata>,
    ) -> Self {
        Self {
            tasks: Box::new(SqliteTaskStore::new()),
            reviews: Box::new(SqliteReviewStore::new()),
            sleeper: Box::new(ThreadSleeper),
            executors,
            pipeline,
            retry,
            sites: sites.into_iter().map(|s| (s.site_id.clone(), s)).collect(),
            key: DedupeKey::standard(),
        }
    }

    pub fn from_config(config: &AppConfig, executors: ExecutorRegistry) -> Self {
        let pipeline = LienPipeline::new(YearPivot(config.two_digit_year_pivot), config.verification);
        let sites = config.enabled_sites().map(|s| s.metadata()).collect();
        Self::new(executors, pipeline, config.retry, sites)
    }

    pub fn with_sleeper(mut self, sleeper: Box<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_task_store(mut self, tasks: Box<dyn TaskStore>) -> Self {
        self.tasks = tasks;
        self
    }

    pub fn with_review_store(mut self, reviews: Box<dyn ReviewStore>) -> Self {
        self.reviews = reviews;
        self
    }

    pub fn with_key(mut self, key: DedupeKey) -> Self {
        self.key = key;
        self
    }

    /// Claim and run the oldest pending task. None when the queue is empty.
    pub fn run_next(
        &self,
        conn: &Connection,
        rows: &dyn RowStore,
    ) -> Result<Option<TaskRun>, QueueError> {
        match self.tasks.get_next_pending(conn)? {
            Some(task) => self.run_task(conn, rows, task).map(Some),
            None => Ok(None),
        }
    }

    /// Run pending tasks until the queue is empty or `limit` runs happened.
    pub fn run_until_idle(
        &self,
        conn: &Connection,
        rows: &dyn RowStore,
        limit: Option<usize>,
    ) -> Result<Vec<TaskRun>, QueueError> {
        let mut runs = Vec::new();
        while limit.map_or(true, |max| runs.len() < max) {
            match self.run_next(conn, rows)? {
                Some(run) => runs.push(run),
                None => break,
            }
        }
        Ok(runs)
    }

    /// Run one pending task through claim, execution and bookkeeping.
    pub fn run_task(
        &self,
        conn: &Connection,
        rows: &dyn RowStore,
        task: Task,
    ) -> Result<TaskRun, QueueError> {
        if task.status.is_terminal() {
            return Err(QueueError::InvalidRequest(format!(
                "Task {} is already {}",
                task.id, task.status
            )));
        }

        // Unknown sites fail before the claim, so no attempt is consumed.
        let resolved = self
            .executors
            .get(&task.site_id)
            .zip(self.sites.get(&task.site_id));
        let Some((executor, site)) = resolved else {
            let error = ExecutionError::UnsupportedSite(task.site_id.clone());
            return self.fail(conn, task, &error);
        };

        let Some(mut task) = self.tasks.mark_running(conn, &task.id)? else {
            tracing::debug!(task_id = %task.id, "Task claimed elsewhere");
            return Ok(TaskRun::NotClaimed { task_id: task.id });
        };

        tracing::info!(
            task_id = %task.id,
            site = %site.key,
            attempt = task.attempts,
            max_attempts = self.retry.max_attempts,
            "Task started"
        );

        match self.execute(conn, rows, &task, executor, site) {
            Ok(outcome) => {
                task.status = TaskStatus::Completed;
                task.cursor = outcome.cursor();
                task.last_error.clear();
                self.tasks.update_task(conn, &mut task)?;

                tracing::info!(
                    task_id = %task.id,
                    records_written = outcome.records_written,
                    duplicates_skipped = outcome.duplicates_skipped,
                    needs_review = outcome.needs_review,
                    documents_rejected = outcome.documents_rejected,
                    "Task completed"
                );
                Ok(TaskRun::Completed {
                    task_id: task.id,
                    cursor: task.cursor,
                })
            }
            Err(error) if error.is_permanent() || self.retry.exhausted(task.attempts) => {
                self.fail(conn, task, &error)
            }
            Err(error) => {
                task.status = TaskStatus::Pending;
                task.last_error = error.to_string();
                self.tasks.update_task(conn, &mut task)?;

                let backoff = self.retry.backoff_for(task.attempts);
                tracing::warn!(
                    task_id = %task.id,
                    attempt = task.attempts,
                    backoff_secs = backoff.as_secs(),
                    error = %error,
                    "Task failed, retrying after backoff"
                );
                self.sleeper.sleep(backoff);

                Ok(TaskRun::Retrying {
                    task_id: task.id,
                    attempts: task.attempts,
                    backoff_secs: backoff.as_secs(),
                    error: task.last_error,
                })
            }
        }
    }

    /// Requeue tasks stuck in `running` for longer than `older_than`.
    pub fn recover_stale(
        &self,
        conn: &Connection,
        older_than: Duration,
    ) -> Result<Vec<Task>, QueueError> {
        let age = chrono::Duration::from_std(older_than)
            .map_err(|e| QueueError::InvalidRequest(format!("Stale threshold out of range: {e}")))?;
        let cutoff = format_timestamp(Utc::now() - age);
        self.tasks
            .requeue_stale_running(conn, &cutoff, self.retry.max_attempts)
    }

    fn execute(
        &self,
        conn: &Connection,
        rows: &dyn RowStore,
        task: &Task,
        executor: &dyn SiteExecutor,
        site: &SiteMetadata,
    ) -> Result<PublishOutcome, ExecutionError> {
        let documents = executor.fetch_documents(task)?;
        let batch = self.pipeline.process_documents(&documents, site);

        let summary = self.pipeline.summarize(&batch);
        tracing::debug!(
            task_id = %task.id,
            documents = documents.len(),
            auto_processable = summary.auto_processable,
            manual_review = summary.manual_review,
            average_confidence = summary.average_confidence,
            "Batch verified"
        );

        if !batch.needs_review.is_empty() {
            let items: Vec<_> = batch
                .needs_review
                .iter()
                .map(|processed| create_review_item(Some(task.id.as_str()), processed))
                .collect();
            self.reviews.store_pending(conn, &items)?;
        }

        let outcome = publish(&batch, rows, &self.key)?;
        if !outcome.errors.is_empty() {
            return Err(ExecutionError::Append(outcome.errors.join("; ")));
        }
        Ok(outcome)
    }

    fn fail(
        &self,
        conn: &Connection,
        mut task: Task,
        error: &ExecutionError,
    ) -> Result<TaskRun, QueueError> {
        task.status = TaskStatus::Failed;
        task.last_error = error.to_string();
        self.tasks.update_task(conn, &mut task)?;

        tracing::error!(
            task_id = %task.id,
            site_id = %task.site_id,
            attempts = task.attempts,
            permanent = error.is_permanent(),
            error = %error,
            "Task failed"
        );
        Ok(TaskRun::Failed {
            task_id: task.id,
            attempts: task.attempts,
            error: task.last_error,
        })
    }
}
