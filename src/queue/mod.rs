//! Durable scrape-job queue and the worker that executes it.
//!
//! State machine: pending → running → {completed | pending (retry) | failed}.

pub mod api;
pub mod error;
pub mod executor;
pub mod store;
pub mod traits;
pub mod types;
pub mod worker;

pub use api::{enqueue, list_tasks};
pub use error::{ExecutionError, QueueError};
pub use executor::{ExecutorRegistry, JsonDocumentExecutor};
pub use store::SqliteTaskStore;
pub use traits::{SiteExecutor, Sleeper, TaskStore, ThreadSleeper};
pub use types::*;
pub use worker::Worker;
