//! # Task Error Types
//!
//! Errors that travel with a task outcome or surface from waiting on one.
//!
//! ## Design Philosophy
//!
//! - Isolation: a failing task only ever affects its own future
//! - Shareability: every error is `Clone` so each handle to a future can
//!   observe the same failure
//! - Two channels: failures are reported through these types, while
//!   cooperative cancellation of a running task is a polled flag
//!
//! ## Usage Example
//!
//! ```rust
//! use tickwork_api::errors::{TaskError, WaitError};
//!
//! fn describe(error: &WaitError) -> String {
//!     match error {
//!         WaitError::Timeout(after) => format!("still running after {after:?}"),
//!         WaitError::Task(TaskError::Cancelled) => "cancelled".to_string(),
//!         WaitError::Task(other) => other.to_string(),
//!     }
//! }
//! ```

use std::fmt::{Debug, Display};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::types::TaskId;

/// Why a task did not produce a value.
#[derive(Error, Debug, Clone)]
pub enum TaskError {
    /// The task body returned an error.
    #[error("Task failed: {0:#}")]
    Failed(Arc<anyhow::Error>),

    /// The task body panicked; the payload message is preserved.
    #[error("Task panicked: {0}")]
    Panicked(String),

    /// The task was cancelled while still queued and never ran.
    #[error("Task was cancelled before it started")]
    Cancelled,
}

impl TaskError {
    /// Wraps an arbitrary error returned by a task body.
    pub fn failed(error: impl Into<anyhow::Error>) -> Self {
        TaskError::Failed(Arc::new(error.into()))
    }

    /// Looks for a concrete error type inside a `Failed` outcome.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: Display + Debug + Send + Sync + 'static,
    {
        match self {
            TaskError::Failed(error) => error.downcast_ref::<E>(),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskError::Cancelled)
    }
}

/// Errors from blocking on a future.
#[derive(Error, Debug, Clone)]
pub enum WaitError {
    #[error("Timed out after {0:?} waiting for task")]
    Timeout(Duration),

    #[error(transparent)]
    Task(#[from] TaskError),
}

/// A completion callback panicked.
///
/// Never returned to callers; it is logged by whichever thread ran the
/// callback and the remaining callbacks still run.
#[derive(Error, Debug, Clone)]
#[error("Completion callback for task {task_id} panicked: {message}")]
pub struct CallbackError {
    pub task_id: TaskId,
    pub message: String,
}
