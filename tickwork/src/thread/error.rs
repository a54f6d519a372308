use std::time::Duration;

use thiserror::Error;

/// Errors related to the worker pool itself.
///
/// Failures of individual tasks never show up here; they are carried by the
/// task's own future as a `TaskError`.
#[derive(Error, Debug, Clone)]
pub enum PoolError {
    #[error("Worker pool is closed")]
    Closed,
    #[error("Task queue is full (capacity: {capacity})")]
    QueueFull { capacity: usize },
    #[error("Failed to spawn worker thread: {0}")]
    SpawnFailed(String),
    #[error("{abandoned} worker thread(s) did not exit within {timeout:?} and were abandoned")]
    ShutdownTimeout { abandoned: usize, timeout: Duration },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Returned by `CancelToken::check` once cancellation has been requested.
///
/// Lets a task body bail out with `?`; the task's future then ends `Failed`
/// with this error available through `TaskError::downcast_ref`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Task interrupted by cancellation")]
pub struct Interrupted;
