use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tickwork_api::{TaskError, TaskId};
use tracing::warn;

use crate::task_span;
use crate::thread::future::{panic_message, TaskFuture};

/// Type-erased unit of work travelling through the task queue.
pub(crate) trait Job: Send {
    fn id(&self) -> TaskId;

    /// Claims and executes the task. Returns `false` if it had already been
    /// cancelled and was skipped.
    fn run(self: Box<Self>, worker: usize) -> bool;

    /// Moves a still-queued task to `Cancelled` without running it.
    fn cancel(self: Box<Self>);
}

pub(crate) type BoxedJob = Box<dyn Job>;

/// A callable paired with the future that will carry its outcome.
pub(crate) struct Task<T, F> {
    id: TaskId,
    callable: F,
    future: TaskFuture<T>,
}

impl<T, F> Task<T, F>
where
    T: Send + Sync + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    pub(crate) fn new(callable: F) -> (Self, TaskFuture<T>) {
        let id = TaskId::new();
        let future = TaskFuture::pending(id);
        let task = Self {
            id,
            callable,
            future: future.clone(),
        };
        (task, future)
    }
}

impl<T, F> Job for Task<T, F>
where
    T: Send + Sync + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    fn id(&self) -> TaskId {
        self.id
    }

    fn run(self: Box<Self>, worker: usize) -> bool {
        let Task { id, callable, future } = *self;
        if !future.try_claim() {
            return false;
        }

        let outcome = {
            let span = task_span!(id, worker = worker);
            let _guard = span.enter();

            match panic::catch_unwind(AssertUnwindSafe(callable)) {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(error)) => {
                    warn!(task_id = %id, error = %format!("{error:#}"), "task failed");
                    Err(TaskError::Failed(Arc::new(error)))
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    warn!(task_id = %id, panic = %message, "task panicked");
                    Err(TaskError::Panicked(message))
                }
            }
        };

        future.complete(outcome);
        true
    }

    fn cancel(self: Box<Self>) {
        self.future.cancel();
    }
}
