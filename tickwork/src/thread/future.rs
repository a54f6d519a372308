//! # Task Futures
//!
//! A [`TaskFuture`] is the submitter's view of a task: it can be polled,
//! blocked on, awaited, cancelled while still queued, and decorated with
//! completion callbacks.
//!
//! ## Thread Safety
//! - All state lives behind one mutex per task; waiters park on a condvar
//! - The mutex is never held while user code (callbacks) runs, so callbacks
//!   may freely query or wait on the future that invoked them
//! - The outcome is stored behind an `Arc` so callbacks can borrow it after
//!   the lock is released
//!
//! ## State Machine
//! `Pending -> Running -> {Done | Failed}` by the executing worker, or
//! `Pending -> Cancelled` through [`TaskFuture::cancel`]. Terminal states are
//! final and callbacks run exactly once.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

use tickwork_api::{CallbackError, TaskError, TaskId, TaskOutcome, TaskState, WaitError};

use crate::log_error;

type DoneCallback<T> = Box<dyn FnOnce(&TaskOutcome<T>) + Send>;

struct Slot<T> {
    state: TaskState,
    outcome: Option<Arc<TaskOutcome<T>>>,
    callbacks: Vec<DoneCallback<T>>,
    wakers: Vec<Waker>,
}

struct Shared<T> {
    id: TaskId,
    slot: Mutex<Slot<T>>,
    finished: Condvar,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle to the eventual outcome of a submitted task.
///
/// Cloning is cheap and every clone observes the same task.
pub struct TaskFuture<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for TaskFuture<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for TaskFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskFuture")
            .field("id", &self.shared.id)
            .field("state", &self.state())
            .finish()
    }
}

impl<T> TaskFuture<T> {
    pub(crate) fn pending(id: TaskId) -> Self {
        Self {
            shared: Arc::new(Shared {
                id,
                slot: Mutex::new(Slot {
                    state: TaskState::Pending,
                    outcome: None,
                    callbacks: Vec::new(),
                    wakers: Vec::new(),
                }),
                finished: Condvar::new(),
            }),
        }
    }

    pub fn id(&self) -> TaskId {
        self.shared.id
    }

    pub fn state(&self) -> TaskState {
        self.shared.lock().state
    }

    /// True once the task reached `Done`, `Failed` or `Cancelled`.
    pub fn done(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn cancelled(&self) -> bool {
        self.state() == TaskState::Cancelled
    }

    pub fn running(&self) -> bool {
        self.state() == TaskState::Running
    }

    /// The captured error, if the task ended `Failed` or `Cancelled`.
    pub fn error(&self) -> Option<TaskError> {
        let slot = self.shared.lock();
        slot.outcome
            .as_deref()
            .and_then(|outcome| outcome.as_ref().err().cloned())
    }

    /// Cancels the task if no worker has claimed it yet.
    ///
    /// Returns `false` when the task is already running or finished; a
    /// running task can only be stopped cooperatively through a `CancelToken`.
    pub fn cancel(&self) -> bool {
        let slot = self.shared.lock();
        if slot.state != TaskState::Pending {
            return false;
        }
        self.finish(slot, TaskState::Cancelled, Err(TaskError::Cancelled));
        true
    }

    /// Registers `callback` to run once the task is terminal.
    ///
    /// If the task already finished the callback runs right away on the
    /// calling thread, before this method returns. Otherwise it runs on the
    /// thread that finishes the task, after earlier registrations. A panicking
    /// callback is logged and does not disturb the others.
    pub fn add_done_callback<F>(&self, callback: F)
    where
        F: FnOnce(&TaskOutcome<T>) + Send + 'static,
    {
        let mut slot = self.shared.lock();
        let Some(outcome) = slot.outcome.clone() else {
            slot.callbacks.push(Box::new(callback));
            return;
        };
        drop(slot);
        let callback: DoneCallback<T> = Box::new(callback);
        run_callbacks(self.shared.id, vec![callback], &outcome);
    }

    /// Blocks until the task is terminal and returns the final state.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<TaskState, WaitError> {
        self.wait_outcome(timeout)?;
        Ok(self.state())
    }

    /// Blocks until the task is terminal and returns its value, or re-raises
    /// the captured error.
    pub fn result(&self, timeout: Option<Duration>) -> Result<T, WaitError>
    where
        T: Clone,
    {
        let outcome = self.wait_outcome(timeout)?;
        match &*outcome {
            Ok(value) => Ok(value.clone()),
            Err(error) => Err(WaitError::Task(error.clone())),
        }
    }

    fn wait_outcome(&self, timeout: Option<Duration>) -> Result<Arc<TaskOutcome<T>>, WaitError> {
        let deadline = timeout.map(|limit| (limit, Instant::now() + limit));
        let mut slot = self.shared.lock();

        loop {
            if let Some(outcome) = &slot.outcome {
                return Ok(Arc::clone(outcome));
            }

            slot = match deadline {
                None => self
                    .shared
                    .finished
                    .wait(slot)
                    .unwrap_or_else(PoisonError::into_inner),
                Some((limit, deadline)) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(WaitError::Timeout(limit));
                    }
                    self.shared
                        .finished
                        .wait_timeout(slot, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    /// Pending -> Running. Fails if the task was cancelled first.
    pub(crate) fn try_claim(&self) -> bool {
        let mut slot = self.shared.lock();
        if slot.state != TaskState::Pending {
            return false;
        }
        slot.state = TaskState::Running;
        true
    }

    /// Running -> Done/Failed with the worker's outcome.
    pub(crate) fn complete(&self, outcome: TaskOutcome<T>) {
        let slot = self.shared.lock();
        if slot.state.is_terminal() {
            return;
        }
        let state = match &outcome {
            Ok(_) => TaskState::Done,
            Err(_) => TaskState::Failed,
        };
        self.finish(slot, state, outcome);
    }

    fn finish(&self, mut slot: MutexGuard<'_, Slot<T>>, state: TaskState, outcome: TaskOutcome<T>) {
        let outcome = Arc::new(outcome);
        slot.state = state;
        slot.outcome = Some(Arc::clone(&outcome));
        let callbacks = std::mem::take(&mut slot.callbacks);
        let wakers = std::mem::take(&mut slot.wakers);
        drop(slot);

        self.shared.finished.notify_all();
        for waker in wakers {
            waker.wake();
        }
        run_callbacks(self.shared.id, callbacks, &outcome);
    }
}

impl<T: Clone> Future for TaskFuture<T> {
    type Output = TaskOutcome<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.shared.lock();
        if let Some(outcome) = &slot.outcome {
            return Poll::Ready((**outcome).clone());
        }
        if !slot.wakers.iter().any(|waker| waker.will_wake(cx.waker())) {
            slot.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

fn run_callbacks<T>(id: TaskId, callbacks: Vec<DoneCallback<T>>, outcome: &TaskOutcome<T>) {
    for callback in callbacks {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(outcome))) {
            let error = CallbackError {
                task_id: id,
                message: panic_message(payload.as_ref()),
            };
            log_error!(error, task_id = %id);
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "Unknown panic".to_string()
    }
}
