//! # Worker Thread Module
//!
//! One OS thread of a [`WorkerPool`](super::pool::WorkerPool).
//!
//! ## Core Algorithm
//! 1. Block on the task queue
//! 2. Hold the task while the pool is paused; it stays `Pending` and can
//!    still be cancelled
//! 3. Cancel the task if shutdown asked for pending work to be dropped,
//!    otherwise claim and run it
//! 4. Repeat until the queue is closed and empty
//!
//! Task errors and panics are caught inside the task itself, so a worker
//! only exits through the loop condition. An exit notice is sent from a drop
//! guard, which also covers an unexpected unwind, so the pool can join
//! workers with a deadline instead of blocking forever.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use flume::Sender;

use crate::log_pool;
use crate::logging::current_subscriber;
use crate::thread::queue::TaskQueue;

/// State shared by the pool and all of its workers.
#[derive(Debug)]
pub(crate) struct PoolShared {
    pub(crate) queue: TaskQueue,
    paused: Mutex<bool>,
    resumed: Condvar,
    pub(crate) cancel_pending: AtomicBool,
    pub(crate) busy: AtomicUsize,
    pub(crate) completed: AtomicU64,
}

impl PoolShared {
    pub(crate) fn new(queue: TaskQueue) -> Self {
        Self {
            queue,
            paused: Mutex::new(false),
            resumed: Condvar::new(),
            cancel_pending: AtomicBool::new(false),
            busy: AtomicUsize::new(0),
            completed: AtomicU64::new(0),
        }
    }

    /// Sets the pause flag. `accept` is checked under the same lock that
    /// shutdown uses to lift the pause, so a late pause cannot strand workers.
    pub(crate) fn set_paused(&self, paused: bool, accept: impl FnOnce() -> bool) -> bool {
        let mut flag = self.paused.lock().unwrap_or_else(PoisonError::into_inner);
        if paused && !accept() {
            return false;
        }
        *flag = paused;
        if !paused {
            self.resumed.notify_all();
        }
        true
    }

    pub(crate) fn is_paused(&self) -> bool {
        *self.paused.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_while_paused(&self) {
        let mut paused = self.paused.lock().unwrap_or_else(PoisonError::into_inner);
        while *paused {
            paused = self
                .resumed
                .wait(paused)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Sends the worker's index when dropped, whether the loop returned or
/// unwound.
struct ExitNotice {
    index: usize,
    exits: Sender<usize>,
}

impl Drop for ExitNotice {
    fn drop(&mut self) {
        let _ = self.exits.send(self.index);
    }
}

/// Handle to a spawned worker thread.
pub(crate) struct Worker {
    index: usize,
    handle: JoinHandle<()>,
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("index", &self.index)
            .field("name", &self.handle.thread().name())
            .field("finished", &self.handle.is_finished())
            .finish()
    }
}

impl Worker {
    /// Spawns worker `index` as a named OS thread. The worker logs through
    /// the subscriber that is current on the spawning thread.
    pub(crate) fn spawn(
        index: usize,
        name_prefix: &str,
        shared: Arc<PoolShared>,
        exits: Sender<usize>,
    ) -> std::io::Result<Self> {
        let dispatch = current_subscriber();
        let handle = thread::Builder::new()
            .name(format!("{name_prefix}-{index}"))
            .spawn(move || {
                let _notice = ExitNotice { index, exits };
                tracing::dispatcher::with_default(&dispatch, || Self::run_loop(index, &shared));
            })?;

        Ok(Self { index, handle })
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }

    /// Joins the thread. Only called once its exit notice arrived, so this
    /// returns promptly. `Err` carries a panic message.
    pub(crate) fn join(self) -> Result<(), String> {
        self.handle
            .join()
            .map_err(|payload| crate::thread::future::panic_message(payload.as_ref()))
    }

    fn run_loop(index: usize, shared: &PoolShared) {
        log_pool!("worker_started", worker = index);

        loop {
            let job = match shared.queue.recv() {
                Ok(job) => job,
                Err(_) => break,
            };

            shared.wait_while_paused();

            if shared.cancel_pending.load(Ordering::SeqCst) {
                log_pool!("task_cancelled_at_shutdown", worker = index, task_id = %job.id());
                job.cancel();
                continue;
            }

            shared.busy.fetch_add(1, Ordering::SeqCst);
            if job.run(index) {
                shared.completed.fetch_add(1, Ordering::SeqCst);
            }
            shared.busy.fetch_sub(1, Ordering::SeqCst);
        }

        log_pool!("worker_exited", worker = index);
    }
}
