//! # Thread Manager
//!
//! Application-facing facade over one [`WorkerPool`]. Adds batch submission
//! with progress reporting and keeps track of submitted futures so pending
//! work can be cancelled in bulk.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::thread::config::PoolConfig;
use crate::thread::error::PoolError;
use crate::thread::future::TaskFuture;
use crate::thread::pool::{PoolMetrics, WorkerPool};

/// Receives `(completed, total)` after each task of a batch resolves.
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Object-safe view of a future, independent of its value type.
trait Cancellable: Send {
    fn cancel(&self) -> bool;
    fn is_done(&self) -> bool;
}

impl<T: Send + Sync + 'static> Cancellable for TaskFuture<T> {
    fn cancel(&self) -> bool {
        TaskFuture::cancel(self)
    }

    fn is_done(&self) -> bool {
        self.done()
    }
}

/// Completion counter shared by every task of one batch.
///
/// The callback never runs under the lock: it may resolve sibling futures
/// (for example through `cancel_all`), whose completions re-enter `advance`
/// on the same thread. Counts are queued in order and delivered by whichever
/// thread is not already delivering, so observers see `1..=total` in order.
struct BatchProgress {
    delivery: Mutex<Delivery>,
    total: usize,
    callback: ProgressCallback,
}

#[derive(Default)]
struct Delivery {
    completed: usize,
    pending: VecDeque<usize>,
    delivering: bool,
}

/// Releases the delivery role even if the callback unwinds.
struct DeliveryRole<'a>(&'a BatchProgress);

impl Drop for DeliveryRole<'_> {
    fn drop(&mut self) {
        self.0.lock().delivering = false;
    }
}

impl BatchProgress {
    fn new(total: usize, callback: ProgressCallback) -> Self {
        Self {
            delivery: Mutex::new(Delivery::default()),
            total,
            callback,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Delivery> {
        self.delivery.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn advance(&self) {
        {
            let mut delivery = self.lock();
            delivery.completed += 1;
            let completed = delivery.completed;
            delivery.pending.push_back(completed);
            if delivery.delivering {
                return;
            }
            delivery.delivering = true;
        }

        let _role = DeliveryRole(self);
        loop {
            let Some(completed) = self.lock().pending.pop_front() else {
                break;
            };
            (self.callback)(completed, self.total);
        }
    }
}

/// Owns a worker pool and the futures submitted through it.
///
/// # Example
/// ```rust
/// use tickwork::{PoolConfig, ThreadManager};
///
/// let manager = ThreadManager::new(PoolConfig::with_workers(2)).unwrap();
/// let future = manager.submit(|| Ok(6 * 7)).unwrap();
/// assert_eq!(future.result(None).unwrap(), 42);
/// manager.stop(true).unwrap();
/// ```
pub struct ThreadManager {
    pool: WorkerPool,
    tracked: Mutex<Vec<Box<dyn Cancellable>>>,
}

impl fmt::Debug for ThreadManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadManager")
            .field("pool", &self.pool)
            .field("tracked", &self.lock_tracked().len())
            .finish()
    }
}

impl ThreadManager {
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        Ok(Self {
            pool: WorkerPool::new(config)?,
            tracked: Mutex::new(Vec::new()),
        })
    }

    fn lock_tracked(&self) -> MutexGuard<'_, Vec<Box<dyn Cancellable>>> {
        self.tracked.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn max_workers(&self) -> usize {
        self.pool.config().max_workers
    }

    pub fn start(&self) -> Result<(), PoolError> {
        self.pool.start()
    }

    /// Submits one task. See [`WorkerPool::submit`].
    pub fn submit<T, F>(&self, callable: F) -> Result<TaskFuture<T>, PoolError>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        let future = self.pool.submit(callable)?;
        self.track(future.clone());
        Ok(future)
    }

    fn track<T: Send + Sync + 'static>(&self, future: TaskFuture<T>) {
        let mut tracked = self.lock_tracked();
        tracked.retain(|entry| !entry.is_done());
        tracked.push(Box::new(future));
    }

    /// Submits `func(item)` for every item and returns the futures in item
    /// order.
    ///
    /// `progress` receives `(completed, total)` once per resolved task,
    /// whether it succeeded, failed or was cancelled. It is called on the
    /// thread that resolved the task, so code that touches widgets should
    /// publish through a `SharedState` (see `ProgressReporter`) or post to a
    /// `UiDispatcher`.
    ///
    /// If a submission fails part way, the tasks already queued are cancelled
    /// and the error is returned. Progress is only reported for batches that
    /// were fully submitted.
    pub fn process_batch<I, T, F>(
        &self,
        func: F,
        items: impl IntoIterator<Item = I>,
        progress: Option<ProgressCallback>,
    ) -> Result<Vec<TaskFuture<T>>, PoolError>
    where
        I: Send + 'static,
        T: Send + Sync + 'static,
        F: Fn(I) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let items: Vec<I> = items.into_iter().collect();
        let total = items.len();
        let func = Arc::new(func);

        debug!(total, "submitting batch");
        let mut futures = Vec::with_capacity(total);
        for item in items {
            let func = Arc::clone(&func);
            match self.submit(move || (*func)(item)) {
                Ok(future) => futures.push(future),
                Err(submit_error) => {
                    let cancelled = futures.iter().filter(|future| future.cancel()).count();
                    warn!(
                        submitted = futures.len(),
                        cancelled,
                        total,
                        error = %submit_error,
                        "batch submission failed"
                    );
                    return Err(submit_error);
                }
            }
        }

        if let Some(callback) = progress {
            let progress = Arc::new(BatchProgress::new(total, callback));
            for future in &futures {
                let progress = Arc::clone(&progress);
                future.add_done_callback(move |_| progress.advance());
            }
        }
        Ok(futures)
    }

    /// Workers finish their current task and then wait.
    pub fn pause(&self) -> bool {
        self.pool.pause()
    }

    pub fn resume(&self) {
        self.pool.resume()
    }

    pub fn is_paused(&self) -> bool {
        self.pool.is_paused()
    }

    /// Cancels every tracked future that no worker has claimed yet. Returns
    /// how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let tracked = std::mem::take(&mut *self.lock_tracked());
        let cancelled = tracked.iter().filter(|future| future.cancel()).count();

        let mut remaining = self.lock_tracked();
        remaining.extend(tracked.into_iter().filter(|future| !future.is_done()));
        drop(remaining);

        info!(cancelled, "cancelled pending tasks");
        cancelled
    }

    /// See [`WorkerPool::stop`].
    pub fn stop(&self, wait: bool) -> Result<(), PoolError> {
        let result = self.pool.stop(wait);
        if wait {
            self.lock_tracked().retain(|entry| !entry.is_done());
        }
        result
    }

    pub fn metrics(&self) -> PoolMetrics {
        self.pool.metrics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tickwork_api::TaskState;

    #[test]
    fn test_batch_progress_is_serialized() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let progress = BatchProgress::new(
            3,
            Arc::new(move |done: usize, total: usize| sink.lock().unwrap().push((done, total))),
        );

        progress.advance();
        progress.advance();
        progress.advance();
        assert_eq!(*seen.lock().unwrap(), vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[test]
    fn test_tracking_prunes_finished_futures() {
        let manager = ThreadManager::new(PoolConfig::with_workers(1)).unwrap();
        let first = manager.submit(|| Ok(1)).unwrap();
        first.wait(Some(Duration::from_secs(5))).unwrap();

        let second = manager.submit(|| Ok(2)).unwrap();
        second.wait(Some(Duration::from_secs(5))).unwrap();
        assert!(manager.lock_tracked().len() <= 1);

        manager.stop(true).unwrap();
        assert!(manager.lock_tracked().is_empty());
    }

    #[test]
    fn test_empty_batch() {
        let manager = ThreadManager::new(PoolConfig::with_workers(1)).unwrap();
        let futures = manager
            .process_batch(|item: u32| Ok(item), Vec::new(), None)
            .unwrap();

        assert!(futures.is_empty());
        manager.stop(true).unwrap();
    }

    #[test]
    fn test_cancel_all_leaves_running_task() {
        let manager = ThreadManager::new(PoolConfig::with_workers(1)).unwrap();
        let (release_tx, release_rx) = flume::bounded::<()>(1);
        let (started_tx, started_rx) = flume::bounded::<()>(1);

        let running = manager
            .submit(move || {
                started_tx.send(()).ok();
                release_rx.recv().ok();
                Ok(())
            })
            .unwrap();
        started_rx.recv().unwrap();
        let queued = manager.submit(|| Ok(())).unwrap();

        assert_eq!(manager.cancel_all(), 1);
        assert_eq!(queued.state(), TaskState::Cancelled);
        assert_eq!(running.state(), TaskState::Running);

        release_tx.send(()).unwrap();
        assert_eq!(running.wait(Some(Duration::from_secs(5))).unwrap(), TaskState::Done);
        manager.stop(true).unwrap();
    }
}
