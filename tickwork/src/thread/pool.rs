use std::collections::HashMap;
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use flume::{Receiver, Sender};
use tracing::{error, info, warn};

use crate::log_pool;
use crate::thread::config::{PoolConfig, ShutdownPolicy};
use crate::thread::error::PoolError;
use crate::thread::future::TaskFuture;
use crate::thread::queue::TaskQueue;
use crate::thread::task::Task;
use crate::thread::worker::{PoolShared, Worker};

/// Lifecycle of a worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolStatus {
    /// Created, no worker threads yet
    Idle = 0,

    /// Workers are running and the queue accepts tasks
    Running = 1,

    /// The queue is closed; workers are finishing
    ShuttingDown = 2,

    /// Every worker was joined or abandoned
    Stopped = 3,
}

impl PoolStatus {
    fn from_usize(value: usize) -> Self {
        match value {
            0 => PoolStatus::Idle,
            1 => PoolStatus::Running,
            2 => PoolStatus::ShuttingDown,
            _ => PoolStatus::Stopped,
        }
    }
}

/// Point-in-time view of a pool.
#[derive(Debug, Clone)]
pub struct PoolMetrics {
    /// Number of live worker threads
    pub pool_size: usize,

    /// Tasks queued and not yet claimed
    pub queue_length: usize,

    /// `None` for an unbounded queue
    pub queue_capacity: Option<usize>,

    /// Workers currently executing a task
    pub busy_workers: usize,

    /// Tasks that ran to a terminal state since the pool was created
    pub completed_tasks: u64,

    pub status: PoolStatus,

    pub paused: bool,
}

/// Fixed-size pool of OS worker threads pulling tasks from one FIFO queue.
///
/// # Lifecycle
/// `start()` (or the first `submit()`) spawns `max_workers` threads.
/// `stop()` is the only shutdown path: it closes the queue, lets queued tasks
/// drain or cancels them according to [`ShutdownPolicy`], and joins every
/// worker within `shutdown_timeout`. Calling it again is a no-op.
///
/// # Misuse Hazard
/// `stop(true)` blocks the caller. If a running task is itself waiting on
/// something only the calling thread can provide (typically UI-thread
/// state), that task cannot finish; the join deadline bounds the wait and the
/// worker is reported as abandoned.
pub struct WorkerPool {
    config: PoolConfig,
    shared: Arc<PoolShared>,
    status: AtomicUsize,
    workers: Mutex<Vec<Worker>>,
    exits: (Sender<usize>, Receiver<usize>),
    lifecycle: Mutex<()>,
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("max_workers", &self.config.max_workers)
            .field("status", &self.status())
            .field("queue", &self.shared.queue)
            .finish()
    }
}

impl WorkerPool {
    /// Creates a pool without spawning any threads.
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;
        let queue = TaskQueue::new(config.queue_capacity, config.backpressure);

        Ok(Self {
            shared: Arc::new(PoolShared::new(queue)),
            status: AtomicUsize::new(PoolStatus::Idle as usize),
            workers: Mutex::new(Vec::with_capacity(config.max_workers)),
            exits: flume::unbounded(),
            lifecycle: Mutex::new(()),
            config,
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn status(&self) -> PoolStatus {
        PoolStatus::from_usize(self.status.load(Ordering::SeqCst))
    }

    fn set_status(&self, status: PoolStatus) {
        self.status.store(status as usize, Ordering::SeqCst);
    }

    fn lock_lifecycle(&self) -> MutexGuard<'_, ()> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_workers(&self) -> MutexGuard<'_, Vec<Worker>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawns the worker threads. A no-op when already running.
    pub fn start(&self) -> Result<(), PoolError> {
        let _lifecycle = self.lock_lifecycle();
        match self.status() {
            PoolStatus::Running => return Ok(()),
            PoolStatus::ShuttingDown | PoolStatus::Stopped => return Err(PoolError::Closed),
            PoolStatus::Idle => {}
        }

        let mut workers = self.lock_workers();
        for index in 0..self.config.max_workers {
            match Worker::spawn(
                index,
                &self.config.thread_name_prefix,
                Arc::clone(&self.shared),
                self.exits.0.clone(),
            ) {
                Ok(worker) => workers.push(worker),
                Err(spawn_error) if workers.is_empty() => {
                    return Err(PoolError::SpawnFailed(spawn_error.to_string()));
                }
                Err(spawn_error) => {
                    warn!(
                        spawned = workers.len(),
                        requested = self.config.max_workers,
                        error = %spawn_error,
                        "running with fewer workers than configured"
                    );
                    break;
                }
            }
        }

        self.set_status(PoolStatus::Running);
        info!(workers = workers.len(), "worker pool started");
        Ok(())
    }

    /// Queues `callable` and returns its future without waiting.
    ///
    /// Starts the pool on first use. Fails with `PoolError::Closed` once
    /// `stop()` has begun, and with `PoolError::QueueFull` when a bounded
    /// queue is full under `BackpressureStrategy::Error`.
    pub fn submit<T, F>(&self, callable: F) -> Result<TaskFuture<T>, PoolError>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        if self.status() == PoolStatus::Idle {
            self.start()?;
        }

        let (task, future) = Task::new(callable);
        self.shared.queue.push(Box::new(task))?;
        log_pool!("task_queued", task_id = %future.id());
        Ok(future)
    }

    /// Stops claiming new tasks after the current ones finish.
    ///
    /// Ignored once shutdown has begun. Returns whether the pool is now paused.
    pub fn pause(&self) -> bool {
        let paused = self
            .shared
            .set_paused(true, || matches!(self.status(), PoolStatus::Idle | PoolStatus::Running));
        if paused {
            log_pool!("paused");
        }
        paused
    }

    pub fn resume(&self) {
        self.shared.set_paused(false, || true);
        log_pool!("resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.shared.is_paused()
    }

    /// Shuts the pool down.
    ///
    /// Marks the pool non-accepting, lifts any pause and closes the queue so
    /// idle workers wake up. Queued tasks run to completion under
    /// `ShutdownPolicy::Drain` or are cancelled under
    /// `ShutdownPolicy::CancelPending`. With `wait`, blocks until every worker
    /// exited or `shutdown_timeout` passed; late workers are abandoned and
    /// reported through `PoolError::ShutdownTimeout`.
    ///
    /// Idempotent: once stopped, further calls return `Ok(())`. A
    /// `stop(false)` may be followed by `stop(true)` to join the workers.
    pub fn stop(&self, wait: bool) -> Result<(), PoolError> {
        let _lifecycle = self.lock_lifecycle();

        match self.status() {
            PoolStatus::Stopped => return Ok(()),
            PoolStatus::Idle => {
                self.shared.queue.close();
                self.set_status(PoolStatus::Stopped);
                return Ok(());
            }
            PoolStatus::Running => self.begin_shutdown(),
            PoolStatus::ShuttingDown => {}
        }

        if !wait {
            return Ok(());
        }

        let result = self.join_workers();
        self.set_status(PoolStatus::Stopped);
        info!(completed = self.shared.completed.load(Ordering::SeqCst), "worker pool stopped");
        result
    }

    fn begin_shutdown(&self) {
        self.set_status(PoolStatus::ShuttingDown);
        let cancel_pending = self.config.shutdown_policy == ShutdownPolicy::CancelPending;
        // Set before lifting the pause so tasks held by paused workers are cancelled too.
        self.shared.cancel_pending.store(cancel_pending, Ordering::SeqCst);
        self.shared.set_paused(false, || true);

        if cancel_pending {
            let dropped = self.shared.queue.drain();
            log_pool!("pending_cancelled", count = dropped.len());
            for job in dropped {
                job.cancel();
            }
        }

        self.shared.queue.close();
        log_pool!("shutdown_started", queued = self.shared.queue.len());
    }

    fn join_workers(&self) -> Result<(), PoolError> {
        let workers = mem::take(&mut *self.lock_workers());
        let mut pending: HashMap<usize, Worker> = workers
            .into_iter()
            .map(|worker| (worker.index(), worker))
            .collect();
        let deadline = Instant::now() + self.config.shutdown_timeout;

        while !pending.is_empty() {
            let Ok(index) = self.exits.1.recv_deadline(deadline) else {
                break;
            };
            if let Some(worker) = pending.remove(&index) {
                if let Err(panic) = worker.join() {
                    error!(worker = index, panic = %panic, "worker thread panicked");
                }
            }
        }

        if pending.is_empty() {
            return Ok(());
        }

        let error = PoolError::ShutdownTimeout {
            abandoned: pending.len(),
            timeout: self.config.shutdown_timeout,
        };
        error!(
            abandoned = pending.len(),
            workers = ?pending.keys().collect::<Vec<_>>(),
            "{}",
            error
        );
        Err(error)
    }

    pub fn metrics(&self) -> PoolMetrics {
        PoolMetrics {
            pool_size: self.lock_workers().len(),
            queue_length: self.shared.queue.len(),
            queue_capacity: self.shared.queue.capacity(),
            busy_workers: self.shared.busy.load(Ordering::SeqCst),
            completed_tasks: self.shared.completed.load(Ordering::SeqCst),
            status: self.status(),
            paused: self.is_paused(),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Workers hold the queue through `PoolShared`; closing it lets them exit.
        if let Err(stop_error) = self.stop(false) {
            warn!(error = %stop_error, "worker pool dropped while stopping");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_round_trip() {
        for status in [
            PoolStatus::Idle,
            PoolStatus::Running,
            PoolStatus::ShuttingDown,
            PoolStatus::Stopped,
        ] {
            assert_eq!(PoolStatus::from_usize(status as usize), status);
        }
    }

    #[test]
    fn test_rejects_invalid_config() {
        assert!(matches!(
            WorkerPool::new(PoolConfig::with_workers(0)),
            Err(PoolError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_start_is_idempotent() {
        let pool = WorkerPool::new(PoolConfig::with_workers(2)).unwrap();
        assert_eq!(pool.status(), PoolStatus::Idle);

        pool.start().unwrap();
        pool.start().unwrap();
        assert_eq!(pool.metrics().pool_size, 2);
        assert_eq!(pool.status(), PoolStatus::Running);

        pool.stop(true).unwrap();
        assert_eq!(pool.status(), PoolStatus::Stopped);
        assert!(matches!(pool.start(), Err(PoolError::Closed)));
    }

    #[test]
    fn test_stop_without_start() {
        let pool = WorkerPool::new(PoolConfig::with_workers(1)).unwrap();
        pool.stop(true).unwrap();

        assert_eq!(pool.status(), PoolStatus::Stopped);
        assert!(matches!(pool.submit(|| Ok(())), Err(PoolError::Closed)));
    }

    #[test]
    fn test_abandons_worker_past_deadline() {
        let config = PoolConfig {
            max_workers: 1,
            shutdown_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let pool = WorkerPool::new(config).unwrap();
        let (release_tx, release_rx) = flume::bounded::<()>(1);
        let (started_tx, started_rx) = flume::bounded::<()>(1);

        let future = pool
            .submit(move || {
                started_tx.send(()).ok();
                release_rx.recv().ok();
                Ok(())
            })
            .unwrap();
        started_rx.recv().unwrap();

        match pool.stop(true) {
            Err(PoolError::ShutdownTimeout { abandoned, .. }) => assert_eq!(abandoned, 1),
            other => panic!("unexpected stop result: {other:?}"),
        }
        assert_eq!(pool.status(), PoolStatus::Stopped);
        assert!(pool.stop(true).is_ok());

        release_tx.send(()).unwrap();
        assert!(future.wait(Some(Duration::from_secs(5))).is_ok());
    }
}
