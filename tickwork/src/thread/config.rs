use std::time::Duration;

use crate::thread::error::PoolError;

pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_THREAD_NAME_PREFIX: &str = "tickwork-worker";

// --- Configuration Enums ---

/// What `submit` does when a bounded queue is full.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackpressureStrategy {
    /// The submitting thread blocks until a worker frees a slot.
    Block,
    /// `submit` returns `PoolError::QueueFull` immediately.
    Error,
}

/// What happens to queued, not yet started tasks when the pool stops.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownPolicy {
    /// Workers keep running queued tasks until the queue is empty.
    Drain,
    /// Queued tasks move to `Cancelled` without running.
    CancelPending,
}

// --- Pool Configuration ---

/// Configuration for a `WorkerPool` / `ThreadManager`.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Number of worker threads spawned by `start()`.
    pub max_workers: usize,

    /// Maximum number of queued tasks; `None` means unbounded.
    pub queue_capacity: Option<usize>,

    /// Behaviour of `submit` on a full bounded queue.
    pub backpressure: BackpressureStrategy,

    /// Fate of queued tasks at shutdown.
    pub shutdown_policy: ShutdownPolicy,

    /// Upper bound on how long `stop(true)` waits for workers to exit.
    pub shutdown_timeout: Duration,

    /// Worker threads are named `{prefix}-{index}`.
    pub thread_name_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_workers: num_cpus::get().max(1),
            queue_capacity: None,
            backpressure: BackpressureStrategy::Block,
            shutdown_policy: ShutdownPolicy::Drain,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
        }
    }
}

impl PoolConfig {
    /// Default configuration with a fixed number of workers.
    pub fn with_workers(max_workers: usize) -> Self {
        Self {
            max_workers,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), PoolError> {
        if self.max_workers == 0 {
            return Err(PoolError::InvalidConfig(
                "max_workers must be at least 1".to_string(),
            ));
        }
        if self.queue_capacity == Some(0) {
            return Err(PoolError::InvalidConfig(
                "queue_capacity must be at least 1 when bounded".to_string(),
            ));
        }
        if self.thread_name_prefix.contains('\0') {
            return Err(PoolError::InvalidConfig(
                "thread_name_prefix must not contain null bytes".to_string(),
            ));
        }
        Ok(())
    }
}
