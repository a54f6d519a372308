#![doc = " Worker pool, task futures and the thread manager facade."]

pub mod config;
pub mod error;
pub mod future;
pub mod manager;
pub mod pool;
mod queue;
mod task;
mod worker;

// Re-export key types for easier usage
pub use config::{BackpressureStrategy, PoolConfig, ShutdownPolicy};
pub use error::{Interrupted, PoolError};
pub use future::TaskFuture;
pub use manager::{ProgressCallback, ThreadManager};
pub use pool::{PoolMetrics, PoolStatus, WorkerPool};
