// Tickwork
//
// Background work for frame-driven UI hosts: a worker pool with task
// futures, and the shared-state plumbing that carries results back to a
// single UI thread on its next tick.

pub mod logging;
pub mod thread;
pub mod ui;

#[doc(hidden)]
pub use tracing as __tracing;

// Re-export commonly used types
pub use thread::{
    BackpressureStrategy, Interrupted, PoolConfig, PoolError, PoolMetrics, PoolStatus,
    ProgressCallback, ShutdownPolicy, TaskFuture, ThreadManager, WorkerPool,
};
pub use tickwork_api::{
    CallbackError, RedrawHost, TaskError, TaskId, TaskOutcome, TaskState, WaitError, Widget,
};
pub use ui::{
    board, CancelToken, Label, Progress, ProgressBar, ProgressReporter, RedrawFlag, SharedState,
    Snapshot, ThrottleConfig, ThrottleGate, TickReport, UiDispatcher, UiLoop, UiTick,
};
