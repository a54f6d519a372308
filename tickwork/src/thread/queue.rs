use std::fmt;
use std::sync::{Mutex, PoisonError};

use flume::{Receiver, RecvError, Sender, TrySendError};

use crate::thread::config::BackpressureStrategy;
use crate::thread::error::PoolError;
use crate::thread::task::BoxedJob;

/// FIFO queue of tasks shared by every worker of a pool.
///
/// Built on a flume channel: bounded when a capacity is configured, otherwise
/// unbounded. Closing drops the pool's sender, after which workers still
/// receive every queued task and then see the channel disconnect.
///
/// # Thread Safety
/// - Any thread may push; every worker holds a receiver clone
/// - The sender sits behind a mutex only so `close` can take it; the lock is
///   released before a blocking send
pub(crate) struct TaskQueue {
    sender: Mutex<Option<Sender<BoxedJob>>>,
    receiver: Receiver<BoxedJob>,
    capacity: Option<usize>,
    backpressure: BackpressureStrategy,
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("capacity", &self.capacity)
            .field("backpressure", &self.backpressure)
            .field("len", &self.receiver.len())
            .finish()
    }
}

impl TaskQueue {
    pub(crate) fn new(capacity: Option<usize>, backpressure: BackpressureStrategy) -> Self {
        let (sender, receiver) = match capacity {
            Some(capacity) => flume::bounded(capacity),
            None => flume::unbounded(),
        };

        Self {
            sender: Mutex::new(Some(sender)),
            receiver,
            capacity,
            backpressure,
        }
    }

    /// Enqueues a task, applying the configured backpressure strategy when
    /// the queue is bounded and full.
    pub(crate) fn push(&self, job: BoxedJob) -> Result<(), PoolError> {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(PoolError::Closed)?;

        match self.backpressure {
            BackpressureStrategy::Block => sender.send(job).map_err(|_| PoolError::Closed),
            BackpressureStrategy::Error => sender.try_send(job).map_err(|error| match error {
                TrySendError::Full(_) => PoolError::QueueFull {
                    capacity: self.capacity.unwrap_or_default(),
                },
                TrySendError::Disconnected(_) => PoolError::Closed,
            }),
        }
    }

    /// Blocks until a task is available. Fails once the queue is closed and
    /// fully drained.
    pub(crate) fn recv(&self) -> Result<BoxedJob, RecvError> {
        self.receiver.recv()
    }

    /// Removes every task currently queued without running it.
    pub(crate) fn drain(&self) -> Vec<BoxedJob> {
        self.receiver.drain().collect()
    }

    /// Stops accepting tasks. Returns `false` if already closed.
    pub(crate) fn close(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.receiver.len()
    }

    pub(crate) fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}
