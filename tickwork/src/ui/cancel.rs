use std::sync::Arc;

use crate::thread::error::Interrupted;
use crate::ui::state::SharedState;

/// Cooperative cancellation flag.
///
/// The UI thread calls [`cancel`](Self::cancel) when the user aborts; task
/// bodies poll [`check`](Self::check) between units of work and return early.
/// Nothing is ever preempted: a task that never polls runs to completion.
///
/// ```rust
/// use tickwork::CancelToken;
///
/// let token = CancelToken::new();
/// let worker_token = token.clone();
/// let body = move || -> anyhow::Result<u32> {
///     let mut done = 0;
///     for _ in 0..100 {
///         worker_token.check()?;
///         done += 1;
///     }
///     Ok(done)
/// };
///
/// token.cancel();
/// assert!(body().is_err());
/// ```
#[derive(Clone, Debug)]
pub struct CancelToken {
    state: Arc<SharedState<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self::from_state(Arc::new(SharedState::new(false)))
    }

    /// Wraps an existing state, e.g. one bound to a cancel button.
    pub fn from_state(state: Arc<SharedState<bool>>) -> Self {
        Self { state }
    }

    pub fn cancel(&self) {
        self.state.publish(true, true);
    }

    /// Clears the flag so the token can be reused for the next run.
    pub fn reset(&self) {
        self.state.update(false);
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.get()
    }

    pub fn check(&self) -> Result<(), Interrupted> {
        if self.is_cancelled() {
            return Err(Interrupted);
        }
        Ok(())
    }

    pub fn state(&self) -> &Arc<SharedState<bool>> {
        &self.state
    }
}
