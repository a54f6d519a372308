use std::sync::Arc;

use tickwork_api::RedrawHost;

use crate::thread::manager::ProgressCallback;
use crate::ui::state::SharedState;
use crate::ui::throttle::ThrottleConfig;

/// Value shown by a progress bar.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub current: f64,
    pub max: f64,
    pub text: String,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            current: 0.0,
            max: 100.0,
            text: String::new(),
        }
    }
}

impl Progress {
    pub fn new(current: f64, max: f64, text: impl Into<String>) -> Self {
        Self {
            current,
            max,
            text: text.into(),
        }
    }

    /// Share of work done, clamped to `[0, 1]`; 0 when `max` is not positive.
    pub fn fraction(&self) -> f64 {
        if self.max <= 0.0 || self.current.is_nan() {
            return 0.0;
        }
        (self.current / self.max).clamp(0.0, 1.0)
    }

    pub fn percent(&self) -> u32 {
        (self.fraction() * 100.0).round() as u32
    }

    pub fn is_complete(&self) -> bool {
        self.current >= self.max
    }
}

/// Publishes batch progress into a `SharedState<Progress>`.
///
/// ```rust
/// use std::sync::Arc;
/// use tickwork::{ProgressReporter, RedrawFlag};
///
/// let reporter = ProgressReporter::with_host(Arc::new(RedrawFlag::new()));
/// let callback = reporter.callback();
/// callback(3, 4);
/// assert_eq!(reporter.state().get().percent(), 75);
/// ```
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    state: Arc<SharedState<Progress>>,
}

impl ProgressReporter {
    pub fn new(state: Arc<SharedState<Progress>>) -> Self {
        Self { state }
    }

    /// A fresh state throttled for progress bars and wired to `host`.
    pub fn with_host(host: Arc<dyn RedrawHost>) -> Self {
        Self::new(Arc::new(
            SharedState::new(Progress::default())
                .with_host(host)
                .with_throttle(ThrottleConfig::progress()),
        ))
    }

    pub fn state(&self) -> &Arc<SharedState<Progress>> {
        &self.state
    }

    /// Records `done` of `total`. The final report always reaches the host.
    pub fn report(&self, done: usize, total: usize) {
        let complete = done >= total;
        self.state.publish_with(complete, |progress| {
            progress.current = done as f64;
            progress.max = total as f64;
        });
    }

    pub fn set_text(&self, text: impl Into<String>) {
        let text = text.into();
        self.state.modify(move |progress| progress.text = text);
    }

    /// Adapter for `ThreadManager::process_batch`.
    pub fn callback(&self) -> ProgressCallback {
        let reporter = self.clone();
        Arc::new(move |done: usize, total: usize| reporter.report(done, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_is_clamped() {
        assert_eq!(Progress::new(50.0, 100.0, "").fraction(), 0.5);
        assert_eq!(Progress::new(150.0, 100.0, "").fraction(), 1.0);
        assert_eq!(Progress::new(-5.0, 100.0, "").fraction(), 0.0);
        assert_eq!(Progress::new(5.0, 0.0, "").fraction(), 0.0);
        assert_eq!(Progress::new(1.0, 3.0, "").percent(), 33);
    }

    #[test]
    fn test_completion() {
        assert!(!Progress::default().is_complete());
        assert!(Progress::new(10.0, 10.0, "").is_complete());
    }

    #[test]
    fn test_reporter_keeps_text() {
        let reporter = ProgressReporter::new(Arc::new(SharedState::default()));
        reporter.set_text("Meshing");
        reporter.report(2, 8);

        let progress = reporter.state().get();
        assert_eq!(progress, Progress::new(2.0, 8.0, "Meshing"));
        assert_eq!(reporter.state().version(), 2);
    }
}
