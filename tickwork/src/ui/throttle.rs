use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Default spacing between redraw requests from one `SharedState`.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(50);

/// Spacing used for progress bars, which tend to be written per item.
pub const PROGRESS_MIN_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThrottleConfig {
    pub min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            min_interval: DEFAULT_MIN_INTERVAL,
        }
    }
}

impl ThrottleConfig {
    pub fn progress() -> Self {
        Self {
            min_interval: PROGRESS_MIN_INTERVAL,
        }
    }

    pub fn with_interval(min_interval: Duration) -> Self {
        Self { min_interval }
    }
}

/// Rate limiter for redraw requests.
///
/// Only the request to redraw is limited. The tick loop still picks up every
/// dirty state on its next pass, so a suppressed emission delays a redraw
/// but never loses a value.
#[derive(Debug)]
pub struct ThrottleGate {
    min_interval: Duration,
    last_emit: Mutex<Option<Instant>>,
}

impl Default for ThrottleGate {
    fn default() -> Self {
        Self::new(ThrottleConfig::default())
    }
}

impl ThrottleGate {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            min_interval: config.min_interval,
            last_emit: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// True, recording `now`, when nothing was emitted yet or at least
    /// `min_interval` passed since the last emission.
    pub fn should_emit(&self, now: Instant) -> bool {
        self.should_emit_forced(now, false)
    }

    /// Like [`should_emit`](Self::should_emit), but `force` always emits.
    pub fn should_emit_forced(&self, now: Instant, force: bool) -> bool {
        let mut last_emit = self.last_emit.lock().unwrap_or_else(PoisonError::into_inner);
        let due = match *last_emit {
            None => true,
            // A clock reading older than the last emission counts as zero elapsed.
            Some(last) => now.saturating_duration_since(last) >= self.min_interval,
        };

        if due || force {
            *last_emit = Some(now);
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_call_emits() {
        let gate = ThrottleGate::default();
        assert!(gate.should_emit(Instant::now()));
    }

    #[test]
    fn test_suppresses_within_interval() {
        let gate = ThrottleGate::new(ThrottleConfig::with_interval(Duration::from_millis(50)));
        let start = Instant::now();

        assert!(gate.should_emit(start));
        assert!(!gate.should_emit(start + Duration::from_millis(10)));
        assert!(!gate.should_emit(start + Duration::from_millis(49)));
        assert!(gate.should_emit(start + Duration::from_millis(50)));
        assert!(!gate.should_emit(start + Duration::from_millis(60)));
    }

    #[test]
    fn test_force_emits_and_restarts_interval() {
        let gate = ThrottleGate::new(ThrottleConfig::with_interval(Duration::from_millis(50)));
        let start = Instant::now();

        assert!(gate.should_emit(start));
        assert!(gate.should_emit_forced(start + Duration::from_millis(5), true));
        assert!(!gate.should_emit(start + Duration::from_millis(50)));
        assert!(gate.should_emit(start + Duration::from_millis(55)));
    }

    #[test]
    fn test_earlier_instant_does_not_emit() {
        let gate = ThrottleGate::default();
        let start = Instant::now() + Duration::from_secs(1);

        assert!(gate.should_emit(start));
        assert!(!gate.should_emit(start - Duration::from_millis(500)));
    }

    #[test]
    fn test_progress_interval() {
        assert_eq!(ThrottleConfig::progress().min_interval, PROGRESS_MIN_INTERVAL);
        assert_eq!(ThrottleConfig::default().min_interval, DEFAULT_MIN_INTERVAL);
    }
}
