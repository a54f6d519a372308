//! # Progress Board
//!
//! Process-wide registry of named progress bars that the host shows stacked
//! in one popup. Any thread may report progress by id; the UI thread opens
//! the board, binds the bars it finds and closes the popup once every bar
//! finished.
//!
//! Reports that arrive while no board is open are dropped, so workers can
//! report unconditionally without knowing whether the UI asked for a board.
//!
//! ## Thread Safety
//! All registry state sits behind one mutex. Bar values are published while
//! that mutex is held, so a bar's value and its finished mark always change
//! together. `RedrawHost::request_redraw` therefore must not call back into
//! the board.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lazy_static::lazy_static;
use tickwork_api::RedrawHost;

use crate::log_ui;
use crate::ui::progress::Progress;
use crate::ui::state::SharedState;
use crate::ui::throttle::ThrottleConfig;

/// Summary of the board for the host's popup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardStatus {
    pub title: String,

    /// Bar ids in creation order
    pub bars: Vec<String>,

    /// Ids whose bar reached its maximum
    pub finished: Vec<String>,

    /// Every bar finished and auto-close is on
    pub closable: bool,
}

struct ProgressBoard {
    title: String,
    bars: Vec<(String, Arc<SharedState<Progress>>)>,
    finished: HashSet<String>,
    auto_close: bool,
    host: Arc<dyn RedrawHost>,
}

impl ProgressBoard {
    fn new(title: String, host: Arc<dyn RedrawHost>, auto_close: bool) -> Self {
        Self {
            title,
            bars: Vec::new(),
            finished: HashSet::new(),
            auto_close,
            host,
        }
    }

    fn bar(&self, id: &str) -> Option<&Arc<SharedState<Progress>>> {
        self.bars
            .iter()
            .find(|(bar_id, _)| bar_id == id)
            .map(|(_, state)| state)
    }

    /// Returns the bar for `id` and whether it was just created.
    fn bar_or_create(&mut self, id: &str) -> (Arc<SharedState<Progress>>, bool) {
        if let Some(state) = self.bar(id) {
            return (Arc::clone(state), false);
        }

        let state = Arc::new(
            SharedState::new(Progress::default())
                .with_host(Arc::clone(&self.host))
                .with_throttle(ThrottleConfig::progress()),
        );
        self.bars.push((id.to_string(), Arc::clone(&state)));
        // A restarted id is unfinished again.
        self.finished.remove(id);
        (state, true)
    }

    fn all_finished(&self) -> bool {
        !self.bars.is_empty() && self.bars.iter().all(|(id, _)| self.finished.contains(id))
    }

    fn status(&self) -> BoardStatus {
        let finished = self
            .bars
            .iter()
            .filter(|(id, _)| self.finished.contains(id))
            .map(|(id, _)| id.clone())
            .collect();

        BoardStatus {
            title: self.title.clone(),
            bars: self.bars.iter().map(|(id, _)| id.clone()).collect(),
            finished,
            closable: self.auto_close && self.all_finished(),
        }
    }
}

lazy_static! {
    static ref BOARD: Mutex<Option<ProgressBoard>> = Mutex::new(None);
}

fn board() -> MutexGuard<'static, Option<ProgressBoard>> {
    BOARD.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Opens the board with auto-close enabled. Returns `false` when one is
/// already open, in which case its title and bars are kept.
pub fn open(title: impl Into<String>, host: Arc<dyn RedrawHost>) -> bool {
    open_with(title, host, true)
}

/// Opens the board; with `auto_close` it becomes closable once every bar
/// finished.
pub fn open_with(title: impl Into<String>, host: Arc<dyn RedrawHost>, auto_close: bool) -> bool {
    let mut board = board();
    if board.is_some() {
        return false;
    }

    let title = title.into();
    log_ui!("board_opened", title = %title);
    *board = Some(ProgressBoard::new(title, Arc::clone(&host), auto_close));
    drop(board);

    host.request_redraw();
    true
}

pub fn is_open() -> bool {
    board().is_some()
}

/// Creates or updates the bar `id` from any thread.
///
/// Returns the bar's state, or `None` when no board is open. Creating a bar
/// and reaching `current >= max` always request a redraw; other updates are
/// throttled.
pub fn report(
    id: &str,
    current: f64,
    max: f64,
    text: impl Into<String>,
) -> Option<Arc<SharedState<Progress>>> {
    let progress = Progress::new(current, max, text);
    let complete = progress.is_complete();

    let mut guard = board();
    let board = guard.as_mut()?;
    let (state, created) = board.bar_or_create(id);
    if complete {
        board.finished.insert(id.to_string());
    } else {
        board.finished.remove(id);
    }
    state.publish(progress, created || complete);
    drop(guard);

    if created {
        log_ui!("bar_created", id = id);
    }
    Some(state)
}

/// Marks `id` finished by filling its bar. Returns `false` for unknown ids.
pub fn finish(id: &str) -> bool {
    let mut guard = board();
    let Some(board) = guard.as_mut() else {
        return false;
    };
    let Some(state) = board.bar(id).cloned() else {
        return false;
    };
    board.finished.insert(id.to_string());
    state.publish_with(true, |progress| progress.current = progress.max);
    true
}

/// Closes the board and drops its bars. Returns how many bars it held.
///
/// Bar states already handed out keep working but are no longer listed; the
/// next `open` starts from an empty board.
pub fn close_all() -> usize {
    let Some(closed) = board().take() else {
        return 0;
    };

    log_ui!("board_closed", bars = closed.bars.len());
    closed.host.request_redraw();
    closed.bars.len()
}

pub fn status() -> Option<BoardStatus> {
    board().as_ref().map(ProgressBoard::status)
}

/// The state behind bar `id`, for binding it to a `ProgressBar` widget.
pub fn bar(id: &str) -> Option<Arc<SharedState<Progress>>> {
    board().as_ref().and_then(|board| board.bar(id).cloned())
}

/// Every bar in creation order.
pub fn bars() -> Vec<(String, Arc<SharedState<Progress>>)> {
    board()
        .as_ref()
        .map(|board| board.bars.clone())
        .unwrap_or_default()
}

/// Tears the registry down without notifying the host. The next `open`
/// recreates it.
pub fn shutdown() {
    board().take();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::tick::RedrawFlag;

    fn detached_board() -> ProgressBoard {
        ProgressBoard::new("Jobs".to_string(), Arc::new(RedrawFlag::new()), true)
    }

    #[test]
    fn test_bar_or_create_reuses_bars() {
        let mut board = detached_board();
        let (first, created) = board.bar_or_create("mesh");
        assert!(created);

        let (second, created) = board.bar_or_create("mesh");
        assert!(!created);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_empty_board_is_not_closable() {
        let board = detached_board();
        assert!(!board.status().closable);
    }

    #[test]
    fn test_closable_only_when_all_finished() {
        let mut board = detached_board();
        board.bar_or_create("a");
        board.bar_or_create("b");
        board.finished.insert("a".to_string());
        assert!(!board.status().closable);

        board.finished.insert("b".to_string());
        let status = board.status();
        assert!(status.closable);
        assert_eq!(status.finished, vec!["a", "b"]);
    }

    #[test]
    fn test_without_auto_close_never_closable() {
        let mut board = ProgressBoard::new("Jobs".to_string(), Arc::new(RedrawFlag::new()), false);
        board.bar_or_create("a");
        board.finished.insert("a".to_string());
        assert!(!board.status().closable);
    }
}
