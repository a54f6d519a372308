//! Interfaces a UI host implements so the work layer can reach it.
//!
//! The host guarantees its tick runs on one thread and never re-enters
//! itself. Only [`RedrawHost`] may be called from worker threads.

use std::sync::Arc;

/// Receives redraw requests.
///
/// Called from any thread, possibly many times per frame; implementations
/// must be idempotent and are expected to coalesce requests into at most one
/// redraw per frame.
pub trait RedrawHost: Send + Sync {
    fn request_redraw(&self);
}

impl<H: RedrawHost + ?Sized> RedrawHost for Arc<H> {
    fn request_redraw(&self) {
        (**self).request_redraw()
    }
}

/// A UI-thread-owned object that displays a value of type `T`.
///
/// Widgets carry no thread-safety requirements: the tick loop is the only
/// caller of [`Widget::apply`].
pub trait Widget<T> {
    fn apply(&mut self, value: &T);
}
