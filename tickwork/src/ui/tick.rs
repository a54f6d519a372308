//! # UI Tick Loop
//!
//! The UI thread owns a [`UiLoop`] and calls [`UiLoop::tick`] once per host
//! frame. Each tick:
//! 1. Runs closures posted through a [`UiDispatcher`] since the last tick
//! 2. Runs tick hooks
//! 3. Applies every dirty [`SharedState`] to its bound widget
//! 4. Requests a single redraw if anything changed
//!
//! Widgets live inside the loop and are never reachable from other threads.
//! Workers talk to them only through shared states and dispatched closures.

use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_queue::SegQueue;
use tickwork_api::{RedrawHost, TaskOutcome, Widget};

use crate::thread::future::{panic_message, TaskFuture};
use crate::ui::state::SharedState;
use crate::{log_error, log_ui};

type UiJob = Box<dyn FnOnce() + Send>;
type TickHook = Box<dyn FnMut(&UiTick<'_>)>;

/// Proof that code runs inside a tick on the UI thread.
///
/// Only [`UiLoop::tick`] creates one and it cannot leave that thread.
pub struct UiTick<'a> {
    number: u64,
    _ui_thread: PhantomData<&'a *const ()>,
}

impl UiTick<'_> {
    pub(crate) fn new(number: u64) -> Self {
        Self {
            number,
            _ui_thread: PhantomData,
        }
    }

    /// 1 for the first tick of a loop.
    pub fn number(&self) -> u64 {
        self.number
    }
}

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,

    /// Bindings whose state was dirty and got applied
    pub applied: usize,

    /// Dispatched closures that ran, including ones that panicked
    pub dispatched: usize,
}

impl TickReport {
    pub fn changed(&self) -> bool {
        self.applied > 0 || self.dispatched > 0
    }
}

trait Binding {
    /// Applies the state if it is dirty. Returns whether it did.
    fn apply_if_dirty(&mut self, tick: &UiTick<'_>) -> bool;
}

struct WidgetBinding<T, W> {
    state: Arc<SharedState<T>>,
    widget: Rc<RefCell<W>>,
}

impl<T: Clone, W: Widget<T>> Binding for WidgetBinding<T, W> {
    fn apply_if_dirty(&mut self, tick: &UiTick<'_>) -> bool {
        // A widget borrowed elsewhere keeps its state dirty until a later tick.
        let Ok(mut widget) = self.widget.try_borrow_mut() else {
            log_ui!("widget_busy", tick = tick.number());
            return false;
        };
        match self.state.take_if_dirty(tick) {
            Some(snapshot) => {
                widget.apply(&snapshot.value);
                true
            }
            None => false,
        }
    }
}

struct FnBinding<T, F> {
    state: Arc<SharedState<T>>,
    apply: F,
}

impl<T: Clone, F: FnMut(&T)> Binding for FnBinding<T, F> {
    fn apply_if_dirty(&mut self, tick: &UiTick<'_>) -> bool {
        match self.state.take_if_dirty(tick) {
            Some(snapshot) => {
                (self.apply)(&snapshot.value);
                true
            }
            None => false,
        }
    }
}

/// Per-UI-thread driver of bindings and dispatched closures.
pub struct UiLoop {
    host: Arc<dyn RedrawHost>,
    bindings: Vec<Box<dyn Binding>>,
    hooks: Vec<TickHook>,
    queue: Arc<SegQueue<UiJob>>,
    ticks: u64,
}

impl fmt::Debug for UiLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiLoop")
            .field("bindings", &self.bindings.len())
            .field("hooks", &self.hooks.len())
            .field("pending", &self.queue.len())
            .field("ticks", &self.ticks)
            .finish()
    }
}

impl UiLoop {
    pub fn new(host: Arc<dyn RedrawHost>) -> Self {
        Self {
            host,
            bindings: Vec::new(),
            hooks: Vec::new(),
            queue: Arc::new(SegQueue::new()),
            ticks: 0,
        }
    }

    /// Binds `widget` to `state` and returns the widget for reading.
    ///
    /// The widget receives the current value right away and every later
    /// version on the tick after it was written.
    pub fn bind<T, W>(&mut self, state: Arc<SharedState<T>>, mut widget: W) -> Rc<RefCell<W>>
    where
        T: Clone + 'static,
        W: Widget<T> + 'static,
    {
        widget.apply(&state.snapshot().value);
        let widget = Rc::new(RefCell::new(widget));
        self.bindings.push(Box::new(WidgetBinding {
            state,
            widget: Rc::clone(&widget),
        }));
        widget
    }

    /// Runs `apply` with every new version of `state`, on the UI thread.
    pub fn bind_with<T, F>(&mut self, state: Arc<SharedState<T>>, apply: F)
    where
        T: Clone + 'static,
        F: FnMut(&T) + 'static,
    {
        self.bindings.push(Box::new(FnBinding { state, apply }));
    }

    /// Registers code to run on every tick, after dispatched closures and
    /// before bindings are applied.
    pub fn add_tick_hook<F>(&mut self, hook: F)
    where
        F: FnMut(&UiTick<'_>) + 'static,
    {
        self.hooks.push(Box::new(hook));
    }

    /// Handle for posting closures to this loop from any thread.
    pub fn dispatcher(&self) -> UiDispatcher {
        UiDispatcher {
            queue: Arc::clone(&self.queue),
            host: Arc::clone(&self.host),
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Runs one frame's worth of UI work.
    pub fn tick(&mut self) -> TickReport {
        self.ticks += 1;
        let tick = UiTick::new(self.ticks);

        let dispatched = self.run_dispatched(&tick);
        for hook in &mut self.hooks {
            hook(&tick);
        }
        let mut applied = 0;
        for binding in &mut self.bindings {
            if binding.apply_if_dirty(&tick) {
                applied += 1;
            }
        }

        let report = TickReport {
            tick: self.ticks,
            applied,
            dispatched,
        };
        if report.changed() {
            self.host.request_redraw();
            log_ui!("tick_applied", tick = report.tick, applied, dispatched);
        }
        report
    }

    /// Runs only what was queued when the tick began; closures posted from
    /// inside a closure wait for the next tick.
    fn run_dispatched(&self, tick: &UiTick<'_>) -> usize {
        let pending = self.queue.len();
        let mut ran = 0;
        for _ in 0..pending {
            let Some(job) = self.queue.pop() else {
                break;
            };
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
                let message = panic_message(payload.as_ref());
                log_error!(message, component = "ui", tick = tick.number());
            }
            ran += 1;
        }
        ran
    }
}

/// Sends closures to the UI thread. Cheap to clone and `Send`.
#[derive(Clone)]
pub struct UiDispatcher {
    queue: Arc<SegQueue<UiJob>>,
    host: Arc<dyn RedrawHost>,
}

impl fmt::Debug for UiDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiDispatcher")
            .field("pending", &self.queue.len())
            .finish()
    }
}

impl UiDispatcher {
    /// Queues `job` for the next tick and asks the host for a frame.
    pub fn post<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.queue.push(Box::new(job));
        self.host.request_redraw();
    }

    /// Closures waiting for the next tick.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Runs `on_done` on the UI thread once `future` is terminal.
    pub fn on_completion<T, F>(&self, future: &TaskFuture<T>, on_done: F)
    where
        T: Clone + Send + 'static,
        F: FnOnce(TaskOutcome<T>) + Send + 'static,
    {
        let dispatcher = self.clone();
        future.add_done_callback(move |outcome| {
            let outcome = outcome.clone();
            dispatcher.post(move || on_done(outcome));
        });
    }
}

/// Ready-made [`RedrawHost`] that coalesces requests into one flag the host
/// checks once per frame.
#[derive(Debug, Default)]
pub struct RedrawFlag {
    requested: AtomicBool,
    requests: AtomicU64,
}

impl RedrawFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether a redraw was requested since the last call, and
    /// clears the flag.
    pub fn take(&self) -> bool {
        self.requested.swap(false, Ordering::AcqRel)
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Total requests received, before coalescing.
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }
}

impl RedrawHost for RedrawFlag {
    fn request_redraw(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.requested.store(true, Ordering::Release);
    }
}
