//! # Shared State
//!
//! A [`SharedState`] is the only way worker threads hand values to the UI.
//! Writers replace the value under a mutex and mark it dirty; the UI thread
//! picks the latest version up on its next tick and applies it to widgets.
//!
//! ## Key Properties
//! - Last writer wins; every write bumps a monotonically increasing version
//! - A reader always sees one writer's whole value, never a mix
//! - Redraw requests to a host are rate limited by a [`ThrottleGate`], the
//!   dirty flag is not
//! - The host is called after the lock is released

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tickwork_api::RedrawHost;

use crate::ui::throttle::{ThrottleConfig, ThrottleGate};
use crate::ui::tick::UiTick;

/// A value together with the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<T> {
    pub value: T,
    pub version: u64,
}

struct Cell<T> {
    value: T,
    version: u64,
    dirty: bool,
}

/// Thread-safe cell written by workers and consumed by the UI tick.
pub struct SharedState<T> {
    cell: Mutex<Cell<T>>,
    gate: Option<ThrottleGate>,
    host: Option<Arc<dyn RedrawHost>>,
}

impl<T: fmt::Debug> fmt::Debug for SharedState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cell = self.lock();
        f.debug_struct("SharedState")
            .field("value", &cell.value)
            .field("version", &cell.version)
            .field("dirty", &cell.dirty)
            .field("throttled", &self.gate.is_some())
            .finish()
    }
}

impl<T: Default> Default for SharedState<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> SharedState<T> {
    /// Creates a clean state at version 0 with no host attached.
    pub fn new(value: T) -> Self {
        Self {
            cell: Mutex::new(Cell {
                value,
                version: 0,
                dirty: false,
            }),
            gate: None,
            host: None,
        }
    }

    /// Requests redraws from `host` after writes, rate limited by the default
    /// throttle unless `with_throttle` picks another interval.
    pub fn with_host(mut self, host: Arc<dyn RedrawHost>) -> Self {
        self.host = Some(host);
        self.gate.get_or_insert_with(ThrottleGate::default);
        self
    }

    /// Rate limits redraw requests with `config` instead of the default.
    pub fn with_throttle(mut self, config: ThrottleConfig) -> Self {
        self.gate = Some(ThrottleGate::new(config));
        self
    }

    fn lock(&self) -> MutexGuard<'_, Cell<T>> {
        self.cell.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the value from any thread.
    pub fn update(&self, value: T) -> u64 {
        self.publish(value, false)
    }

    /// Replaces the value; `force` bypasses the throttle gate.
    pub fn publish(&self, value: T, force: bool) -> u64 {
        self.publish_with(force, move |current| *current = value)
    }

    /// Mutates the value in place.
    pub fn modify<F>(&self, mutate: F) -> u64
    where
        F: FnOnce(&mut T),
    {
        self.publish_with(false, mutate)
    }

    /// Mutates the value in place; `force` bypasses the throttle gate.
    /// Returns the new version.
    pub fn publish_with<F>(&self, force: bool, mutate: F) -> u64
    where
        F: FnOnce(&mut T),
    {
        let version = {
            let mut cell = self.lock();
            mutate(&mut cell.value);
            cell.version += 1;
            cell.dirty = true;
            cell.version
        };

        self.notify(force);
        version
    }

    fn notify(&self, force: bool) {
        let Some(host) = &self.host else {
            return;
        };
        let emit = match &self.gate {
            Some(gate) => gate.should_emit_forced(Instant::now(), force),
            None => true,
        };
        if emit {
            host.request_redraw();
        }
    }

    pub fn version(&self) -> u64 {
        self.lock().version
    }

    pub fn is_dirty(&self) -> bool {
        self.lock().dirty
    }
}

impl<T: Clone> SharedState<T> {
    /// Takes the current value if it changed since the last call. UI thread
    /// only, enforced by the tick token.
    pub fn take_if_dirty(&self, _tick: &UiTick<'_>) -> Option<Snapshot<T>> {
        let mut cell = self.lock();
        if !cell.dirty {
            return None;
        }
        cell.dirty = false;
        Some(Snapshot {
            value: cell.value.clone(),
            version: cell.version,
        })
    }

    /// Reads the current value without clearing the dirty flag.
    pub fn snapshot(&self) -> Snapshot<T> {
        let cell = self.lock();
        Snapshot {
            value: cell.value.clone(),
            version: cell.version,
        }
    }

    pub fn get(&self) -> T {
        self.lock().value.clone()
    }
}
