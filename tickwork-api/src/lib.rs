//! # tickwork API
//!
//! Contracts shared between a frame-driven UI host and the background work
//! layer that feeds it.
//!
//! A host owns exactly one UI thread and calls back into the work layer on a
//! periodic tick. Everything a worker thread is allowed to touch is described
//! here: task identity and lifecycle, the error taxonomy of a task outcome,
//! and the two narrow interfaces the host exposes back to the core.
//!
//! ## Core Components
//!
//! - **Task identity**: [`TaskId`] and the per-task [`TaskState`] machine
//! - **Outcomes**: [`TaskOutcome`], [`TaskError`], [`WaitError`]
//! - **Host interfaces**: [`RedrawHost`] (any thread) and [`Widget`] (UI thread only)
//!
//! ## Module Organization
//!
//! - [`errors`]: Error types carried by task outcomes and blocking waits
//! - [`host`]: Interfaces the UI host implements
//! - [`types`]: Identifiers, states and type aliases

pub mod errors;
pub mod host;
pub mod types;

pub use errors::{CallbackError, TaskError, WaitError};
pub use host::{RedrawHost, Widget};
pub use types::{TaskId, TaskOutcome, TaskState};
