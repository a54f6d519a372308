#![doc = " UI-thread side: shared states, the tick loop, widgets and the progress board."]

pub mod board;
pub mod cancel;
pub mod progress;
pub mod state;
pub mod throttle;
pub mod tick;
pub mod widgets;

pub use cancel::CancelToken;
pub use progress::{Progress, ProgressReporter};
pub use state::{SharedState, Snapshot};
pub use throttle::{ThrottleConfig, ThrottleGate};
pub use tick::{RedrawFlag, TickReport, UiDispatcher, UiLoop, UiTick};
pub use widgets::{Label, ProgressBar};
