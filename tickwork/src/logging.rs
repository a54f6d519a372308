// Logging for tickwork
//
// A thin layer over the `tracing` ecosystem. Worker threads, the tick loop and
// the progress board all log through `tracing` macros; this module only
// installs a subscriber and provides a few structured macros.
//
// # Usage Examples
//
// ## Basic Initialization
//
// ```rust
// use tickwork::logging;
//
// // INFO level, console output
// logging::init_default();
//
// // Or with custom settings
// let config = logging::LogConfig {
//     level: tracing::Level::DEBUG,
//     json_format: false,
//     ..Default::default()
// };
// logging::init(config);
// ```
//
// ## File Logging
//
// ```rust
// use tickwork::logging;
//
// let config = logging::LogConfig::default();
// logging::init_with_file(config, "/tmp/tickwork.log").unwrap();
// ```
//
// ## Structured Macros
//
// ```rust
// use tickwork::{log_pool, task_span};
//
// log_pool!("worker_started", worker = 3);
// let span = task_span!(task_id);
// let _guard = span.enter();
// ```

use std::fs::OpenOptions;
use std::io;
use std::sync::Once;

use tracing::{Level, Subscriber};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Configuration for the logging subscriber.
///
/// # Examples
///
/// ```rust
/// use tickwork::logging::LogConfig;
/// use tracing::Level;
///
/// let config = LogConfig {
///     level: Level::DEBUG,
///     target_filters: Some("tickwork::thread=trace".to_string()),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: Level,
    /// Whether to use JSON format for logs
    pub json_format: bool,
    /// Whether to include file and line information
    pub show_file_line: bool,
    /// Whether to include thread name/id
    pub show_thread_info: bool,
    /// Whether to include timestamps
    pub show_time: bool,
    /// Target filter expressions (format: "target=level,target2=level2,...")
    pub target_filters: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            show_file_line: true,
            show_thread_info: true,
            show_time: true,
            target_filters: None,
        }
    }
}

// Only the first initialization takes effect
static INIT: Once = Once::new();

fn build_filter(config: &LogConfig) -> EnvFilter {
    let mut env_filter = EnvFilter::from_default_env().add_directive(config.level.into());

    if let Some(filters) = &config.target_filters {
        for filter in filters.split(',') {
            if let Ok(directive) = filter.trim().parse() {
                env_filter = env_filter.add_directive(directive);
            }
        }
    }

    env_filter
}

/// Install the global subscriber described by `config`.
///
/// Safe to call more than once; later calls are ignored. Worker threads are
/// named `tickwork-worker-N` by default, so `show_thread_info` makes it easy
/// to tell pool output from UI-thread output.
pub fn init(config: LogConfig) {
    INIT.call_once(|| {
        let registry = tracing_subscriber::registry().with(build_filter(&config));

        let subscriber: Box<dyn Subscriber + Send + Sync> = if config.json_format {
            Box::new(registry.with(fmt::layer().json().flatten_event(true)))
        } else {
            let fmt_layer = fmt::layer()
                .with_ansi(atty::is(atty::Stream::Stdout))
                .with_file(config.show_file_line)
                .with_line_number(config.show_file_line)
                .with_thread_names(config.show_thread_info)
                .with_thread_ids(config.show_thread_info);

            if config.show_time {
                Box::new(registry.with(fmt_layer))
            } else {
                Box::new(registry.with(fmt_layer.without_time()))
            }
        };

        set_global_subscriber(subscriber);
    });
}

fn set_global_subscriber<S>(subscriber: S)
where
    S: Subscriber + Send + Sync + 'static,
{
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Error setting global tracing subscriber: {}", err);
    }
}

/// Opens `path` in append mode for use as a log writer.
pub fn file_writer(path: &str) -> io::Result<Box<dyn io::Write + Send + Sync + 'static>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(Box::new(file))
}

/// Initialize logging to both the console and `log_file`.
///
/// The file is opened once up front so an unwritable path is reported to the
/// caller instead of being silently replaced by stderr.
pub fn init_with_file(config: LogConfig, log_file: &str) -> Result<(), io::Error> {
    drop(file_writer(log_file)?);

    INIT.call_once(|| {
        let console_layer = fmt::layer()
            .with_ansi(atty::is(atty::Stream::Stdout))
            .with_file(config.show_file_line)
            .with_line_number(config.show_file_line)
            .with_thread_names(config.show_thread_info)
            .with_thread_ids(config.show_thread_info);

        let log_file_path = log_file.to_string();
        let file_layer = fmt::layer()
            .with_ansi(false)
            .with_writer(move || -> Box<dyn io::Write + Send + Sync> {
                match file_writer(&log_file_path) {
                    Ok(writer) => writer,
                    Err(_) => Box::new(io::stderr()),
                }
            })
            .with_file(true)
            .with_line_number(true)
            .with_thread_names(true)
            .with_thread_ids(true);

        let subscriber = tracing_subscriber::registry()
            .with(build_filter(&config))
            .with(console_layer)
            .with(file_layer);

        set_global_subscriber(subscriber);
    });

    Ok(())
}

/// INFO level, human-readable console output.
pub fn init_default() {
    init(LogConfig::default());
}

/// DEBUG everywhere and TRACE for the worker pool.
pub fn init_development() {
    init(LogConfig {
        level: Level::DEBUG,
        target_filters: Some("tickwork=debug,tickwork::thread=trace".to_string()),
        ..Default::default()
    });
}

/// JSON output without file/line information.
pub fn init_production() {
    init(LogConfig {
        level: Level::INFO,
        json_format: true,
        show_file_line: false,
        show_thread_info: true,
        show_time: true,
        target_filters: None,
    });
}

/// Warnings and errors only, compact output for test runs.
pub fn init_test() {
    init(LogConfig {
        level: Level::WARN,
        json_format: false,
        show_file_line: true,
        show_thread_info: false,
        show_time: false,
        target_filters: None,
    });
}

/// Span covering the execution of one task.
///
/// ```rust,ignore
/// use tickwork::task_span;
///
/// let span = task_span!(task_id);
/// let span = task_span!(task_id, worker = 2);
/// ```
#[macro_export]
macro_rules! task_span {
    ($task_id:expr) => {
        $crate::__tracing::debug_span!("task", id = %$task_id)
    };
    ($task_id:expr, $($fields:tt)*) => {
        $crate::__tracing::debug_span!("task", id = %$task_id, $($fields)*)
    };
}

/// Worker pool events.
///
/// ```rust
/// use tickwork::log_pool;
///
/// log_pool!("task_queued");
/// log_pool!("worker_exited", worker = 1);
/// ```
#[macro_export]
macro_rules! log_pool {
    ($event:expr) => {
        $crate::__tracing::debug!(component = "pool", event = $event);
    };
    ($event:expr, $($fields:tt)*) => {
        $crate::__tracing::debug!(component = "pool", event = $event, $($fields)*);
    };
}

/// UI tick loop and progress board events.
#[macro_export]
macro_rules! log_ui {
    ($event:expr) => {
        $crate::__tracing::trace!(component = "ui", event = $event);
    };
    ($event:expr, $($fields:tt)*) => {
        $crate::__tracing::trace!(component = "ui", event = $event, $($fields)*);
    };
}

/// Error conditions, with optional context fields.
///
/// ```rust
/// use tickwork::log_error;
///
/// let error = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
/// log_error!(error, component = "board");
/// ```
#[macro_export]
macro_rules! log_error {
    ($error:expr) => {
        $crate::__tracing::error!(error = %$error);
    };
    ($error:expr, $($fields:tt)*) => {
        $crate::__tracing::error!(error = %$error, $($fields)*);
    };
}

/// The dispatcher active on the current thread. Pool workers adopt it when
/// they are spawned, so a scoped subscriber also sees their events.
#[inline]
pub fn current_subscriber() -> tracing::Dispatch {
    tracing::dispatcher::get_default(|d| d.clone())
}
