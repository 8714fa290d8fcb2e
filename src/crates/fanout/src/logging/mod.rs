//! Logging setup and helpers
//!
//! Everything in this crate logs through `tracing`. [`init`] installs a
//! console subscriber that honours the per-thread quiet flag: while a thread
//! is quiet only its ERROR events are written.

use crate::executor::WORKER_THREAD_PREFIX;
use crate::quiet;
use crate::{FanoutError, Result};
use std::io;
use std::panic;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn, Level, Metadata};
use tracing_subscriber::filter::{filter_fn, EnvFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// Console logging options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogOptions {
    /// 0 = warn, 1 = info, 2 = debug, 3+ = trace. `RUST_LOG` wins when set.
    pub verbosity: u8,
    pub ansi: bool,
    /// Print the event target (module path)
    pub with_target: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            verbosity: 0,
            ansi: true,
            with_target: false,
        }
    }
}

/// Filter directive for a verbosity level
pub fn verbosity_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Whether an event at `level` may be written on the current thread
pub fn passes_quiet_filter(level: &Level) -> bool {
    !quiet::is_quiet() || *level == Level::ERROR
}

/// Install the global console subscriber
///
/// Logs go to stderr so command output on stdout stays machine readable.
/// Fails if a global subscriber is already installed.
pub fn init(options: LogOptions) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity_directive(options.verbosity)));

    let console = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(options.ansi)
        .with_target(options.with_target)
        .with_filter(filter_fn(|meta: &Metadata<'_>| passes_quiet_filter(meta.level())));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .try_init()
        .map_err(|err| FanoutError::InvalidConfig(format!("logging already initialized: {}", err)))
}

/// Log levels for [`LogGuard::with_level`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Logs entry on creation and exit with elapsed time on drop
///
/// # Example
///
/// ```rust
/// use fanout::logging::LogGuard;
///
/// fn load_context() {
///     let _guard = LogGuard::new("load_context");
/// }
/// load_context();
/// ```
pub struct LogGuard {
    name: String,
    start: Instant,
}

impl LogGuard {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_level(name, LogLevel::Debug)
    }

    /// Log entry at `level`; exit is always logged at debug
    pub fn with_level(name: impl Into<String>, level: LogLevel) -> Self {
        let name = name.into();
        match level {
            LogLevel::Debug => debug!(scope = %name, "Entering"),
            LogLevel::Info => info!(scope = %name, "Entering"),
            LogLevel::Warn => warn!(scope = %name, "Entering"),
            LogLevel::Error => error!(scope = %name, "Entering"),
        }

        Self {
            name,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for LogGuard {
    fn drop(&mut self) {
        debug!(scope = %self.name, elapsed = %format_duration(self.elapsed()), "Exiting");
    }
}

/// Format duration in human-readable form
///
/// # Example
///
/// ```rust
/// use fanout::logging::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
/// assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
/// assert_eq!(format_duration(Duration::from_micros(500)), "500μs");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let micros = duration.as_micros();

    if micros < 1000 {
        format!("{}μs", micros)
    } else if micros < 1_000_000 {
        format!("{}ms", micros / 1000)
    } else if micros < 60_000_000 {
        format!("{:.2}s", micros as f64 / 1_000_000.0)
    } else {
        let seconds = micros / 1_000_000;
        format!("{}m{}s", seconds / 60, seconds % 60)
    }
}

/// Whether a thread with this name is an executor worker
pub fn is_worker_thread(name: Option<&str>) -> bool {
    name.is_some_and(|name| name.starts_with(WORKER_THREAD_PREFIX))
}

/// Route panics on executor workers through `tracing`
///
/// The executor already records those panics as failed tasks, so the
/// report is logged at DEBUG instead of printed. Panics on any other
/// thread go to the previously installed hook.
pub fn install_panic_hook() {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let current = thread::current();
        if is_worker_thread(current.name()) {
            debug!(thread = current.name().unwrap_or_default(), panic = %info, "Worker panicked");
        } else {
            previous(info);
        }
    }));
}
