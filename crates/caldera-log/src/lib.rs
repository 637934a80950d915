//! Logging setup for the Caldera workspace.
//!
//! One call installs the `tracing` subscriber the engine crates log
//! through: a human-readable console layer, plus a JSON file layer in debug
//! builds so query and clip decisions can be replayed offline. The default
//! filter comes from the settings file's `debug.log_level`; `RUST_LOG`
//! overrides everything.

use caldera_config::Config;
use std::path::Path;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Name of the JSON log file written in debug builds.
pub const LOG_FILE_NAME: &str = "caldera.log";

/// Install the global tracing subscriber.
///
/// Filter precedence: `RUST_LOG`, then the settings file's
/// `debug.log_level`, then `info`. When `debug_build` is set and `log_dir`
/// is given, events are mirrored to [`LOG_FILE_NAME`] in that directory as
/// JSON lines; file setup failures fall back to console-only logging.
///
/// # Examples
///
/// ```no_run
/// use caldera_log::init_logging;
///
/// init_logging(None, false, None);
/// ```
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&Config>) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| settings_filter(config));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true) // query workers are named
        .with_timer(fmt::time::uptime());

    let file_layer = debug_build
        .then(|| open_log_file(log_dir))
        .flatten()
        .map(|log_file| {
            fmt::layer()
                .with_writer(log_file)
                .with_ansi(false)
                .with_target(true)
                .with_timer(fmt::time::uptime())
                .json()
        });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();
}

/// Filter from the settings file's log level, or [`default_env_filter`]
/// when no settings are given or the level is blank.
fn settings_filter(config: Option<&Config>) -> EnvFilter {
    match config {
        Some(config) if !config.debug.log_level.is_empty() => {
            EnvFilter::new(&config.debug.log_level)
        }
        _ => default_env_filter(),
    }
}

fn open_log_file(log_dir: Option<&Path>) -> Option<std::fs::File> {
    let dir = log_dir?;
    std::fs::create_dir_all(dir).ok()?;
    std::fs::File::create(dir.join(LOG_FILE_NAME)).ok()
}

/// The built-in default filter: `info` for all targets. Exposed so tests
/// and tools agree with [`init_logging`] on the baseline.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new("info")
}
