//! Log setup for ocwatch
//!
//! All diagnostics go to a daily-rolled file under the XDG state directory
//! (`~/.local/state/ocwatch/`), never to stdout: the terminal belongs to
//! the command output. The level comes from `OCWATCH_LOG`, then `RUST_LOG`,
//! then the `[logging]` config section.

use crate::config::{Config, LoggingConfig};
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Keeps the background log writer alive; dropping it flushes pending
/// writes. Hold it for the life of the process.
pub struct LoggingGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Set up file logging and install the global subscriber.
pub fn init(config: &LoggingConfig) -> crate::error::Result<LoggingGuard> {
    let log_dir = config.dir.clone().unwrap_or_else(Config::state_dir);
    std::fs::create_dir_all(&log_dir)?;

    let appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "ocwatch.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(build_filter(&config.level))
        .with(file_layer)
        .init();

    tracing::info!(
        log_dir = %log_dir.display(),
        level = %config.level,
        "Logging initialized"
    );

    Ok(LoggingGuard { _guard: guard })
}

/// Resolve the active filter: `OCWATCH_LOG` wins, then `RUST_LOG`, then the
/// configured level.
fn build_filter(configured_level: &str) -> EnvFilter {
    let directive = std::env::var("OCWATCH_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| configured_level.to_string());
    EnvFilter::new(directive)
}

/// Initialize logging for tests (logs to the test writer)
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}

/// Returns the log file path
pub fn log_file_path() -> PathBuf {
    Config::log_path()
}
