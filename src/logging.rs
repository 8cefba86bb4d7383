//! Structured logging setup using `tracing-subscriber` and `tracing-appender`.
//!
//! The configured `logging_level` uses the classic level names (`WARNING`,
//! `INFO`, ...) and is translated to a tracing filter. `RUST_LOG` wins when set.
//!
//! Two modes:
//! - **Console** ([`init`] without a log dir): human-readable stderr output
//! - **File** ([`init`] with a log dir): stderr plus JSON file layer (daily rotation)

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Holds the non-blocking writer guard for file logging.
///
/// The [`WorkerGuard`] must be kept alive for the duration of the process.
/// Dropping it flushes pending log entries and closes the file.
pub struct LoggingGuard {
    _guard: Option<WorkerGuard>,
}

/// Translate a classic level name into a tracing [`LevelFilter`].
///
/// # Errors
///
/// Returns an error for names that are not log levels.
pub fn level_filter(name: &str) -> anyhow::Result<LevelFilter> {
    let filter = match name.trim().to_ascii_uppercase().as_str() {
        "CRITICAL" | "FATAL" | "ERROR" => LevelFilter::ERROR,
        "WARNING" | "WARN" => LevelFilter::WARN,
        "INFO" => LevelFilter::INFO,
        "DEBUG" => LevelFilter::DEBUG,
        "NOTSET" | "TRACE" => LevelFilter::TRACE,
        _ => anyhow::bail!("unknown logging_level '{name}'"),
    };
    Ok(filter)
}

/// Initialise the global subscriber.
///
/// When `log_dir` is set, JSON logs are also written to
/// `{log_dir}/recwatch.log.YYYY-MM-DD`.
///
/// # Errors
///
/// Returns an error if the level name is invalid or the log directory cannot
/// be created.
pub fn init(level: &str, log_dir: Option<&Path>) -> anyhow::Result<LoggingGuard> {
    let default_level = level_filter(level)?;
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(default_level.into()));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let Some(log_dir) = log_dir else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .init();
        return Ok(LoggingGuard { _guard: None });
    };

    std::fs::create_dir_all(log_dir).map_err(|e| {
        anyhow::anyhow!(
            "failed to create logs directory {}: {e}",
            log_dir.display()
        )
    })?;

    let file_appender = tracing_appender::rolling::daily(log_dir, "recwatch.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking);

    // Rebuilt here: the layer's subscriber type differs from the console-only stack.
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(console_layer)
        .init();

    Ok(LoggingGuard {
        _guard: Some(guard),
    })
}
