//! Logging initialization

use std::fs;

use lib_core::{AppError, Config};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// File name prefix of the daily rolling log.
pub const LOG_FILE: &str = "companion.log";

/// Initialize the logging system
///
/// Sets up:
/// - Human-readable output on stdout
/// - Daily rotated file log at `<log_dir>/companion.log.<date>`
/// - Non-blocking file writes
/// - Panic hook that records the location and message
///
/// `RUST_LOG` takes precedence over the configured level. The returned guard
/// flushes the file writer when dropped and must be kept alive.
pub fn init(config: &Config) -> Result<WorkerGuard, AppError> {
    fs::create_dir_all(&config.log_dir).map_err(|e| {
        AppError::Config(format!(
            "Failed to create log directory {}: {e}",
            config.log_dir.display()
        ))
    })?;

    let file_appender = tracing_appender::rolling::daily(&config.log_dir, LOG_FILE);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("companion=info,warn"));

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI codes in log files

    let stdout_layer = fmt::layer().with_target(false).compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| AppError::Config(format!("Logging already initialized: {e}")))?;

    tracing::info!(
        log_dir = %config.log_dir.display(),
        log_level = %config.log_level,
        "Logging initialized"
    );

    setup_panic_hook();

    Ok(guard)
}

/// Log panics with their location before the default hook runs.
fn setup_panic_hook() {
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown location".to_string());

        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic message".to_string()
        };

        let thread = std::thread::current();
        tracing::error!(
            location = %location,
            panic = %message,
            thread = thread.name().unwrap_or("unnamed"),
            "Application panic"
        );

        default_panic(panic_info);
    }));
}
