//! Wiring: configured loggers and the diagnostics subscriber

use crate::{
    config::{LogConfig, LogTarget},
    filters::LibraryEventFilter,
    logger::{Logger, LoggerOptions},
    rotation::RotatingFileWriter,
    Error, Result,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt, EnvFilter, Layer,
};

/// Build the facade logger described by `config`
///
/// Rotation settings apply only to the file target; a size limit of zero
/// leaves rotation disabled.
pub fn build_logger(config: &LogConfig) -> Result<Logger> {
    config.validate()?;

    let options = LoggerOptions {
        timestamps: config.timestamps,
        debug: config.debug,
        trace: config.trace,
        colors: config.colors,
        pid: config.pid,
        utc: config.utc,
    };

    let logger = match config.target {
        LogTarget::Stderr => Logger::std(&options),
        LogTarget::Stdout => Logger::stdout(&options),
        LogTarget::File => {
            let path = config.file.as_ref().ok_or_else(|| Error::Config {
                message: "file target requires a log file path".to_string(),
            })?;
            let logger = Logger::file(path, &options)?;
            if config.rotation.size_limit > 0 {
                logger.set_size_limit(config.rotation.size_limit)?;
            }
            logger.set_max_backups(config.rotation.max_backups)?;
            logger
        }
        LogTarget::Syslog => Logger::syslog(&config.syslog_address, config.debug, config.trace)?,
    };

    info!(
        quill.event = "logger_built",
        target = %config.target,
        size_limit = config.rotation.size_limit,
        max_backups = config.rotation.max_backups,
        "Logger configured"
    );

    Ok(logger)
}

fn build_env_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(env_filter) = std::env::var("RUST_LOG") {
        return Ok(EnvFilter::new(env_filter));
    }

    EnvFilter::try_new(level).map_err(|e| Error::Config {
        message: format!("Invalid diagnostics level '{}': {}", level, e),
    })
}

/// Install a global subscriber printing the library's diagnostics to stderr
///
/// `level` is a filter directive such as `warn` or `quill_log=debug`;
/// `RUST_LOG` takes precedence when set.
pub fn init_diagnostics(level: &str) -> Result<()> {
    let filter = build_env_filter(level)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .try_init()
        .map_err(|e| Error::Config {
            message: format!("Failed to initialize tracing subscriber: {}", e),
        })?;

    info!(
        quill.event = "diagnostics_initialized",
        quill.version = env!("CARGO_PKG_VERSION"),
        "Diagnostics initialized"
    );

    Ok(())
}

/// A fmt layer writing tracing output into a rotating log file
///
/// The library's own events are filtered out; they are emitted while the
/// writer holds its lock.
pub fn file_layer<S>(writer: Arc<RotatingFileWriter>) -> impl Layer<S>
where
    S: tracing::Subscriber + for<'span> LookupSpan<'span>,
{
    fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_filter(LibraryEventFilter::new())
}
