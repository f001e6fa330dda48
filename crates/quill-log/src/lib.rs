//! # Quill Log
//!
//! Size-bounded, append-only log files for multi-threaded processes.
//!
//! ## Features
//!
//! - **Rotating Writer**: Appends records to one file and, once a size threshold is crossed,
//!   renames it to a timestamped backup and reopens a fresh file at the original path
//! - **Backup Purging**: Keeps a bounded number of backup generations next to the log
//! - **Facade Logger**: Labeled severity methods over a file, console or syslog sink
//! - **Configurable**: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quill_log::{Logger, LoggerOptions};
//!
//! fn main() -> quill_log::Result<()> {
//!     let options = LoggerOptions::default();
//!     let logger = Logger::file("/var/log/app.log", &options)?;
//!     logger.set_size_limit(10 * 1024 * 1024)?;
//!     logger.set_max_backups(5)?;
//!
//!     logger.notice(format_args!("listening on port {}", 4222));
//!     logger.close()
//! }
//! ```

pub mod backup;
pub mod config;
pub mod filters;
pub mod format;
pub mod fs;
pub mod logger;
pub mod retention;
pub mod rotation;
pub mod sink;
pub mod syslog;
pub mod system;

pub use config::{LogConfig, LogTarget, RotationConfig};
pub use format::{LabelStyle, LineFormat, Severity};
pub use logger::{Logger, LoggerOptions};
pub use rotation::{RotatingFileWriter, RotationStep};
pub use sink::Sink;
pub use syslog::{SyslogAddress, SyslogRelay};
pub use system::{build_logger, init_diagnostics};

use std::io;
use std::path::PathBuf;

/// Result type for logging operations
pub type Result<T> = std::result::Result<T, Error>;

/// Logging errors
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("unable to open log file {path:?}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("unable to get file stats for {path:?}: {source}")]
    Stat { path: PathBuf, source: io::Error },

    #[error("error writing to log file: {0}")]
    Write(#[source] io::Error),

    #[error("log file is closed")]
    Closed,

    #[error("log rotation failed at {step} after writing {written} bytes: {source}")]
    Rotation {
        step: RotationStep,
        written: usize,
        source: io::Error,
    },

    #[error("error closing log file: {0}")]
    Close(#[source] io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Syslog error: {message}")]
    Syslog { message: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let kind = match &err {
            Error::Open { source, .. }
            | Error::Stat { source, .. }
            | Error::Rotation { source, .. } => source.kind(),
            Error::Write(source) | Error::Close(source) | Error::Io(source) => source.kind(),
            Error::Closed => io::ErrorKind::BrokenPipe,
            Error::Config { .. } => io::ErrorKind::InvalidInput,
            Error::Syslog { .. } => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}
