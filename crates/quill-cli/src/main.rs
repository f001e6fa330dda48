use anyhow::{Context, Result};
use clap::Parser;
use quill_log::{build_logger, init_diagnostics, Error, LogConfig, LogTarget, Logger, Severity};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(
    after_help = "TARGETS:\n  default     standard error\n  --stdout    standard output\n  --file      rotating log file (see --size-limit, --max-backups)\n  --syslog    local syslog, or udp://host:port, tcp://host:port, unix:///path\n\nWithout a MESSAGE, every line read from standard input is logged."
)]
struct Cli {
    /// Configuration file path
    #[arg(long, help = "Path to configuration file")]
    config: Option<PathBuf>,

    /// Log to a rotating file
    #[arg(long, conflicts_with_all = ["syslog", "stdout"], help = "Append to this log file")]
    file: Option<PathBuf>,

    /// Relay to syslog
    #[arg(
        long,
        num_args = 0..=1,
        default_missing_value = "",
        conflicts_with = "stdout",
        help = "Relay to syslog; no value means the local daemon"
    )]
    syslog: Option<String>,

    /// Log to standard output
    #[arg(long, help = "Log to standard output instead of standard error")]
    stdout: bool,

    /// Rotation threshold in bytes
    #[arg(long, help = "Rotate the log file once it exceeds this many bytes")]
    size_limit: Option<u64>,

    /// Generations to keep
    #[arg(
        long,
        allow_negative_numbers = true,
        help = "Log generations to keep, including the active file (0 keeps all)"
    )]
    max_backups: Option<i32>,

    /// Severity of the logged lines
    #[arg(
        short,
        long,
        default_value = "notice",
        help = "Severity: debug, trace, notice, warn, error, fatal"
    )]
    severity: Severity,

    #[arg(long, help = "Emit debug lines")]
    debug: bool,

    #[arg(long, help = "Emit trace lines")]
    trace: bool,

    #[arg(long, help = "Prefix lines with the process id")]
    pid: bool,

    #[arg(long, help = "Do not prefix lines with a timestamp")]
    no_timestamps: bool,

    #[arg(long, help = "Use UTC timestamps")]
    utc: bool,

    #[arg(long, help = "Color severity labels on console targets")]
    colors: bool,

    /// Level for quill's own diagnostics
    #[arg(long, help = "Diagnostics level (trace, debug, info, warn, error)")]
    log_level: Option<String>,

    /// Message to log
    message: Vec<String>,
}

/// Create log configuration from CLI arguments
async fn create_log_config(cli: &Cli) -> Result<LogConfig> {
    // Missing files fall back to defaults; environment overrides are applied either way
    let mut config = LogConfig::load(cli.config.as_deref())
        .await
        .context("Failed to load logging configuration")?;

    // Target
    if let Some(file) = &cli.file {
        config.target = LogTarget::File;
        config.file = Some(file.clone());
    } else if let Some(address) = &cli.syslog {
        config.target = LogTarget::Syslog;
        config.syslog_address = address.clone();
    } else if cli.stdout {
        config.target = LogTarget::Stdout;
    }

    // Rotation
    if let Some(limit) = cli.size_limit {
        config.rotation.size_limit = limit;
    }
    if let Some(max) = cli.max_backups {
        config.rotation.max_backups = max;
    }

    // Decoration and gating
    config.debug |= cli.debug;
    config.trace |= cli.trace;
    config.pid |= cli.pid;
    config.utc |= cli.utc;
    config.colors |= cli.colors;
    if cli.no_timestamps {
        config.timestamps = false;
    }

    if let Some(level) = &cli.log_level {
        config.diagnostics_level = level.clone();
    }

    config.validate().context("Invalid logging configuration")?;

    Ok(config)
}

/// Log one message; rotation failures are reported but do not stop the run
fn emit(logger: &Logger, severity: Severity, message: &str) -> Result<()> {
    if severity == Severity::Fatal {
        logger.fatal(message);
    }

    match logger.log(severity, message) {
        Ok(_) => Ok(()),
        Err(err @ Error::Rotation { .. }) => {
            warn!(
                quill.event = "rotation_failed",
                error = %err,
                "Line written but log rotation failed"
            );
            Ok(())
        }
        Err(err) => Err(err).context("Failed to write log line"),
    }
}

/// Log every line of standard input until EOF or Ctrl-C
async fn relay_stdin(logger: &Logger, severity: Severity) -> Result<u64> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut count = 0;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("Failed to read standard input")? {
                    Some(line) => {
                        emit(logger, severity, &line)?;
                        count += 1;
                    }
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!(quill.event = "interrupted", lines = count, "Interrupted, closing log");
                break;
            }
        }
    }

    Ok(count)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables before parsing configuration
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = create_log_config(&cli).await?;
    init_diagnostics(&config.diagnostics_level)
        .map_err(|e| anyhow::anyhow!("Diagnostics initialization failed: {}", e))?;

    info!(
        quill.event = "log_config_created",
        target = %config.target,
        size_limit = config.rotation.size_limit,
        max_backups = config.rotation.max_backups,
        "Logging configuration created"
    );

    let logger = build_logger(&config).context("Failed to create logger")?;

    if cli.message.is_empty() {
        let count = relay_stdin(&logger, cli.severity).await?;
        info!(quill.event = "stdin_relayed", lines = count, "Standard input relayed");
    } else {
        emit(&logger, cli.severity, &cli.message.join(" "))?;
    }

    logger.close().context("Failed to close log")?;
    Ok(())
}
