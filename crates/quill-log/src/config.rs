//! Logging configuration and management

use crate::syslog::SyslogAddress;
use crate::{Error, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Main logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Where log lines go
    pub target: LogTarget,

    /// Log file path, required for the file target
    pub file: Option<PathBuf>,

    /// Syslog relay address; empty means the local daemon
    pub syslog_address: String,

    /// Prefix lines with a timestamp
    pub timestamps: bool,

    /// Use UTC instead of local time
    pub utc: bool,

    /// Prefix lines with the process id
    pub pid: bool,

    /// Colored labels on console targets
    pub colors: bool,

    /// Emit debug lines
    pub debug: bool,

    /// Emit trace lines
    pub trace: bool,

    /// Level for the library's own diagnostics (tracing filter directive)
    pub diagnostics_level: String,

    /// File rotation and retention settings
    pub rotation: RotationConfig,
}

/// Log rotation and retention configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Rotation threshold in bytes, 0 disables rotation
    pub size_limit: u64,

    /// Log generations to keep, 0 or less disables purging
    pub max_backups: i32,
}

/// Log destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    #[default]
    Stderr,
    Stdout,
    File,
    Syslog,
}

impl fmt::Display for LogTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogTarget::Stderr => "stderr",
            LogTarget::Stdout => "stdout",
            LogTarget::File => "file",
            LogTarget::Syslog => "syslog",
        })
    }
}

impl FromStr for LogTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "stderr" => Ok(LogTarget::Stderr),
            "stdout" => Ok(LogTarget::Stdout),
            "file" => Ok(LogTarget::File),
            "syslog" => Ok(LogTarget::Syslog),
            other => Err(Error::Config {
                message: format!("Unknown log target '{}'", other),
            }),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            target: LogTarget::Stderr,
            file: None,
            syslog_address: String::new(),
            timestamps: true,
            utc: false,
            pid: false,
            colors: false,
            debug: false,
            trace: false,
            diagnostics_level: "warn".to_string(),
            rotation: RotationConfig::default(),
        }
    }
}

impl LogConfig {
    /// Load configuration from file or create default
    pub async fn load(config_path: Option<&Path>) -> Result<Self> {
        let config_file = match config_path {
            Some(path) => path.to_path_buf(),
            None => Self::default_config_path()?,
        };

        let mut config = if config_file.exists() {
            let content = tokio::fs::read_to_string(&config_file).await?;
            toml::from_str(&content).map_err(|e| Error::Config {
                message: format!("Failed to parse logging config: {}", e),
            })?
        } else {
            Self::default()
        };

        config.load_env_overrides();
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, config_path: Option<&Path>) -> Result<()> {
        let config_file = match config_path {
            Some(path) => path.to_path_buf(),
            None => Self::default_config_path()?,
        };

        if let Some(parent) = config_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| Error::Config {
            message: format!("Failed to serialize logging config: {}", e),
        })?;

        tokio::fs::write(&config_file, content).await?;
        Ok(())
    }

    /// Load environment variable overrides
    ///
    /// Unparsable values leave the current setting alone.
    pub fn load_env_overrides(&mut self) {
        if let Ok(target) = std::env::var("QUILL_LOG_TARGET") {
            self.target = target.parse().unwrap_or(self.target);
        }

        if let Ok(file) = std::env::var("QUILL_LOG_FILE") {
            if !file.is_empty() {
                self.file = Some(PathBuf::from(file));
            }
        }

        if let Ok(limit) = std::env::var("QUILL_LOG_SIZE_LIMIT") {
            self.rotation.size_limit = limit.parse().unwrap_or(self.rotation.size_limit);
        }

        if let Ok(max) = std::env::var("QUILL_LOG_MAX_BACKUPS") {
            self.rotation.max_backups = max.parse().unwrap_or(self.rotation.max_backups);
        }

        if let Ok(enabled) = std::env::var("QUILL_LOG_DEBUG") {
            self.debug = enabled.parse().unwrap_or(self.debug);
        }

        if let Ok(enabled) = std::env::var("QUILL_LOG_TRACE") {
            self.trace = enabled.parse().unwrap_or(self.trace);
        }

        if let Ok(address) = std::env::var("QUILL_SYSLOG_ADDRESS") {
            self.syslog_address = address;
        }
    }

    /// Get default configuration file path
    pub fn default_config_path() -> Result<PathBuf> {
        let project_dirs =
            ProjectDirs::from("com", "quill", "quill").ok_or_else(|| Error::Config {
                message: "Could not determine config directory".to_string(),
            })?;

        Ok(project_dirs.config_dir().join("logging.toml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.target == LogTarget::File {
            match &self.file {
                Some(path) if !path.as_os_str().is_empty() => {}
                _ => {
                    return Err(Error::Config {
                        message: "file target requires a log file path".to_string(),
                    })
                }
            }
        }

        if self.target == LogTarget::Syslog {
            SyslogAddress::parse(&self.syslog_address)?;
        }

        Ok(())
    }
}
