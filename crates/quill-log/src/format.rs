//! Severity labels and log line layout
//!
//! A line is `[<pid>] ` (optional), `YYYY/MM/DD hh:mm:ss.uuuuuu ` (optional),
//! the bracketed severity label, the message, then CRLF.

use chrono::{Local, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use std::str::FromStr;

/// Timestamp layout used in log lines
pub const LINE_TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S%.6f";

/// Log severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Trace,
    Notice,
    Warn,
    Error,
    Fatal,
}

impl Severity {
    pub const ALL: [Severity; 6] = [
        Severity::Debug,
        Severity::Trace,
        Severity::Notice,
        Severity::Warn,
        Severity::Error,
        Severity::Fatal,
    ];

    /// Get the display name for this severity
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Trace => "trace",
            Severity::Notice => "notice",
            Severity::Warn => "warn",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        }
    }

    fn index(self) -> usize {
        match self {
            Severity::Debug => 0,
            Severity::Trace => 1,
            Severity::Notice => 2,
            Severity::Warn => 3,
            Severity::Error => 4,
            Severity::Fatal => 5,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Severity::Debug),
            "trace" => Ok(Severity::Trace),
            "notice" | "info" => Ok(Severity::Notice),
            "warn" | "warning" => Ok(Severity::Warn),
            "error" => Ok(Severity::Error),
            "fatal" => Ok(Severity::Fatal),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

const PLAIN_LABELS: [&str; 6] = ["[DBG] ", "[TRC] ", "[INF] ", "[WRN] ", "[ERR] ", "[FTL] "];

const COLORED_LABELS: [&str; 6] = [
    "[\x1b[36mDBG\x1b[0m] ",
    "[\x1b[33mTRC\x1b[0m] ",
    "[\x1b[32mINF\x1b[0m] ",
    "[\x1b[0;93mWRN\x1b[0m] ",
    "[\x1b[31mERR\x1b[0m] ",
    "[\x1b[31mFTL\x1b[0m] ",
];

/// How severity labels are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelStyle {
    /// `[INF] `
    #[default]
    Plain,
    /// ANSI colored label for terminals
    Colored,
    /// No label at all; the sink carries severity out of band (syslog)
    Bare,
}

impl LabelStyle {
    pub fn label(self, severity: Severity) -> &'static str {
        match self {
            LabelStyle::Plain => PLAIN_LABELS[severity.index()],
            LabelStyle::Colored => COLORED_LABELS[severity.index()],
            LabelStyle::Bare => "",
        }
    }
}

/// Generate the pid prefix string
pub fn pid_prefix() -> String {
    format!("[{}] ", std::process::id())
}

/// Line decoration policy, fixed at construction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineFormat {
    process_prefix: Option<String>,
    timestamps: bool,
    utc: bool,
}

impl LineFormat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pid(mut self, include: bool) -> Self {
        self.process_prefix = include.then(pid_prefix);
        self
    }

    pub fn with_timestamps(mut self, include: bool) -> Self {
        self.timestamps = include;
        self
    }

    pub fn with_utc(mut self, utc: bool) -> Self {
        self.utc = utc;
        self
    }

    pub fn process_prefix(&self) -> Option<&str> {
        self.process_prefix.as_deref()
    }

    pub fn includes_timestamp(&self) -> bool {
        self.timestamps
    }

    pub fn is_utc(&self) -> bool {
        self.utc
    }

    /// Wall clock reading in the configured zone
    pub fn now(&self) -> NaiveDateTime {
        if self.utc {
            Utc::now().naive_utc()
        } else {
            Local::now().naive_local()
        }
    }

    /// Build one complete line in a fresh buffer
    pub fn format_line(&self, label: &str, message: impl fmt::Display) -> Vec<u8> {
        self.format_line_at(self.now(), label, message)
    }

    pub fn format_line_at(
        &self,
        at: NaiveDateTime,
        label: &str,
        message: impl fmt::Display,
    ) -> Vec<u8> {
        let mut line = String::with_capacity(128);

        if let Some(prefix) = &self.process_prefix {
            line.push_str(prefix);
        }
        if self.timestamps {
            // Writing into a String cannot fail
            let _ = write!(line, "{} ", at.format(LINE_TIMESTAMP_FORMAT));
        }
        line.push_str(label);
        let _ = write!(line, "{}", message);
        line.push_str("\r\n");

        line.into_bytes()
    }
}
