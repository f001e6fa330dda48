//! Severity-labeled facade over a [`Sink`]

use crate::format::{LabelStyle, LineFormat, Severity};
use crate::rotation::RotatingFileWriter;
use crate::sink::Sink;
use crate::{Error, Result};
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, warn};

/// Decoration and gating options shared by the logger constructors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggerOptions {
    pub timestamps: bool,
    pub debug: bool,
    pub trace: bool,
    pub colors: bool,
    pub pid: bool,
    pub utc: bool,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            timestamps: true,
            debug: false,
            trace: false,
            colors: false,
            pid: false,
            utc: false,
        }
    }
}

impl LoggerOptions {
    pub fn line_format(&self) -> LineFormat {
        LineFormat::new()
            .with_pid(self.pid)
            .with_timestamps(self.timestamps)
            .with_utc(self.utc)
    }
}

/// Leveled logger writing one decorated line per call
pub struct Logger {
    sink: Sink,
    format: LineFormat,
    labels: LabelStyle,
    debug: bool,
    trace: bool,
}

impl Logger {
    pub fn new(sink: Sink, format: LineFormat, labels: LabelStyle) -> Self {
        Self {
            sink,
            format,
            labels,
            debug: false,
            trace: false,
        }
    }

    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    pub fn with_trace(mut self, enabled: bool) -> Self {
        self.trace = enabled;
        self
    }

    /// Logger on standard error; labels are colored when `colors` is set
    pub fn std(options: &LoggerOptions) -> Self {
        Self::console(Sink::stderr(), options)
    }

    /// Same as [`Logger::std`] on standard output
    pub fn stdout(options: &LoggerOptions) -> Self {
        Self::console(Sink::stdout(), options)
    }

    /// Logger on an arbitrary byte stream, decorated like [`Logger::std`]
    pub fn stream(out: impl Write + Send + 'static, options: &LoggerOptions) -> Self {
        Self::console(Sink::stream(out), options)
    }

    fn console(sink: Sink, options: &LoggerOptions) -> Self {
        let labels = if options.colors {
            LabelStyle::Colored
        } else {
            LabelStyle::Plain
        };
        Self::new(sink, options.line_format(), labels)
            .with_debug(options.debug)
            .with_trace(options.trace)
    }

    /// Logger on a rotating file; labels are never colored
    pub fn file(path: impl Into<PathBuf>, options: &LoggerOptions) -> Result<Self> {
        let format = options.line_format();
        let sink = Sink::file(path, format.clone())?;
        Ok(Self::new(sink, format, LabelStyle::Plain)
            .with_debug(options.debug)
            .with_trace(options.trace))
    }

    /// Logger relaying to syslog
    ///
    /// Syslog stamps and tags messages itself, so lines carry neither a label
    /// nor a timestamp or pid prefix.
    pub fn syslog(address: &str, debug: bool, trace: bool) -> Result<Self> {
        let sink = Sink::syslog(address)?;
        Ok(Self::new(sink, LineFormat::new(), LabelStyle::Bare)
            .with_debug(debug)
            .with_trace(trace))
    }

    pub fn is_enabled(&self, severity: Severity) -> bool {
        match severity {
            Severity::Debug => self.debug,
            Severity::Trace => self.trace,
            _ => true,
        }
    }

    /// Format and write one line at `severity`
    ///
    /// Returns `Ok(0)` without touching the sink when the severity is gated
    /// off.
    pub fn log(&self, severity: Severity, message: impl fmt::Display) -> Result<usize> {
        if !self.is_enabled(severity) {
            return Ok(0);
        }
        let line = self
            .format
            .format_line(self.labels.label(severity), message);
        self.sink.write(severity, &line)
    }

    fn emit(&self, severity: Severity, message: impl fmt::Display) {
        if let Err(err) = self.log(severity, message) {
            warn!(
                quill.event = "log_write_failed",
                severity = %severity,
                sink = self.sink.kind(),
                error = %err,
                "Failed to write log line"
            );
        }
    }

    pub fn notice(&self, message: impl fmt::Display) {
        self.emit(Severity::Notice, message);
    }

    pub fn warn(&self, message: impl fmt::Display) {
        self.emit(Severity::Warn, message);
    }

    pub fn error(&self, message: impl fmt::Display) {
        self.emit(Severity::Error, message);
    }

    pub fn debug(&self, message: impl fmt::Display) {
        self.emit(Severity::Debug, message);
    }

    pub fn trace(&self, message: impl fmt::Display) {
        self.emit(Severity::Trace, message);
    }

    /// Log at fatal severity, close the sink and exit the process with status 1
    pub fn fatal(&self, message: impl fmt::Display) -> ! {
        self.emit(Severity::Fatal, message);
        if let Err(err) = self.close() {
            error!(
                quill.event = "log_close_failed",
                error = %err,
                "Failed to close log before exit"
            );
        }
        std::process::exit(1)
    }

    /// Set the rotation threshold of a file logger
    pub fn set_size_limit(&self, limit: u64) -> Result<()> {
        let writer = self.require_file("can set log size limit only for file logger")?;
        writer.set_limit(limit);
        Ok(())
    }

    /// Set the number of generations a file logger keeps
    pub fn set_max_backups(&self, max_backups: i32) -> Result<()> {
        let writer = self.require_file("can set max backups only for file logger")?;
        writer.set_max_backups(max_backups);
        Ok(())
    }

    fn require_file(&self, message: &str) -> Result<&Arc<RotatingFileWriter>> {
        self.sink.file_writer().ok_or_else(|| Error::Config {
            message: message.to_string(),
        })
    }

    pub fn file_writer(&self) -> Option<&Arc<RotatingFileWriter>> {
        self.sink.file_writer()
    }

    pub fn sink(&self) -> &Sink {
        &self.sink
    }

    pub fn line_format(&self) -> &LineFormat {
        &self.format
    }

    pub fn close(&self) -> Result<()> {
        self.sink.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn quiet_options() -> LoggerOptions {
        LoggerOptions {
            timestamps: false,
            ..LoggerOptions::default()
        }
    }

    #[test]
    fn test_labels_per_severity() {
        let buf = SharedBuf::default();
        let logger = Logger::stream(buf.clone(), &quiet_options());

        logger.notice("started");
        logger.warn(format_args!("queue at {}%", 80));
        logger.error("failed");

        assert_eq!(
            buf.text(),
            "[INF] started\r\n[WRN] queue at 80%\r\n[ERR] failed\r\n"
        );
    }

    #[test]
    fn test_debug_and_trace_gated_off() {
        let buf = SharedBuf::default();
        let logger = Logger::stream(buf.clone(), &quiet_options());

        assert_eq!(logger.log(Severity::Debug, "hidden").unwrap(), 0);
        assert_eq!(logger.log(Severity::Trace, "hidden").unwrap(), 0);
        logger.debug("hidden");
        logger.trace("hidden");

        assert!(buf.text().is_empty());
    }

    #[test]
    fn test_debug_and_trace_enabled() {
        let buf = SharedBuf::default();
        let options = LoggerOptions {
            debug: true,
            trace: true,
            ..quiet_options()
        };
        let logger = Logger::stream(buf.clone(), &options);

        logger.debug("d");
        logger.trace("t");

        assert_eq!(buf.text(), "[DBG] d\r\n[TRC] t\r\n");
    }

    #[test]
    fn test_colored_console_labels() {
        let buf = SharedBuf::default();
        let options = LoggerOptions {
            colors: true,
            ..quiet_options()
        };
        let logger = Logger::stream(buf.clone(), &options);

        logger.notice("hi");
        assert_eq!(buf.text(), "[\x1b[32mINF\x1b[0m] hi\r\n");
    }

    #[test]
    fn test_pid_and_timestamp_decoration() {
        let buf = SharedBuf::default();
        let options = LoggerOptions {
            pid: true,
            ..LoggerOptions::default()
        };
        let logger = Logger::stream(buf.clone(), &options);

        logger.notice("hi");

        let text = buf.text();
        let prefix = format!("[{}] ", std::process::id());
        assert!(text.starts_with(&prefix));
        // "YYYY/MM/DD hh:mm:ss.uuuuuu " then the label
        assert_eq!(&text[prefix.len() + 27..], "[INF] hi\r\n");
    }

    #[test]
    fn test_size_limit_requires_file_sink() {
        let logger = Logger::stream(SharedBuf::default(), &quiet_options());

        assert!(matches!(
            logger.set_size_limit(100),
            Err(Error::Config { .. })
        ));
        assert!(matches!(
            logger.set_max_backups(3),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn test_file_logger_uses_plain_labels() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("app.log");
        let options = LoggerOptions {
            colors: true,
            ..quiet_options()
        };

        let logger = Logger::file(&path, &options).unwrap();
        logger.set_size_limit(1024).unwrap();
        logger.set_max_backups(2).unwrap();
        logger.notice("to file");
        logger.close().unwrap();

        let writer = logger.file_writer().unwrap();
        assert_eq!(writer.rotation_limit(), 1024);
        assert_eq!(writer.max_backups(), 2);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[INF] to file\r\n");
    }

    #[test]
    fn test_write_after_close_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let logger = Logger::file(temp_dir.path().join("app.log"), &quiet_options()).unwrap();

        logger.close().unwrap();
        assert!(matches!(logger.log(Severity::Notice, "late"), Err(Error::Closed)));
        // The severity methods swallow the error
        logger.notice("late");
    }
}
