//! Output destinations for the facade logger

use crate::format::{LineFormat, Severity};
use crate::rotation::RotatingFileWriter;
use crate::syslog::SyslogRelay;
use crate::{Error, Result};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

/// A process stream or any other byte sink, serialized by a mutex
pub struct ConsoleStream {
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleStream {
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(out)),
        }
    }

    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    fn write(&self, buf: &[u8]) -> Result<usize> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        out.write_all(buf).map_err(Error::Write)?;
        out.flush().map_err(Error::Write)?;
        Ok(buf.len())
    }

    fn flush(&self) -> Result<()> {
        self.out
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()
            .map_err(Error::Write)
    }
}

/// Where formatted lines end up
pub enum Sink {
    File(Arc<RotatingFileWriter>),
    Console(ConsoleStream),
    Syslog(SyslogRelay),
}

impl Sink {
    /// Open (or create) a rotating log file
    pub fn file(path: impl Into<PathBuf>, format: LineFormat) -> Result<Self> {
        Ok(Sink::File(Arc::new(RotatingFileWriter::open(path, format)?)))
    }

    pub fn stderr() -> Self {
        Sink::Console(ConsoleStream::stderr())
    }

    pub fn stdout() -> Self {
        Sink::Console(ConsoleStream::stdout())
    }

    pub fn stream(out: impl Write + Send + 'static) -> Self {
        Sink::Console(ConsoleStream::new(out))
    }

    /// Connect to syslog; an empty address means the local daemon
    pub fn syslog(address: &str) -> Result<Self> {
        Ok(Sink::Syslog(SyslogRelay::connect(address)?))
    }

    /// Write one complete line
    ///
    /// `severity` only matters for syslog, where it selects the priority.
    pub fn write(&self, severity: Severity, line: &[u8]) -> Result<usize> {
        match self {
            Sink::File(writer) => writer.write(line),
            Sink::Console(stream) => stream.write(line),
            Sink::Syslog(relay) => relay.send(severity, line),
        }
    }

    pub fn file_writer(&self) -> Option<&Arc<RotatingFileWriter>> {
        match self {
            Sink::File(writer) => Some(writer),
            _ => None,
        }
    }

    /// Release the destination; process streams are only flushed
    pub fn close(&self) -> Result<()> {
        match self {
            Sink::File(writer) => writer.close(),
            Sink::Console(stream) => stream.flush(),
            Sink::Syslog(relay) => relay.close(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Sink::File(_) => "file",
            Sink::Console(_) => "console",
            Sink::Syslog(_) => "syslog",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_stream_sink_writes_whole_line() {
        let buf = SharedBuf::default();
        let sink = Sink::stream(buf.clone());

        assert_eq!(sink.write(Severity::Notice, b"[INF] hi\r\n").unwrap(), 10);
        assert_eq!(buf.0.lock().unwrap().as_slice(), b"[INF] hi\r\n");
        assert!(sink.file_writer().is_none());
        assert_eq!(sink.kind(), "console");
        sink.close().unwrap();
    }

    #[test]
    fn test_file_sink_close_closes_writer() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("app.log");
        let sink = Sink::file(&path, LineFormat::new()).unwrap();

        sink.write(Severity::Notice, b"line\r\n").unwrap();
        sink.close().unwrap();

        assert!(sink.file_writer().unwrap().is_closed());
        assert!(matches!(
            sink.write(Severity::Notice, b"late\r\n"),
            Err(Error::Closed)
        ));
        assert_eq!(std::fs::read(&path).unwrap(), b"line\r\n");
    }
}
