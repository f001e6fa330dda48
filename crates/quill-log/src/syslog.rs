//! Syslog relay sink
//!
//! Forwards already formatted messages to a local syslog daemon or to a remote
//! collector over UDP, TCP or a unix socket.

use crate::format::Severity;
use crate::{Error, Result};
use chrono::Local;
use std::fmt;
use std::io::{self, Write};
use std::net::{TcpStream, ToSocketAddrs, UdpSocket};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::debug;
use url::Url;

#[cfg(unix)]
use std::os::unix::net::{UnixDatagram, UnixStream};

/// Well-known local syslog sockets, tried in order
pub const LOCAL_SOCKETS: [&str; 3] = ["/dev/log", "/var/run/syslog", "/var/run/log"];

/// `daemon` facility
const FACILITY_DAEMON: u8 = 3;

/// Where syslog messages go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyslogAddress {
    /// The local daemon through one of [`LOCAL_SOCKETS`]
    Local,
    Udp(String),
    Tcp(String),
    Unix(PathBuf),
}

impl SyslogAddress {
    /// Parse a relay address
    ///
    /// An empty string means the local daemon; otherwise `udp://host:port`,
    /// `tcp://host:port` or `unix:///path/to/socket`.
    pub fn parse(addr: &str) -> Result<Self> {
        if addr.is_empty() {
            return Ok(SyslogAddress::Local);
        }

        let url = Url::parse(addr).map_err(|e| Error::Config {
            message: format!("failed to parse syslog address {:?}: {}", addr, e),
        })?;

        match url.scheme() {
            "udp" | "tcp" => {
                let host = url.host_str().filter(|h| !h.is_empty()).ok_or_else(|| Error::Config {
                    message: format!("syslog address {:?} has no host", addr),
                })?;
                let port = url.port().ok_or_else(|| Error::Config {
                    message: format!("syslog address {:?} has no port", addr),
                })?;
                let destination = format!("{}:{}", host, port);

                if url.scheme() == "udp" {
                    Ok(SyslogAddress::Udp(destination))
                } else {
                    Ok(SyslogAddress::Tcp(destination))
                }
            }
            "unix" => {
                if url.path().is_empty() {
                    return Err(Error::Config {
                        message: format!("syslog address {:?} has no socket path", addr),
                    });
                }
                Ok(SyslogAddress::Unix(PathBuf::from(url.path())))
            }
            other => Err(Error::Config {
                message: format!("invalid network type: {:?}", other),
            }),
        }
    }

    /// Network name and destination, `("", "")` for the local daemon
    pub fn network(&self) -> (&'static str, String) {
        match self {
            SyslogAddress::Local => ("", String::new()),
            SyslogAddress::Udp(dest) => ("udp", dest.clone()),
            SyslogAddress::Tcp(dest) => ("tcp", dest.clone()),
            SyslogAddress::Unix(path) => ("unix", path.display().to_string()),
        }
    }
}

impl fmt::Display for SyslogAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyslogAddress::Local => f.write_str("local syslog"),
            SyslogAddress::Udp(dest) => write!(f, "udp://{}", dest),
            SyslogAddress::Tcp(dest) => write!(f, "tcp://{}", dest),
            SyslogAddress::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

/// Syslog severity code for a log severity
pub fn syslog_severity(severity: Severity) -> u8 {
    match severity {
        Severity::Fatal => 2,
        Severity::Error => 3,
        Severity::Warn => 4,
        Severity::Notice | Severity::Trace => 5,
        Severity::Debug => 7,
    }
}

/// Tag for syslog messages: the executable's base name
pub fn syslog_tag() -> String {
    std::env::args_os()
        .next()
        .as_deref()
        .map(Path::new)
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "quill".to_string())
}

fn hostname() -> String {
    let name = gethostname::gethostname().to_string_lossy().into_owned();
    if name.is_empty() {
        "localhost".to_string()
    } else {
        name
    }
}

enum Connection {
    Udp(UdpSocket),
    Tcp(TcpStream),
    #[cfg(unix)]
    UnixDatagram(UnixDatagram),
    #[cfg(unix)]
    UnixStream(UnixStream),
}

impl Connection {
    fn send(&mut self, frame: &[u8]) -> io::Result<()> {
        match self {
            Connection::Udp(socket) => socket.send(frame).map(|_| ()),
            Connection::Tcp(stream) => stream.write_all(frame),
            #[cfg(unix)]
            Connection::UnixDatagram(socket) => socket.send(frame).map(|_| ()),
            #[cfg(unix)]
            Connection::UnixStream(stream) => stream.write_all(frame),
        }
    }
}

fn connect(address: &SyslogAddress) -> io::Result<Connection> {
    match address {
        SyslogAddress::Udp(dest) => {
            let remote = dest.to_socket_addrs()?.next().ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("no address for {}", dest))
            })?;
            let bind = if remote.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
            let socket = UdpSocket::bind(bind)?;
            socket.connect(remote)?;
            Ok(Connection::Udp(socket))
        }
        SyslogAddress::Tcp(dest) => Ok(Connection::Tcp(TcpStream::connect(dest.as_str())?)),
        SyslogAddress::Unix(path) => connect_unix(path),
        SyslogAddress::Local => {
            let mut last_error = None;
            for socket in LOCAL_SOCKETS {
                match connect_unix(Path::new(socket)) {
                    Ok(conn) => return Ok(conn),
                    Err(e) => last_error = Some(e),
                }
            }
            Err(last_error.unwrap_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, "no local syslog socket")
            }))
        }
    }
}

#[cfg(unix)]
fn connect_unix(path: &Path) -> io::Result<Connection> {
    let socket = UnixDatagram::unbound()?;
    match socket.connect(path) {
        Ok(()) => Ok(Connection::UnixDatagram(socket)),
        Err(_) => Ok(Connection::UnixStream(UnixStream::connect(path)?)),
    }
}

#[cfg(not(unix))]
fn connect_unix(path: &Path) -> io::Result<Connection> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("unix sockets are not available for {}", path.display()),
    ))
}

/// Connection to a syslog daemon or collector
pub struct SyslogRelay {
    address: SyslogAddress,
    tag: String,
    hostname: String,
    connection: Mutex<Option<Connection>>,
    closed: AtomicBool,
}

impl SyslogRelay {
    /// Parse `addr` and connect
    pub fn connect(addr: &str) -> Result<Self> {
        let address = SyslogAddress::parse(addr)?;
        Self::connect_to(address, syslog_tag())
    }

    pub fn connect_to(address: SyslogAddress, tag: impl Into<String>) -> Result<Self> {
        let connection = connect(&address).map_err(|e| Error::Syslog {
            message: format!("failed to connect to {}: {}", address, e),
        })?;

        debug!(
            quill.event = "syslog_connected",
            address = %address,
            "Connected to syslog"
        );

        Ok(Self {
            address,
            tag: tag.into(),
            hostname: hostname(),
            connection: Mutex::new(Some(connection)),
            closed: AtomicBool::new(false),
        })
    }

    pub fn address(&self) -> &SyslogAddress {
        &self.address
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Frame one message; local delivery uses the short BSD timestamp
    fn frame(&self, severity: Severity, message: &str) -> String {
        let priority = FACILITY_DAEMON * 8 + syslog_severity(severity);
        let now = Local::now();
        let timestamp = match self.address {
            SyslogAddress::Local => now.format("%b %e %H:%M:%S").to_string(),
            _ => now.to_rfc3339(),
        };

        format!(
            "<{}>{} {} {}[{}]: {}\n",
            priority,
            timestamp,
            self.hostname,
            self.tag,
            std::process::id(),
            message
        )
    }

    /// Send one line; trailing line terminators are stripped
    ///
    /// A failed send reconnects once and retries.
    pub fn send(&self, severity: Severity, line: &[u8]) -> Result<usize> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }

        let text = String::from_utf8_lossy(line);
        let message = text.trim_end_matches(|c| c == '\r' || c == '\n');
        let frame = self.frame(severity, message);

        let mut connection = self
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let first_attempt = match connection.as_mut() {
            Some(conn) => conn.send(frame.as_bytes()),
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "not connected")),
        };

        if let Err(error) = first_attempt {
            debug!(
                quill.event = "syslog_reconnect",
                address = %self.address,
                error = %error,
                "Reconnecting to syslog"
            );
            let mut fresh = connect(&self.address).map_err(|e| Error::Syslog {
                message: format!("failed to reconnect to {}: {}", self.address, e),
            })?;
            fresh.send(frame.as_bytes()).map_err(Error::Write)?;
            *connection = Some(fresh);
        }

        Ok(line.len())
    }

    /// Drop the connection; later sends fail
    pub fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_parse_address() {
        let cases = [
            ("udp://127.0.0.1:514", "udp", "127.0.0.1:514"),
            ("tcp://192.168.1.1:514", "tcp", "192.168.1.1:514"),
            ("unix:///var/run/syslog", "unix", "/var/run/syslog"),
            ("", "", ""),
        ];
        for (addr, network, destination) in cases {
            let parsed = SyslogAddress::parse(addr).unwrap();
            assert_eq!(parsed.network(), (network, destination.to_string()), "{}", addr);
        }
    }

    #[test]
    fn test_parse_rejects_bad_addresses() {
        for addr in ["invalid://address", "http://example.com:80", "udp://host-without-port", "no scheme"] {
            assert!(
                matches!(SyslogAddress::parse(addr), Err(Error::Config { .. })),
                "{} should be rejected",
                addr
            );
        }
    }

    #[test]
    fn test_severity_mapping() {
        assert_eq!(syslog_severity(Severity::Notice), 5);
        assert_eq!(syslog_severity(Severity::Warn), 4);
        assert_eq!(syslog_severity(Severity::Error), 3);
        assert_eq!(syslog_severity(Severity::Debug), 7);
        assert_eq!(syslog_severity(Severity::Trace), 5);
    }

    #[test]
    fn test_tag_is_executable_base_name() {
        let tag = syslog_tag();
        assert!(!tag.is_empty());
        assert!(!tag.contains(std::path::MAIN_SEPARATOR));
    }

    #[test]
    fn test_udp_relay_frames_message() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let addr = format!("udp://{}", receiver.local_addr().unwrap());

        let relay = SyslogRelay::connect(&addr).unwrap();
        assert_eq!(relay.send(Severity::Warn, b"disk nearly full\r\n").unwrap(), 18);

        let mut buf = [0u8; 1024];
        let n = receiver.recv(&mut buf).unwrap();
        let frame = std::str::from_utf8(&buf[..n]).unwrap();

        // daemon * 8 + warning
        assert!(frame.starts_with("<28>"), "{}", frame);
        assert!(frame.ends_with(&format!(
            " {} {}[{}]: disk nearly full\n",
            hostname(),
            relay.tag(),
            std::process::id()
        )));
    }

    #[test]
    fn test_tcp_relay_and_close() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = format!("tcp://{}", listener.local_addr().unwrap());

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut line = String::new();
            BufReader::new(stream).read_line(&mut line).unwrap();
            line
        });

        let relay = SyslogRelay::connect(&addr).unwrap();
        relay.send(Severity::Error, b"boom\r\n").unwrap();

        let line = server.join().unwrap();
        assert!(line.starts_with("<27>"));
        assert!(line.ends_with("]: boom\n"));

        relay.close().unwrap();
        assert!(matches!(relay.send(Severity::Error, b"late"), Err(Error::Closed)));
    }

    #[cfg(unix)]
    #[test]
    fn test_unix_datagram_relay() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("syslog.sock");
        let server = UnixDatagram::bind(&socket_path).unwrap();

        let relay = SyslogRelay::connect(&format!("unix://{}", socket_path.display())).unwrap();
        relay.send(Severity::Notice, b"hello").unwrap();

        let mut buf = [0u8; 1024];
        let n = server.recv(&mut buf).unwrap();
        let frame = std::str::from_utf8(&buf[..n]).unwrap();
        assert!(frame.starts_with("<29>"));
        assert!(frame.ends_with("]: hello\n"));
    }
}
