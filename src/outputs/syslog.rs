//! Syslog output over UDP, TCP or a local socket
//!
//! Messages are framed as `<PRI>TIMESTAMP HOST TAG[PID]: MSG`, where `PRI`
//! is `facility * 8 + severity`. The transport is dialed at construction;
//! a failed dial fails the construction. Stream transports get a newline
//! terminator and one reconnect attempt when a send fails.

use crate::core::config::OutputConfig;
use crate::core::error::{LoggerError, Result};
use crate::core::formatter::Formatter;
use crate::core::log_entry::LogEntry;
use crate::core::log_level::LogLevel;
use crate::core::output::{Output, OutputBase};
use crate::core::registry::{OutputContext, OutputFactory};
use parking_lot::Mutex;
use std::io::{self, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs, UdpSocket};
use std::sync::Arc;
use std::time::Duration;

#[cfg(unix)]
use std::os::unix::net::{UnixDatagram, UnixStream};

const DIAL_TIMEOUT: Duration = Duration::from_secs(5);

#[cfg(unix)]
const LOCAL_SOCKETS: [&str; 3] = ["/dev/log", "/var/run/syslog", "/var/run/log"];

/// Syslog severity for a level
pub fn severity(level: LogLevel) -> u8 {
    match level {
        LogLevel::Trace | LogLevel::Debug => 7,
        LogLevel::Info => 6,
        LogLevel::Warn => 4,
        LogLevel::Error => 3,
        LogLevel::Fatal => 2,
        LogLevel::Panic => 0,
    }
}

/// Facility code for a name such as `user`, `daemon` or `local3`
pub fn facility_code(name: &str) -> Option<u8> {
    let code = match name.trim().to_ascii_lowercase().as_str() {
        "kern" => 0,
        "user" => 1,
        "mail" => 2,
        "daemon" => 3,
        "auth" => 4,
        "syslog" => 5,
        "lpr" => 6,
        "news" => 7,
        "uucp" => 8,
        "cron" => 9,
        "authpriv" => 10,
        "ftp" => 11,
        "local0" => 16,
        "local1" => 17,
        "local2" => 18,
        "local3" => 19,
        "local4" => 20,
        "local5" => 21,
        "local6" => 22,
        "local7" => 23,
        _ => return None,
    };
    Some(code)
}

/// Where syslog messages go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyslogTarget {
    Udp(String),
    Tcp(String),
    Unix(String),
    Unixgram(String),
    /// The host's local syslog socket
    Local,
}

impl SyslogTarget {
    /// Parse `network`/`address` settings; an empty network means local
    pub fn parse(network: &str, address: &str) -> std::result::Result<Self, String> {
        let address = address.to_string();
        match network.trim().to_ascii_lowercase().as_str() {
            "" | "local" => Ok(SyslogTarget::Local),
            "udp" => Ok(SyslogTarget::Udp(address)),
            "tcp" => Ok(SyslogTarget::Tcp(address)),
            "unix" => Ok(SyslogTarget::Unix(address)),
            "unixgram" => Ok(SyslogTarget::Unixgram(address)),
            other => Err(format!("unknown syslog network '{}'", other)),
        }
    }

    fn is_stream(&self) -> bool {
        matches!(self, SyslogTarget::Tcp(_) | SyslogTarget::Unix(_))
    }
}

impl std::fmt::Display for SyslogTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyslogTarget::Udp(a) => write!(f, "udp://{}", a),
            SyslogTarget::Tcp(a) => write!(f, "tcp://{}", a),
            SyslogTarget::Unix(a) => write!(f, "unix://{}", a),
            SyslogTarget::Unixgram(a) => write!(f, "unixgram://{}", a),
            SyslogTarget::Local => write!(f, "local syslog"),
        }
    }
}

enum Transport {
    Udp(UdpSocket),
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
    #[cfg(unix)]
    Unixgram(UnixDatagram),
}

impl Transport {
    fn dial(target: &SyslogTarget) -> io::Result<Self> {
        match target {
            SyslogTarget::Udp(address) => {
                let addr = resolve(address)?;
                let bind: SocketAddr = if addr.is_ipv4() {
                    ([0, 0, 0, 0], 0).into()
                } else {
                    ([0u16; 8], 0).into()
                };
                let socket = UdpSocket::bind(bind)?;
                socket.connect(addr)?;
                Ok(Transport::Udp(socket))
            }
            SyslogTarget::Tcp(address) => {
                let stream = TcpStream::connect_timeout(&resolve(address)?, DIAL_TIMEOUT)?;
                stream.set_write_timeout(Some(DIAL_TIMEOUT))?;
                stream.set_nodelay(true)?;
                Ok(Transport::Tcp(stream))
            }
            #[cfg(unix)]
            SyslogTarget::Unix(path) => Ok(Transport::Unix(UnixStream::connect(path)?)),
            #[cfg(unix)]
            SyslogTarget::Unixgram(path) => {
                let socket = UnixDatagram::unbound()?;
                socket.connect(path)?;
                Ok(Transport::Unixgram(socket))
            }
            #[cfg(unix)]
            SyslogTarget::Local => Self::dial_local(&LOCAL_SOCKETS),
            #[cfg(not(unix))]
            _ => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "unix sockets are not available on this platform",
            )),
        }
    }

    /// Try each socket as a datagram and then a stream socket; the error
    /// names every failed attempt
    #[cfg(unix)]
    fn dial_local(paths: &[&str]) -> io::Result<Self> {
        let mut kind = io::ErrorKind::NotFound;
        let mut failures = Vec::new();
        for path in paths {
            let attempts = [
                ("unixgram", SyslogTarget::Unixgram(path.to_string())),
                ("unix", SyslogTarget::Unix(path.to_string())),
            ];
            for (label, target) in attempts {
                match Self::dial(&target) {
                    Ok(transport) => return Ok(transport),
                    Err(e) => {
                        kind = e.kind();
                        failures.push(format!("{} {}: {}", label, path, e));
                    }
                }
            }
        }

        if failures.is_empty() {
            return Err(io::Error::new(kind, "no local syslog socket"));
        }
        Err(io::Error::new(kind, failures.join("; ")))
    }

    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self {
            Transport::Udp(socket) => socket.send(bytes).map(|_| ()),
            Transport::Tcp(stream) => stream.write_all(bytes),
            #[cfg(unix)]
            Transport::Unix(stream) => stream.write_all(bytes),
            #[cfg(unix)]
            Transport::Unixgram(socket) => socket.send(bytes).map(|_| ()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Transport::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            Transport::Unix(stream) => stream.flush(),
            _ => Ok(()),
        }
    }

    fn shutdown(self) {
        match self {
            Transport::Tcp(stream) => {
                let _ = stream.shutdown(std::net::Shutdown::Both);
            }
            #[cfg(unix)]
            Transport::Unix(stream) => {
                let _ = stream.shutdown(std::net::Shutdown::Both);
            }
            _ => {}
        }
    }
}

fn resolve(address: &str) -> io::Result<SocketAddr> {
    address.to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("address '{}' did not resolve", address),
        )
    })
}

fn local_hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

fn default_tag() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.file_stem().and_then(|s| s.to_str()).map(str::to_string))
        .unwrap_or_else(|| "app".to_string())
}

pub struct SyslogOutput {
    base: OutputBase,
    target: SyslogTarget,
    facility: u8,
    tag: String,
    hostname: String,
    pid: u32,
    transport: Mutex<Option<Transport>>,
}

impl SyslogOutput {
    /// Dial the target; fails with a construction error when it is unreachable
    pub fn new(
        name: impl Into<String>,
        level: LogLevel,
        formatter: Formatter,
        target: SyslogTarget,
        facility: u8,
        tag: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        let transport = Transport::dial(&target).map_err(|e| {
            LoggerError::construction(name.clone(), format!("dial {}: {}", target, e))
        })?;

        Ok(Self {
            base: OutputBase::new(name, level, formatter),
            target,
            facility,
            tag: tag.into(),
            hostname: local_hostname(),
            pid: std::process::id(),
            transport: Mutex::new(Some(transport)),
        })
    }

    pub fn target(&self) -> &SyslogTarget {
        &self.target
    }

    /// Frame one entry as a syslog message
    pub fn frame(&self, entry: &LogEntry) -> Result<String> {
        let priority = self.facility as u16 * 8 + severity(entry.level) as u16;
        let mut message = format!(
            "<{}>{} {} {}[{}]: {}",
            priority,
            entry.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            self.hostname,
            self.tag,
            self.pid,
            self.base.formatter().format(entry)?
        );
        if self.target.is_stream() {
            message.push('\n');
        }
        Ok(message)
    }
}

impl Output for SyslogOutput {
    fn write(&self, entry: &LogEntry) -> Result<usize> {
        if !self.base.accepts(entry) {
            return Ok(0);
        }
        let message = self.frame(entry)?;
        let bytes = message.as_bytes();

        let mut guard = self.transport.lock();
        let transport = guard
            .as_mut()
            .ok_or_else(|| LoggerError::write(self.base.name(), "transport is closed"))?;

        match transport.send(bytes) {
            Ok(()) => Ok(bytes.len()),
            Err(e) if self.target.is_stream() => {
                let mut fresh = Transport::dial(&self.target).map_err(|re| {
                    LoggerError::write(
                        self.base.name(),
                        format!("send failed: {} (reconnect: {})", e, re),
                    )
                })?;
                fresh
                    .send(bytes)
                    .map_err(|e| LoggerError::write(self.base.name(), e.to_string()))?;
                *guard = Some(fresh);
                Ok(bytes.len())
            }
            Err(e) => Err(LoggerError::write(self.base.name(), e.to_string())),
        }
    }

    fn name(&self) -> &str {
        self.base.name()
    }

    fn level(&self) -> LogLevel {
        self.base.level()
    }

    fn is_enabled(&self) -> bool {
        self.base.is_enabled()
    }

    fn set_enabled(&self, enabled: bool) {
        self.base.set_enabled(enabled);
    }

    fn flush(&self) -> Result<()> {
        if let Some(transport) = self.transport.lock().as_mut() {
            transport
                .flush()
                .map_err(|e| LoggerError::write(self.base.name(), e.to_string()))?;
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        if let Some(transport) = self.transport.lock().take() {
            transport.shutdown();
        }
        Ok(())
    }
}

fn build(config: &OutputConfig, ctx: &OutputContext<'_>) -> Result<Box<dyn Output>> {
    let component = format!("outputs.{}", config.name);
    let settings = &config.settings;

    let level = ctx.level_for(config)?;
    let formatter = ctx
        .formatter_for(config)?
        .with_colors(false)
        .with_time(false);

    let target = SyslogTarget::parse(
        settings.get_str("network").unwrap_or(""),
        settings.get_str("address").unwrap_or(""),
    )
    .map_err(|e| LoggerError::config(component.clone(), e))?;

    let facility_name = settings.get_str("facility").unwrap_or("user");
    let facility = facility_code(facility_name).ok_or_else(|| {
        LoggerError::config(component, format!("unknown syslog facility '{}'", facility_name))
    })?;

    let tag = settings
        .get_str("tag")
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or_else(default_tag);

    let output = SyslogOutput::new(config.name.clone(), level, formatter, target, facility, tag)?;
    Ok(Box::new(output))
}

/// Factory registered under the `syslog` type
pub fn factory() -> OutputFactory {
    Arc::new(build)
}
