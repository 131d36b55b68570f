//! crates/logging-sink/src/syslog.rs
//! Handler forwarding records to a network syslog daemon.
//!
//! Messages are rendered as RFC 5424 or RFC 3164 lines and sent over UDP or
//! TCP. TCP supports octet-counting and newline framing and reconnects lazily
//! after a broken connection.

use std::env;
use std::fmt;
use std::io::{self, Write};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpStream, ToSocketAddrs, UdpSocket};
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use time::format_description::well_known::Rfc3339;

use crate::error::{SinkError, SinkResult};
use crate::error_manager::ErrorCode;
use crate::formatter::SharedFormatter;
use crate::handler::{Handler, HandlerCore};
use crate::level::Level;
use crate::record::Record;

/// Syslog facility codes as defined by RFC 5424.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
#[repr(u8)]
pub enum SyslogFacility {
    /// Kernel messages.
    Kernel = 0,
    /// User-level messages.
    #[default]
    UserLevel = 1,
    /// Mail system.
    MailSystem = 2,
    /// System daemons.
    SystemDaemons = 3,
    /// Security/authorization messages.
    Security = 4,
    /// Messages generated internally by syslogd.
    Syslogd = 5,
    /// Line printer subsystem.
    LinePrinter = 6,
    /// Network news subsystem.
    NetworkNews = 7,
    /// UUCP subsystem.
    Uucp = 8,
    /// Clock daemon.
    ClockDaemon = 9,
    /// Security/authorization messages (private).
    Security2 = 10,
    /// FTP daemon.
    FtpDaemon = 11,
    /// NTP subsystem.
    Ntp = 12,
    /// Log audit.
    LogAudit = 13,
    /// Log alert.
    LogAlert = 14,
    /// Clock daemon (second instance).
    ClockDaemon2 = 15,
    /// Reserved for local use.
    LocalUse0 = 16,
    /// Reserved for local use.
    LocalUse1 = 17,
    /// Reserved for local use.
    LocalUse2 = 18,
    /// Reserved for local use.
    LocalUse3 = 19,
    /// Reserved for local use.
    LocalUse4 = 20,
    /// Reserved for local use.
    LocalUse5 = 21,
    /// Reserved for local use.
    LocalUse6 = 22,
    /// Reserved for local use.
    LocalUse7 = 23,
}

const FACILITIES: [SyslogFacility; 24] = [
    SyslogFacility::Kernel,
    SyslogFacility::UserLevel,
    SyslogFacility::MailSystem,
    SyslogFacility::SystemDaemons,
    SyslogFacility::Security,
    SyslogFacility::Syslogd,
    SyslogFacility::LinePrinter,
    SyslogFacility::NetworkNews,
    SyslogFacility::Uucp,
    SyslogFacility::ClockDaemon,
    SyslogFacility::Security2,
    SyslogFacility::FtpDaemon,
    SyslogFacility::Ntp,
    SyslogFacility::LogAudit,
    SyslogFacility::LogAlert,
    SyslogFacility::ClockDaemon2,
    SyslogFacility::LocalUse0,
    SyslogFacility::LocalUse1,
    SyslogFacility::LocalUse2,
    SyslogFacility::LocalUse3,
    SyslogFacility::LocalUse4,
    SyslogFacility::LocalUse5,
    SyslogFacility::LocalUse6,
    SyslogFacility::LocalUse7,
];

impl SyslogFacility {
    /// Parses a facility name.
    ///
    /// Both the descriptive names (`user-level`, `local-use-3`, underscores
    /// allowed) and the traditional short names (`user`, `daemon`, `local3`)
    /// are accepted, case-insensitively.
    ///
    /// # Examples
    ///
    /// ```
    /// use logging_sink::SyslogFacility;
    ///
    /// assert_eq!(SyslogFacility::from_name("daemon"), Some(SyslogFacility::SystemDaemons));
    /// assert_eq!(SyslogFacility::from_name("LOCAL_USE_3"), Some(SyslogFacility::LocalUse3));
    /// assert_eq!(SyslogFacility::from_name("unknown"), None);
    /// ```
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase().replace('_', "-");
        if let Some(found) = FACILITIES.iter().find(|f| f.as_str() == name) {
            return Some(*found);
        }
        match name.as_str() {
            "kern" => Some(Self::Kernel),
            "user" => Some(Self::UserLevel),
            "mail" => Some(Self::MailSystem),
            "daemon" => Some(Self::SystemDaemons),
            "auth" => Some(Self::Security),
            "syslog" => Some(Self::Syslogd),
            "lpr" => Some(Self::LinePrinter),
            "news" => Some(Self::NetworkNews),
            "cron" => Some(Self::ClockDaemon),
            "authpriv" => Some(Self::Security2),
            "ftp" => Some(Self::FtpDaemon),
            short => short
                .strip_prefix("local")
                .and_then(|n| n.parse::<usize>().ok())
                .filter(|n| *n < 8)
                .map(|n| FACILITIES[16 + n]),
        }
    }

    /// Returns the descriptive facility name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Kernel => "kernel",
            Self::UserLevel => "user-level",
            Self::MailSystem => "mail-system",
            Self::SystemDaemons => "system-daemons",
            Self::Security => "security",
            Self::Syslogd => "syslogd",
            Self::LinePrinter => "line-printer",
            Self::NetworkNews => "network-news",
            Self::Uucp => "uucp",
            Self::ClockDaemon => "clock-daemon",
            Self::Security2 => "security2",
            Self::FtpDaemon => "ftp-daemon",
            Self::Ntp => "ntp",
            Self::LogAudit => "log-audit",
            Self::LogAlert => "log-alert",
            Self::ClockDaemon2 => "clock-daemon2",
            Self::LocalUse0 => "local-use-0",
            Self::LocalUse1 => "local-use-1",
            Self::LocalUse2 => "local-use-2",
            Self::LocalUse3 => "local-use-3",
            Self::LocalUse4 => "local-use-4",
            Self::LocalUse5 => "local-use-5",
            Self::LocalUse6 => "local-use-6",
            Self::LocalUse7 => "local-use-7",
        }
    }

    /// Returns the numeric facility code.
    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for SyslogFacility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyslogFacility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("unknown syslog facility '{s}'"))
    }
}

impl TryFrom<String> for SyslogFacility {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SyslogFacility> for String {
    fn from(value: SyslogFacility) -> Self {
        value.as_str().to_owned()
    }
}

/// Syslog severities as defined by RFC 5424.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum SyslogPriority {
    /// System is unusable.
    Emergency = 0,
    /// Action must be taken immediately.
    Alert = 1,
    /// Critical conditions.
    Critical = 2,
    /// Error conditions.
    Error = 3,
    /// Warning conditions.
    Warning = 4,
    /// Normal but significant condition.
    Notice = 5,
    /// Informational messages.
    Informational = 6,
    /// Debug-level messages.
    Debug = 7,
}

impl From<Level> for SyslogPriority {
    fn from(level: Level) -> Self {
        match level {
            Level::Fatal | Level::Off => Self::Emergency,
            Level::Error => Self::Error,
            Level::Warn => Self::Warning,
            Level::Info => Self::Informational,
            Level::Debug | Level::Trace => Self::Debug,
        }
    }
}

/// Transport used to reach the daemon.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Protocol {
    /// Stream transport with framing.
    #[default]
    Tcp,
    /// One datagram per record.
    Udp,
}

/// Message layout.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum SyslogType {
    /// `<PRI>1 TIMESTAMP HOST APP PID - - MSG`
    #[default]
    Rfc5424,
    /// `<PRI>Mmm dd hh:mm:ss HOST APP[PID]: MSG`
    Rfc3164,
}

/// Settings for a [`SyslogHandler`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyslogConfig {
    /// Daemon address as `host:port`.
    pub endpoint: String,
    /// Transport.
    pub protocol: Protocol,
    /// Message layout.
    pub syslog_type: SyslogType,
    /// Facility stamped on every message.
    pub facility: SyslogFacility,
    /// Application name field.
    pub app_name: String,
    /// Host name field.
    pub hostname: String,
    /// Prefix TCP messages with their length instead of terminating them
    /// with a newline.
    pub use_counting_framing: bool,
    /// Cut messages longer than `max_length` bytes.
    pub truncate: bool,
    /// Maximum message length in bytes.
    pub max_length: usize,
    /// Keep retrying a broken TCP connection instead of dropping records.
    pub block_on_reconnect: bool,
    /// Timeout for each TCP connection attempt.
    pub connect_timeout: Duration,
}

/// Default syslog endpoint.
pub const DEFAULT_ENDPOINT: &str = "localhost:514";

/// Default maximum message length.
pub const DEFAULT_MAX_LENGTH: usize = 2048;

impl Default for SyslogConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            protocol: Protocol::default(),
            syslog_type: SyslogType::default(),
            facility: SyslogFacility::default(),
            app_name: default_app_name(),
            hostname: default_hostname(),
            use_counting_framing: false,
            truncate: true,
            max_length: DEFAULT_MAX_LENGTH,
            block_on_reconnect: false,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Name of the running executable, or `-` when it cannot be determined.
pub fn default_app_name() -> String {
    env::current_exe()
        .ok()
        .and_then(|path| path.file_stem().map(|stem| stem.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "-".to_owned())
}

/// Host name of the machine, or `localhost` when it cannot be determined.
pub fn default_hostname() -> String {
    system_hostname().unwrap_or_else(|| "localhost".to_owned())
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn system_hostname() -> Option<String> {
    let mut buffer = [0u8; 256];
    // SAFETY: the pointer and length describe a writable buffer we own.
    let rc = unsafe { libc::gethostname(buffer.as_mut_ptr().cast(), buffer.len()) };
    if rc != 0 {
        return None;
    }
    let end = buffer.iter().position(|b| *b == 0).unwrap_or(buffer.len());
    String::from_utf8(buffer[..end].to_vec())
        .ok()
        .filter(|name| !name.is_empty())
}

#[cfg(not(unix))]
fn system_hostname() -> Option<String> {
    env::var("COMPUTERNAME").ok().filter(|name| !name.is_empty())
}

fn resolve(endpoint: &str) -> SinkResult<SocketAddr> {
    endpoint
        .to_socket_addrs()
        .map_err(|source| SinkError::Resolve {
            endpoint: endpoint.to_owned(),
            source,
        })?
        .next()
        .ok_or_else(|| SinkError::NoAddress(endpoint.to_owned()))
}

fn truncate_at_boundary(message: &mut String, max: usize) {
    if message.len() <= max {
        return;
    }
    let mut cut = max;
    while !message.is_char_boundary(cut) {
        cut -= 1;
    }
    message.truncate(cut);
}

#[derive(Debug)]
enum Transport {
    Udp(UdpSocket),
    Tcp(Option<TcpStream>),
}

/// Sends formatted records to a syslog daemon.
pub struct SyslogHandler {
    core: HandlerCore,
    config: SyslogConfig,
    address: SocketAddr,
    transport: Mutex<Transport>,
}

impl SyslogHandler {
    /// Resolves the endpoint and prepares the transport.
    ///
    /// An unreachable TCP daemon is not an error here; the connection is
    /// retried when records are published.
    pub fn connect(config: SyslogConfig, formatter: SharedFormatter) -> SinkResult<Self> {
        let address = resolve(&config.endpoint)?;
        let transport = match config.protocol {
            Protocol::Udp => {
                let local: IpAddr = if address.is_ipv4() {
                    Ipv4Addr::UNSPECIFIED.into()
                } else {
                    Ipv6Addr::UNSPECIFIED.into()
                };
                Transport::Udp(UdpSocket::bind((local, 0)).map_err(SinkError::Socket)?)
            }
            Protocol::Tcp => {
                Transport::Tcp(TcpStream::connect_timeout(&address, config.connect_timeout).ok())
            }
        };
        Ok(Self {
            core: HandlerCore::new(formatter),
            config,
            address,
            transport: Mutex::new(transport),
        })
    }

    /// Returns the handler settings.
    pub const fn config(&self) -> &SyslogConfig {
        &self.config
    }

    /// Renders the syslog line for `record` around an already formatted body.
    pub fn render(&self, record: &Record, body: &str) -> String {
        let config = &self.config;
        let priority =
            u16::from(config.facility.code()) * 8 + SyslogPriority::from(record.level()) as u16;
        let timestamp = record.timestamp();
        let pid = std::process::id();
        let mut line = match config.syslog_type {
            SyslogType::Rfc5424 => {
                let stamp = timestamp
                    .format(&Rfc3339)
                    .unwrap_or_else(|_| "-".to_owned());
                format!(
                    "<{priority}>1 {stamp} {} {} {pid} - - {body}",
                    config.hostname, config.app_name
                )
            }
            SyslogType::Rfc3164 => {
                let month = timestamp.month().to_string();
                format!(
                    "<{priority}>{} {:>2} {:02}:{:02}:{:02} {} {}[{pid}]: {body}",
                    &month[..3],
                    timestamp.day(),
                    timestamp.hour(),
                    timestamp.minute(),
                    timestamp.second(),
                    config.hostname,
                    config.app_name
                )
            }
        };
        if config.truncate {
            truncate_at_boundary(&mut line, config.max_length);
        }
        match config.protocol {
            Protocol::Udp => line,
            Protocol::Tcp if config.use_counting_framing => format!("{} {line}", line.len()),
            Protocol::Tcp => {
                line.push('\n');
                line
            }
        }
    }

    fn connect_stream(&self) -> Option<TcpStream> {
        let mut backoff = Duration::from_millis(50);
        loop {
            match TcpStream::connect_timeout(&self.address, self.config.connect_timeout) {
                Ok(stream) => return Some(stream),
                Err(error) => {
                    if !self.config.block_on_reconnect || self.core.is_closed() {
                        self.core.report(
                            "Failed to connect to syslog endpoint",
                            Some(&error),
                            ErrorCode::Write,
                        );
                        return None;
                    }
                    thread::sleep(backoff);
                    backoff = (backoff * 2).min(Duration::from_secs(2));
                }
            }
        }
    }

    fn send(&self, payload: &[u8]) -> io::Result<()> {
        let mut transport = self.transport.lock().unwrap_or_else(PoisonError::into_inner);
        match &mut *transport {
            Transport::Udp(socket) => socket.send_to(payload, self.address).map(|_| ()),
            Transport::Tcp(slot) => {
                if slot.is_none() {
                    *slot = self.connect_stream();
                }
                let Some(stream) = slot.as_mut() else {
                    return Ok(());
                };
                let result = stream.write_all(payload);
                if result.is_err() {
                    *slot = None;
                    if self.config.block_on_reconnect
                        && let Some(mut stream) = self.connect_stream()
                    {
                        let retried = stream.write_all(payload);
                        *slot = Some(stream);
                        return retried;
                    }
                }
                result
            }
        }
    }
}

impl Handler for SyslogHandler {
    fn core(&self) -> &HandlerCore {
        &self.core
    }

    fn publish(&self, record: &Record) {
        if !self.core.is_loggable(record) {
            return;
        }
        let formatted = self.core.format(record);
        let line = self.render(record, formatted.trim_end_matches(['\r', '\n']));
        if let Err(error) = self.send(line.as_bytes()) {
            self.core
                .report("Failed to send syslog record", Some(&error), ErrorCode::Write);
        }
    }

    fn flush(&self) {
        let mut transport = self.transport.lock().unwrap_or_else(PoisonError::into_inner);
        if let Transport::Tcp(Some(stream)) = &mut *transport
            && let Err(error) = stream.flush()
        {
            self.core
                .report("Failed to flush syslog stream", Some(&error), ErrorCode::Flush);
        }
    }

    fn close(&self) {
        if !self.core.mark_closed() {
            return;
        }
        self.flush();
        let mut transport = self.transport.lock().unwrap_or_else(PoisonError::into_inner);
        if let Transport::Tcp(slot) = &mut *transport {
            slot.take();
        }
    }

    fn kind(&self) -> &'static str {
        "syslog"
    }
}

impl fmt::Debug for SyslogHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyslogHandler")
            .field("address", &self.address)
            .field("protocol", &self.config.protocol)
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::net::TcpListener;
    use std::sync::Arc;

    use super::*;
    use crate::formatter::PatternFormatter;
    use time::macros::datetime;

    fn formatter() -> SharedFormatter {
        Arc::new(PatternFormatter::new("%s%n"))
    }

    fn config(endpoint: String, protocol: Protocol) -> SyslogConfig {
        SyslogConfig {
            endpoint,
            protocol,
            app_name: "app".to_owned(),
            hostname: "host".to_owned(),
            ..SyslogConfig::default()
        }
    }

    fn record() -> Record {
        Record::new(Level::Info, "io.app", "hello")
            .with_timestamp(datetime!(2024-03-05 06:07:08 UTC))
    }

    #[test]
    fn facility_names_round_trip() {
        for facility in FACILITIES {
            assert_eq!(SyslogFacility::from_name(facility.as_str()), Some(facility));
            assert_eq!(facility.to_string().parse::<SyslogFacility>(), Ok(facility));
        }
        assert_eq!(SyslogFacility::from_name("local7"), Some(SyslogFacility::LocalUse7));
        assert_eq!(SyslogFacility::from_name("local8"), None);
        assert_eq!(SyslogFacility::LocalUse0.code(), 16);
    }

    #[test]
    fn levels_map_to_severities() {
        assert_eq!(SyslogPriority::from(Level::Fatal), SyslogPriority::Emergency);
        assert_eq!(SyslogPriority::from(Level::Warn), SyslogPriority::Warning);
        assert_eq!(SyslogPriority::from(Level::Trace), SyslogPriority::Debug);
    }

    #[test]
    fn udp_datagram_uses_rfc5424_layout() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let endpoint = receiver.local_addr().unwrap().to_string();
        let handler = SyslogHandler::connect(config(endpoint, Protocol::Udp), formatter()).unwrap();

        handler.publish(&record());

        let mut buffer = [0u8; 512];
        let (len, _) = receiver.recv_from(&mut buffer).unwrap();
        let message = std::str::from_utf8(&buffer[..len]).unwrap();
        let pid = std::process::id();
        assert_eq!(
            message,
            format!("<14>1 2024-03-05T06:07:08Z host app {pid} - - hello")
        );
    }

    #[test]
    fn tcp_counting_framing_prefixes_length() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = listener.local_addr().unwrap().to_string();
        let mut settings = config(endpoint, Protocol::Tcp);
        settings.syslog_type = SyslogType::Rfc3164;
        settings.use_counting_framing = true;
        let handler = SyslogHandler::connect(settings, formatter()).unwrap();

        handler.publish(&record());
        handler.close();

        let (mut stream, _) = listener.accept().unwrap();
        let mut received = String::new();
        stream.read_to_string(&mut received).unwrap();
        let pid = std::process::id();
        let line = format!("<14>Mar  5 06:07:08 host app[{pid}]: hello");
        assert_eq!(received, format!("{} {line}", line.len()));
    }

    #[test]
    fn truncation_respects_max_length() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        let mut settings = config(receiver.local_addr().unwrap().to_string(), Protocol::Udp);
        settings.max_length = 10;
        let handler = SyslogHandler::connect(settings, formatter()).unwrap();
        assert_eq!(handler.render(&record(), "hello").len(), 10);
    }

    #[test]
    fn unresolvable_endpoint_is_rejected() {
        let error =
            SyslogHandler::connect(config("no port here".to_owned(), Protocol::Udp), formatter())
                .unwrap_err();
        assert!(matches!(error, SinkError::Resolve { .. }));
    }
}
