//! SyslogSink - one syslog message per line
//!
//! Delivers to the local daemon over its Unix socket, or to a remote
//! endpoint over UDP or TCP. Local messages use the short BSD header
//! (`<PRI>Mmm dd hh:mm:ss TAG[PID]: MSG`); remote ones carry an RFC 3339
//! timestamp and the hostname.

use std::io;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use chrono::{DateTime, FixedOffset, Local, SecondsFormat};
use tokio::io::AsyncWrite;
use tokio::net::{TcpStream, UdpSocket, UnixDatagram, UnixStream};
use tracing::{debug, error, instrument, warn};

use contracts::{ContractError, Line, LineSink, SyslogConfig, SyslogNetwork};

use super::link::{write_counted, Dial, Link};

/// Socket paths probed for the local daemon, in order
const LOCAL_SOCKETS: [&str; 3] = ["/dev/log", "/var/run/syslog", "/var/run/log"];

/// Tag used when neither the config nor the program name supplies one
const FALLBACK_TAG: &str = "drainrun";

/// Where syslog messages go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyslogTarget {
    Local,
    Remote {
        network: SyslogNetwork,
        address: String,
    },
}

impl SyslogTarget {
    /// # Errors
    /// Returns a validation error when only one of network and address is set
    pub fn from_config(config: &SyslogConfig) -> Result<Self, ContractError> {
        match (config.network, &config.address) {
            (None, None) => Ok(Self::Local),
            (Some(network), Some(address)) if !address.is_empty() => Ok(Self::Remote {
                network,
                address: address.clone(),
            }),
            _ => Err(ContractError::config_validation(
                "syslog",
                "network and address must be given together",
            )),
        }
    }
}

/// Live syslog connection
pub enum SyslogConn {
    UnixDatagram(UnixDatagram),
    UnixStream(UnixStream),
    Udp(UdpSocket),
    Tcp(TcpStream),
}

impl AsyncWrite for SyslogConn {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::UnixDatagram(s) => s.poll_send(cx, buf),
            Self::UnixStream(s) => Pin::new(s).poll_write(cx, buf),
            Self::Udp(s) => s.poll_send(cx, buf),
            Self::Tcp(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::UnixStream(s) => Pin::new(s).poll_flush(cx),
            Self::Tcp(s) => Pin::new(s).poll_flush(cx),
            Self::UnixDatagram(_) | Self::Udp(_) => Poll::Ready(Ok(())),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::UnixStream(s) => Pin::new(s).poll_shutdown(cx),
            Self::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            Self::UnixDatagram(_) | Self::Udp(_) => Poll::Ready(Ok(())),
        }
    }
}

/// Dials the configured syslog target
pub struct SyslogDialer {
    target: SyslogTarget,
}

impl SyslogDialer {
    pub fn new(target: SyslogTarget) -> Self {
        Self { target }
    }

    async fn dial_local() -> io::Result<SyslogConn> {
        for path in LOCAL_SOCKETS {
            if let Ok(conn) = Self::dial_unix(Path::new(path)).await {
                return Ok(conn);
            }
        }
        Err(io::Error::new(io::ErrorKind::NotFound, "unix syslog delivery error"))
    }

    async fn dial_unix(path: &Path) -> io::Result<SyslogConn> {
        let datagram = UnixDatagram::unbound().and_then(|sock| {
            sock.connect(path)?;
            Ok(sock)
        });
        match datagram {
            Ok(sock) => Ok(SyslogConn::UnixDatagram(sock)),
            Err(_) => Ok(SyslogConn::UnixStream(UnixStream::connect(path).await?)),
        }
    }

    async fn dial_remote(network: SyslogNetwork, address: &str) -> io::Result<SyslogConn> {
        match network {
            SyslogNetwork::Tcp => Ok(SyslogConn::Tcp(TcpStream::connect(address).await?)),
            SyslogNetwork::Udp => {
                let addr = tokio::net::lookup_host(address).await?.next().ok_or_else(|| {
                    io::Error::new(io::ErrorKind::NotFound, format!("no address for {address}"))
                })?;
                let bind = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
                let socket = UdpSocket::bind(bind).await?;
                socket.connect(addr).await?;
                Ok(SyslogConn::Udp(socket))
            }
        }
    }
}

impl Dial for SyslogDialer {
    type Conn = SyslogConn;

    fn describe(&self) -> String {
        match &self.target {
            SyslogTarget::Local => "syslog".to_string(),
            SyslogTarget::Remote { network, address } => format!("syslog at {network}://{address}"),
        }
    }

    async fn dial(&mut self) -> io::Result<SyslogConn> {
        match &self.target {
            SyslogTarget::Local => Self::dial_local().await,
            SyslogTarget::Remote { network, address } => Self::dial_remote(*network, address).await,
        }
    }
}

/// Renders lines as syslog messages
#[derive(Debug, Clone)]
pub struct SyslogFormatter {
    priority: u8,
    tag: String,
    pid: u32,
    /// `Some` for remote targets, which carry the long header
    hostname: Option<String>,
}

impl SyslogFormatter {
    pub fn new(config: &SyslogConfig, target: &SyslogTarget) -> Self {
        let tag = config
            .tag
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(program_name);
        let hostname = match target {
            SyslogTarget::Local => None,
            SyslogTarget::Remote { .. } => Some(local_hostname()),
        };

        Self {
            priority: config.facility.code() * 8 + config.severity.code(),
            tag,
            pid: std::process::id(),
            hostname,
        }
    }

    pub fn format(&self, line: &[u8], now: &DateTime<FixedOffset>) -> Vec<u8> {
        let header = match &self.hostname {
            None => format!(
                "<{}>{} {}[{}]: ",
                self.priority,
                now.format("%b %e %H:%M:%S"),
                self.tag,
                self.pid
            ),
            Some(hostname) => format!(
                "<{}>{} {} {}[{}]: ",
                self.priority,
                now.to_rfc3339_opts(SecondsFormat::Secs, false),
                hostname,
                self.tag,
                self.pid
            ),
        };

        let mut message = Vec::with_capacity(header.len() + line.len() + 1);
        message.extend_from_slice(header.as_bytes());
        message.extend_from_slice(line);
        message.push(b'\n');
        message
    }
}

/// Base name of this program's argv[0]
fn program_name() -> String {
    std::env::args()
        .next()
        .and_then(|arg0| {
            Path::new(&arg0)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_TAG.to_string())
}

fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Sink sending each non-empty line as a syslog message
pub struct SyslogSink<D: Dial = SyslogDialer> {
    name: String,
    link: Link<D>,
    formatter: SyslogFormatter,
}

impl SyslogSink<SyslogDialer> {
    /// Sink for `config`; connects lazily on first flush
    ///
    /// # Errors
    /// Returns a validation error for an incomplete remote target
    pub fn new(config: &SyslogConfig) -> Result<Self, ContractError> {
        let target = SyslogTarget::from_config(config)?;
        let formatter = SyslogFormatter::new(config, &target);
        Ok(Self::with_dialer(SyslogDialer::new(target), formatter))
    }
}

impl<D: Dial> SyslogSink<D> {
    pub fn with_dialer(dialer: D, formatter: SyslogFormatter) -> Self {
        let name = dialer.describe();
        Self {
            link: Link::new(name.clone(), dialer),
            name,
            formatter,
        }
    }
}

impl<D: Dial> LineSink for SyslogSink<D> {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "syslog_sink_flush",
        skip(self, batch),
        fields(sink = %self.name, lines = batch.len())
    )]
    async fn flush(&mut self, batch: Vec<Line>) -> Result<(), ContractError> {
        // Nothing is written when the connect fails
        self.link.connection().await?;

        let mut first = true;
        for line in batch.iter().filter(|l| !l.is_empty()) {
            let message = self.formatter.format(line, &Local::now().fixed_offset());
            let conn = self.link.connection().await?;
            let (written, result) = write_counted(conn, &message).await;

            let Err(e) = result else {
                first = false;
                continue;
            };

            if first && written == 0 {
                first = false;
                warn!(
                    sink = %self.name,
                    error = %e,
                    "Failed to send data to {} - reconnecting...",
                    self.link.destination()
                );
                // The failed line is not retried
                self.link.reconnect().await?;
                continue;
            }

            error!(
                sink = %self.name,
                error = %e,
                "Failed to send data to {}",
                self.link.destination()
            );
            self.link.teardown();
            return Err(ContractError::sink_write(&self.name, e.to_string()));
        }

        Ok(())
    }

    #[instrument(name = "syslog_sink_close", skip(self), fields(sink = %self.name))]
    async fn close(&mut self) {
        self.link.close().await;
        debug!(sink = %self.name, "SyslogSink closed");
    }
}
