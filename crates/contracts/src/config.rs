//! RunConfig - Config Loader output
//!
//! Describes the outputs a run fans lines out to and the error handlers it
//! notifies on abnormal exit.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ContractError;

/// Default ring buffer capacity per output
pub const DEFAULT_BUFFER_SIZE: usize = 10240;

/// Default token TCP connect timeout
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Complete run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Lines retained per output while a flush is in flight
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Output routing
    #[serde(default)]
    pub outputs: Vec<OutputConfig>,

    /// Error handlers notified on abnormal exit
    #[serde(default)]
    pub error_handlers: Vec<ErrorHandlerConfig>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            outputs: Vec::new(),
            error_handlers: Vec::new(),
        }
    }
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

/// Output destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputConfig {
    /// Standard output of this process
    Stdout,
    /// Standard error of this process
    Stderr,
    /// File, created if missing and appended to
    File { path: PathBuf },
    /// Syslog daemon or remote syslog endpoint
    Syslog(SyslogConfig),
    /// Token-framed TCP ingestion endpoint
    TokenTcp(TokenTcpConfig),
}

impl OutputConfig {
    /// Short label used in logs and sink names
    pub fn label(&self) -> String {
        match self {
            Self::Stdout => "stdout".to_string(),
            Self::Stderr => "stderr".to_string(),
            Self::File { path } => format!("file:{}", path.display()),
            Self::Syslog(cfg) => match (&cfg.network, &cfg.address) {
                (Some(network), Some(address)) => format!("syslog at {network}://{address}"),
                _ => "syslog".to_string(),
            },
            Self::TokenTcp(_) => "token-based TCP".to_string(),
        }
    }
}

/// Syslog output configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyslogConfig {
    #[serde(default)]
    pub facility: SyslogFacility,

    #[serde(default)]
    pub severity: SyslogSeverity,

    /// Message tag (defaults to the program name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Remote transport; `None` means the local daemon
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<SyslogNetwork>,

    /// Remote `host:port`, required with `network`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Remote syslog transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyslogNetwork {
    Udp,
    Tcp,
}

impl fmt::Display for SyslogNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Udp => f.write_str("udp"),
            Self::Tcp => f.write_str("tcp"),
        }
    }
}

/// Syslog facility codes (RFC 3164 numbering)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyslogFacility {
    Kern,
    User,
    Mail,
    Daemon,
    Auth,
    Syslog,
    Lpr,
    News,
    Uucp,
    Cron,
    Authpriv,
    Ftp,
    #[default]
    Local0,
    Local1,
    Local2,
    Local3,
    Local4,
    Local5,
    Local6,
    Local7,
}

impl SyslogFacility {
    /// Numeric facility code
    pub const fn code(self) -> u8 {
        match self {
            Self::Kern => 0,
            Self::User => 1,
            Self::Mail => 2,
            Self::Daemon => 3,
            Self::Auth => 4,
            Self::Syslog => 5,
            Self::Lpr => 6,
            Self::News => 7,
            Self::Uucp => 8,
            Self::Cron => 9,
            Self::Authpriv => 10,
            Self::Ftp => 11,
            Self::Local0 => 16,
            Self::Local1 => 17,
            Self::Local2 => 18,
            Self::Local3 => 19,
            Self::Local4 => 20,
            Self::Local5 => 21,
            Self::Local6 => 22,
            Self::Local7 => 23,
        }
    }
}

impl FromStr for SyslogFacility {
    type Err = ContractError;

    /// Case-insensitive; the empty string selects `local0`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let facility = match s.to_ascii_lowercase().as_str() {
            "kern" => Self::Kern,
            "user" => Self::User,
            "mail" => Self::Mail,
            "daemon" => Self::Daemon,
            "auth" => Self::Auth,
            "syslog" => Self::Syslog,
            "lpr" => Self::Lpr,
            "news" => Self::News,
            "uucp" => Self::Uucp,
            "cron" => Self::Cron,
            "authpriv" => Self::Authpriv,
            "ftp" => Self::Ftp,
            "" | "local0" => Self::Local0,
            "local1" => Self::Local1,
            "local2" => Self::Local2,
            "local3" => Self::Local3,
            "local4" => Self::Local4,
            "local5" => Self::Local5,
            "local6" => Self::Local6,
            "local7" => Self::Local7,
            _ => {
                return Err(ContractError::config_validation(
                    "syslog.facility",
                    format!("invalid syslog facility: {s}"),
                ))
            }
        };
        Ok(facility)
    }
}

/// Syslog severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyslogSeverity {
    Emerg,
    Alert,
    Crit,
    Err,
    Warning,
    Notice,
    #[default]
    Info,
    Debug,
}

impl SyslogSeverity {
    /// Numeric severity code
    pub const fn code(self) -> u8 {
        match self {
            Self::Emerg => 0,
            Self::Alert => 1,
            Self::Crit => 2,
            Self::Err => 3,
            Self::Warning => 4,
            Self::Notice => 5,
            Self::Info => 6,
            Self::Debug => 7,
        }
    }
}

/// Token-framed TCP output configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTcpConfig {
    /// `tcp://host:port/token` or `tcps://host:port/token`
    pub url: String,

    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

impl TokenTcpConfig {
    /// Config with the default connect timeout
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }

    /// Resolve the URL into a connectable endpoint
    ///
    /// # Errors
    /// Returns a validation error for a malformed URL, an unknown scheme, a
    /// missing host or port, or an empty token
    pub fn endpoint(&self) -> Result<TokenTcpEndpoint, ContractError> {
        const FIELD: &str = "token_tcp.url";

        if self.url.is_empty() {
            return Err(ContractError::config_validation(
                FIELD,
                "no URL provided for token-based TCP output",
            ));
        }

        let url = url::Url::parse(&self.url).map_err(|e| {
            ContractError::config_validation(
                FIELD,
                format!("invalid URL provided for token-based TCP output: {e}"),
            )
        })?;

        let tls = match url.scheme() {
            "tcp" => false,
            "tcps" => true,
            other => {
                return Err(ContractError::config_validation(
                    FIELD,
                    format!("invalid URL scheme for token-based TCP output: {other}"),
                ))
            }
        };

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ContractError::config_validation(FIELD, "missing host"))?;
        let port = url
            .port()
            .ok_or_else(|| ContractError::config_validation(FIELD, "missing port"))?;

        let path = url.path();
        let token = percent_encoding::percent_decode_str(path.strip_prefix('/').unwrap_or(path))
            .decode_utf8()
            .map_err(|e| {
                ContractError::config_validation(FIELD, format!("token is not valid UTF-8: {e}"))
            })?;
        if token.is_empty() {
            return Err(ContractError::config_validation(
                FIELD,
                "no token specified for token-based TCP output",
            ));
        }

        // IPv6 hosts come back bracketed, which is also what `host:port` needs.
        let server_name = host.trim_start_matches('[').trim_end_matches(']');

        Ok(TokenTcpEndpoint {
            address: format!("{host}:{port}"),
            server_name: server_name.to_string(),
            token: token.into_owned(),
            tls,
            timeout: Duration::from_secs(self.timeout_secs),
        })
    }
}

/// Connectable token TCP endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenTcpEndpoint {
    /// `host:port`
    pub address: String,
    /// Host name used for TLS verification
    pub server_name: String,
    pub token: String,
    pub tls: bool,
    pub timeout: Duration,
}

/// Error handler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ErrorHandlerConfig {
    /// Opbeat error intake
    Opbeat {
        organization_id: String,
        app_id: String,
        secret_token: String,
    },
}
