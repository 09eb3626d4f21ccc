//! TokenTcpSink - token-framed lines over TCP, optionally TLS
//!
//! Each line goes out as `<token> <line>\n`; a batch is one payload.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use tokio::io::AsyncWrite;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, error, instrument, warn};

use contracts::{ContractError, Line, LineSink, TokenTcpConfig, TokenTcpEndpoint};

use super::link::{write_counted, Dial, Link};

/// Live token TCP connection
pub enum TokenConn {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncWrite for TokenConn {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_flush(cx),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Client TLS config trusting the bundled web PKI roots
fn tls_connector() -> Result<TlsConnector, ContractError> {
    let roots = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| ContractError::Other(format!("TLS setup failed: {e}")))?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(TlsConnector::from(Arc::new(config)))
}

/// Dials a token TCP endpoint within its connect timeout
pub struct TokenTcpDialer {
    endpoint: TokenTcpEndpoint,
    tls: Option<TlsConnector>,
}

impl TokenTcpDialer {
    /// # Errors
    /// Returns an error when the TLS client cannot be set up
    pub fn new(endpoint: TokenTcpEndpoint) -> Result<Self, ContractError> {
        let tls = if endpoint.tls { Some(tls_connector()?) } else { None };
        Ok(Self { endpoint, tls })
    }

    async fn connect(&self) -> io::Result<TokenConn> {
        let stream = TcpStream::connect(&self.endpoint.address).await?;
        let Some(connector) = &self.tls else {
            return Ok(TokenConn::Plain(stream));
        };

        let server_name = ServerName::try_from(self.endpoint.server_name.clone())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let stream = connector.connect(server_name, stream).await?;
        Ok(TokenConn::Tls(Box::new(stream)))
    }
}

impl Dial for TokenTcpDialer {
    type Conn = TokenConn;

    fn describe(&self) -> String {
        format!("token-based TCP endpoint {}", self.endpoint.address)
    }

    async fn dial(&mut self) -> io::Result<TokenConn> {
        // Covers the TLS handshake as well
        tokio::time::timeout(self.endpoint.timeout, self.connect())
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))?
    }
}

/// Sink framing each line with an ingestion token
pub struct TokenTcpSink<D: Dial = TokenTcpDialer> {
    name: String,
    link: Link<D>,
    /// `token` followed by a space
    prefix: Vec<u8>,
}

impl TokenTcpSink<TokenTcpDialer> {
    /// Sink for `config`; connects lazily on first flush
    ///
    /// # Errors
    /// Returns a validation error for a malformed URL, or a TLS setup error
    pub fn new(config: &TokenTcpConfig) -> Result<Self, ContractError> {
        let endpoint = config.endpoint()?;
        let token = endpoint.token.clone();
        Ok(Self::with_dialer(TokenTcpDialer::new(endpoint)?, &token))
    }
}

impl<D: Dial> TokenTcpSink<D> {
    pub fn with_dialer(dialer: D, token: &str) -> Self {
        let name = dialer.describe();
        let mut prefix = Vec::with_capacity(token.len() + 1);
        prefix.extend_from_slice(token.as_bytes());
        prefix.push(b' ');

        Self {
            link: Link::new(name.clone(), dialer),
            name,
            prefix,
        }
    }

    fn frame(&self, batch: &[Line]) -> Vec<u8> {
        let size = batch.iter().map(|l| self.prefix.len() + l.len() + 1).sum();
        let mut payload = Vec::with_capacity(size);
        for line in batch {
            payload.extend_from_slice(&self.prefix);
            payload.extend_from_slice(line);
            payload.push(b'\n');
        }
        payload
    }
}

impl<D: Dial> LineSink for TokenTcpSink<D> {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "token_tcp_sink_flush",
        skip(self, batch),
        fields(sink = %self.name, lines = batch.len())
    )]
    async fn flush(&mut self, batch: Vec<Line>) -> Result<(), ContractError> {
        let payload = self.frame(&batch);
        let mut retried = false;

        loop {
            let conn = self.link.connection().await?;
            let (written, result) = write_counted(conn, &payload).await;

            let Err(e) = result else {
                return Ok(());
            };

            if !retried && written == 0 {
                retried = true;
                warn!(
                    sink = %self.name,
                    error = %e,
                    "Failed to send data to {} - reconnecting...",
                    self.link.destination()
                );
                // The whole payload is resent on the new connection
                self.link.reconnect().await?;
                continue;
            }

            error!(
                sink = %self.name,
                error = %e,
                written,
                "Failed to send data to {}",
                self.link.destination()
            );
            self.link.teardown();
            return Err(ContractError::sink_write(&self.name, e.to_string()));
        }
    }

    #[instrument(name = "token_tcp_sink_close", skip(self), fields(sink = %self.name))]
    async fn close(&mut self) {
        self.link.close().await;
        debug!(sink = %self.name, "TokenTcpSink closed");
    }
}
