//! Lazily connected, reconnecting link used by the network sinks

use std::future::Future;
use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{error, info};

use contracts::ContractError;

/// Opens connections to one destination
pub trait Dial: Send {
    /// Connection type produced by [`Dial::dial`]
    type Conn: AsyncWrite + Unpin + Send;

    /// Human-readable destination, e.g. `syslog at udp://host:514`
    fn describe(&self) -> String;

    /// Open a fresh connection
    fn dial(&mut self) -> impl Future<Output = io::Result<Self::Conn>> + Send;
}

/// Connection state of a link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connected,
    /// Disconnected after a failure; connect errors are not logged again
    Failing,
}

/// Optional live connection plus failure-streak bookkeeping
pub struct Link<D: Dial> {
    sink_name: String,
    destination: String,
    dialer: D,
    conn: Option<D::Conn>,
    failing: bool,
}

impl<D: Dial> Link<D> {
    pub fn new(sink_name: impl Into<String>, dialer: D) -> Self {
        let destination = dialer.describe();
        Self {
            sink_name: sink_name.into(),
            destination,
            dialer,
            conn: None,
            failing: false,
        }
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn state(&self) -> LinkState {
        match (&self.conn, self.failing) {
            (Some(_), _) => LinkState::Connected,
            (None, true) => LinkState::Failing,
            (None, false) => LinkState::Disconnected,
        }
    }

    /// Return the live connection, dialing first if there is none
    ///
    /// # Errors
    /// Returns a connection error when dialing fails
    pub async fn connection(&mut self) -> Result<&mut D::Conn, ContractError> {
        if self.conn.is_none() {
            self.connect().await?;
        }

        self.conn
            .as_mut()
            .ok_or_else(|| ContractError::sink_connection(&self.sink_name, "not connected"))
    }

    /// Drop the current connection and dial again
    ///
    /// # Errors
    /// Returns a connection error when dialing fails
    pub async fn reconnect(&mut self) -> Result<(), ContractError> {
        self.conn = None;
        self.connect().await
    }

    /// Drop the connection after a write failure
    pub fn teardown(&mut self) {
        self.conn = None;
        self.failing = true;
    }

    /// Shut the connection down, if any
    pub async fn close(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            let _ = conn.shutdown().await;
        }
    }

    async fn connect(&mut self) -> Result<(), ContractError> {
        match self.dialer.dial().await {
            Ok(conn) => {
                if self.failing {
                    info!(sink = %self.sink_name, "Connected to {}", self.destination);
                    self.failing = false;
                }
                self.conn = Some(conn);
                Ok(())
            }
            Err(e) => {
                if !self.failing {
                    error!(
                        sink = %self.sink_name,
                        error = %e,
                        "Failed to connect to {}",
                        self.destination
                    );
                    self.failing = true;
                }
                Err(ContractError::sink_connection(
                    &self.sink_name,
                    format!("failed to connect to {}: {e}", self.destination),
                ))
            }
        }
    }
}

/// Write all of `buf`, reporting how many bytes went out before any error
pub async fn write_counted<W: AsyncWrite + Unpin>(
    w: &mut W,
    buf: &[u8],
) -> (usize, io::Result<()>) {
    let mut written = 0;
    while written < buf.len() {
        match w.write(&buf[written..]).await {
            Ok(0) => return (written, Err(io::ErrorKind::WriteZero.into())),
            Ok(n) => written += n,
            Err(e) => return (written, Err(e)),
        }
    }
    (written, w.flush().await)
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[tokio::test]
    async fn test_failing_state_clears_on_connect() {
        let dialer = ScriptedDialer::new(vec![None, None, Some(vec![])]);
        let mut link = Link::new("test", dialer);
        assert_eq!(link.state(), LinkState::Disconnected);

        assert!(link.connection().await.is_err());
        assert_eq!(link.state(), LinkState::Failing);
        assert!(link.connection().await.is_err());
        assert_eq!(link.state(), LinkState::Failing);

        assert!(link.connection().await.is_ok());
        assert_eq!(link.state(), LinkState::Connected);

        link.teardown();
        assert_eq!(link.state(), LinkState::Failing);
    }

    #[tokio::test]
    async fn test_write_counted_reports_partial_progress() {
        let dialer = ScriptedDialer::new(vec![Some(vec![Step::Partial(2), Step::Fail])]);
        let received = std::sync::Arc::clone(&dialer.received);
        let mut link = Link::new("test", dialer);

        let conn = link.connection().await.unwrap();
        let (n, result) = write_counted(conn, b"hello").await;
        assert_eq!(n, 2);
        assert!(result.is_err());
        assert_eq!(received.lock().unwrap().as_slice(), &[(1, b"he".to_vec())]);
    }
}
