//! Signal relay: forward signals received by this process to the child

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::SupervisorError;

/// Signals forwarded to the child
///
/// SIGILL, SIGFPE and SIGSEGV are left out: they cannot be caught safely.
pub const RELAYED_SIGNALS: [Signal; 9] = [
    Signal::SIGABRT,
    Signal::SIGALRM,
    Signal::SIGHUP,
    Signal::SIGINT,
    Signal::SIGPIPE,
    Signal::SIGQUIT,
    Signal::SIGTERM,
    Signal::SIGUSR1,
    Signal::SIGUSR2,
];

const SIGNAL_QUEUE_CAPACITY: usize = 16;

/// Install listeners for [`RELAYED_SIGNALS`]
///
/// Returns the receiving end of the queue they feed and the listener tasks.
///
/// # Errors
/// Fails if any listener cannot be registered
pub fn listen() -> Result<(mpsc::Receiver<Signal>, Vec<JoinHandle<()>>), SupervisorError> {
    let (tx, rx) = mpsc::channel(SIGNAL_QUEUE_CAPACITY);
    let mut listeners = Vec::with_capacity(RELAYED_SIGNALS.len());

    for sig in RELAYED_SIGNALS {
        let mut stream = match signal(SignalKind::from_raw(sig as i32)) {
            Ok(stream) => stream,
            Err(source) => {
                listeners.iter().for_each(JoinHandle::abort);
                return Err(SupervisorError::SignalListener {
                    signal: sig.as_str(),
                    source,
                });
            }
        };
        let tx = tx.clone();
        listeners.push(tokio::spawn(async move {
            while stream.recv().await.is_some() {
                if tx.send(sig).await.is_err() {
                    break;
                }
            }
        }));
    }

    Ok((rx, listeners))
}

/// Running relay task
pub struct SignalRelay {
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<Option<Signal>>,
}

impl SignalRelay {
    /// Relay every signal arriving on `rx` to `pid`
    ///
    /// `listeners` are aborted when the relay stops.
    pub fn spawn(pid: Pid, mut rx: mpsc::Receiver<Signal>, listeners: Vec<JoinHandle<()>>) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let mut last = None;
            let mut open = true;

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    received = rx.recv(), if open => match received {
                        Some(sig) => {
                            // Recorded first: the child may be gone before kill returns
                            last = Some(sig);
                            info!(signal = sig.as_str(), pid = pid.as_raw(), "Relaying signal");
                            if let Err(e) = kill(pid, sig) {
                                warn!(signal = sig.as_str(), error = %e, "Failed to relay signal");
                            }
                        }
                        None => open = false,
                    },
                }
            }

            listeners.iter().for_each(JoinHandle::abort);
            debug!(last = ?last, "Signal relay stopped");
            last
        });

        Self { stop_tx, handle }
    }

    /// Stop relaying and return the last signal forwarded
    pub async fn stop(self) -> Option<Signal> {
        let _ = self.stop_tx.send(());
        match self.handle.await {
            Ok(last) => last,
            Err(e) => {
                warn!(error = %e, "Signal relay task failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use std::process::Stdio;
    use tokio::process::Command;

    #[tokio::test]
    async fn test_relays_to_child_and_reports_last_signal() {
        let mut child = Command::new("sleep")
            .arg("30")
            .stdin(Stdio::null())
            .spawn()
            .unwrap();
        let pid = Pid::from_raw(child.id().unwrap() as i32);

        let (tx, rx) = mpsc::channel(4);
        let relay = SignalRelay::spawn(pid, rx, Vec::new());

        tx.send(Signal::SIGUSR1).await.unwrap();
        let status = child.wait().await.unwrap();
        let last = relay.stop().await;

        assert_eq!(status.signal(), Some(Signal::SIGUSR1 as i32));
        assert_eq!(last, Some(Signal::SIGUSR1));
    }

    #[tokio::test]
    async fn test_stop_without_signals() {
        let (_tx, rx) = mpsc::channel(4);
        let relay = SignalRelay::spawn(Pid::from_raw(i32::MAX), rx, Vec::new());
        assert_eq!(relay.stop().await, None);
    }

    #[tokio::test]
    async fn test_closed_queue_waits_for_stop() {
        let (tx, rx) = mpsc::channel(4);
        drop(tx);
        let relay = SignalRelay::spawn(Pid::from_raw(i32::MAX), rx, Vec::new());
        assert_eq!(relay.stop().await, None);
    }

    #[test]
    fn test_relayed_set_excludes_synchronous_signals() {
        for sig in [Signal::SIGILL, Signal::SIGFPE, Signal::SIGSEGV, Signal::SIGKILL] {
            assert!(!RELAYED_SIGNALS.contains(&sig));
        }
    }
}
