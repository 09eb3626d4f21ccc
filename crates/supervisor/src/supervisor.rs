//! Supervisor - runs the child and ties pipes, signals, outputs and
//! error handlers together
//!
//! Lifecycle: [`PreparedCommand`] (not started) → [`RunningChild`] → [`ExitOutcome`].

use std::process::Stdio;
use std::sync::Arc;

use bytes::Bytes;
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use contracts::ErrorHandler;
use outputs::OutputSet;

use crate::error::SupervisorError;
use crate::exit::{classify, ExitOutcome};
use crate::report;
use crate::signals::{self, SignalRelay};
use crate::tokenizer::drain_lines;

/// Where relayed signals come from
#[derive(Debug, Default)]
pub enum SignalSource {
    /// Signals delivered to this process
    #[default]
    Os,
    /// Signals pushed on a channel
    Channel(mpsc::Receiver<Signal>),
    /// Nothing is relayed
    Disabled,
}

/// Child not started yet
#[derive(Debug, Clone)]
pub struct PreparedCommand {
    argv: Vec<String>,
}

impl PreparedCommand {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Spawn with stdin on the null device and both output streams piped
    ///
    /// # Errors
    /// Returns an error for an empty command, a spawn failure or a missing pipe
    pub fn spawn(&self) -> Result<RunningChild, SupervisorError> {
        let (program, args) = self.argv.split_first().ok_or(SupervisorError::EmptyCommand)?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(SupervisorError::Spawn)?;

        let pipes = child.stdout.take().zip(child.stderr.take());
        let Some((stdout, stderr)) = pipes else {
            let _ = child.start_kill();
            return Err(SupervisorError::Pipe { stream: "output" });
        };

        Ok(RunningChild {
            pid: child.id().map(|id| Pid::from_raw(id as i32)),
            child,
            stdout,
            stderr,
        })
    }
}

/// Started child with its pipes
pub struct RunningChild {
    child: Child,
    pid: Option<Pid>,
    stdout: ChildStdout,
    stderr: ChildStderr,
}

impl RunningChild {
    /// Relay signals, drain both pipes and wait for the child
    ///
    /// Returns once the child has exited and both pipes reached end of stream.
    #[instrument(name = "supervise_child", skip_all, fields(pid = ?self.pid))]
    pub async fn supervise(
        mut self,
        outputs: &Arc<OutputSet>,
        signals: SignalSource,
    ) -> ExitOutcome {
        let relay = self.start_relay(signals);

        let stdout_task = spawn_tokenizer("stdout", self.stdout, Arc::clone(outputs));
        let stderr_task = spawn_tokenizer("stderr", self.stderr, Arc::clone(outputs));

        let waited = self.child.wait().await;

        // Stop relaying before the pipes finish so a late signal cannot
        // change how this exit is classified
        let last_relayed = match relay {
            Some(relay) => relay.stop().await,
            None => None,
        };

        for (stream, task) in [("stdout", stdout_task), ("stderr", stderr_task)] {
            match task.await {
                Ok(lines) => debug!(stream, lines, "Pipe drained"),
                Err(e) => error!(stream, error = %e, "Pipe tokenizer failed"),
            }
        }

        match waited {
            Ok(status) => {
                debug!(status = %status, last_relayed = ?last_relayed, "Child exited");
                classify(status, last_relayed)
            }
            Err(e) => {
                error!(error = %e, "Failed to wait for child");
                ExitOutcome::wait_failed(&e)
            }
        }
    }

    fn start_relay(&self, signals: SignalSource) -> Option<SignalRelay> {
        let pid = self.pid?;
        match signals {
            SignalSource::Os => match signals::listen() {
                Ok((rx, listeners)) => Some(SignalRelay::spawn(pid, rx, listeners)),
                Err(e) => {
                    warn!(error = %e, "Signals will not be relayed");
                    None
                }
            },
            SignalSource::Channel(rx) => Some(SignalRelay::spawn(pid, rx, Vec::new())),
            SignalSource::Disabled => None,
        }
    }
}

fn spawn_tokenizer<R>(stream: &'static str, reader: R, outputs: Arc<OutputSet>) -> JoinHandle<u64>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let lines = drain_lines(reader, &outputs).await;
        debug!(stream, "Pipe closed");
        lines
    })
}

/// Runs one command to completion
pub struct Supervisor {
    command: PreparedCommand,
    outputs: OutputSet,
    handlers: Vec<Box<dyn ErrorHandler>>,
    signals: SignalSource,
}

impl Supervisor {
    pub fn new(
        command: Vec<String>,
        outputs: OutputSet,
        handlers: Vec<Box<dyn ErrorHandler>>,
    ) -> Self {
        Self {
            command: PreparedCommand::new(command),
            outputs,
            handlers,
            signals: SignalSource::Os,
        }
    }

    /// Replace where relayed signals come from
    pub fn with_signal_source(mut self, signals: SignalSource) -> Self {
        self.signals = signals;
        self
    }

    /// Run the child, report an unexpected ending and close every output
    ///
    /// Returns the status this process should exit with.
    #[instrument(name = "supervisor_run", skip(self), fields(command = ?self.command.argv()))]
    pub async fn run(self) -> i32 {
        let outputs = Arc::new(self.outputs);

        let outcome = match self.command.spawn() {
            Ok(running) => {
                info!(pid = ?running.pid, "Process started");
                running.supervise(&outputs, self.signals).await
            }
            Err(e) => {
                error!(error = %e, "Unable to start process");
                ExitOutcome::start_failed(&e)
            }
        };

        if let (Some(line), Some(description)) = (outcome.report_line(), outcome.description()) {
            outputs.sink(&Bytes::from(line));
            let record = report::capture(self.command.argv(), description);
            report::notify(&self.handlers, &record).await;
        }

        info!(status = outcome.status, kind = ?outcome.kind, "Process finished");

        match Arc::into_inner(outputs) {
            Some(outputs) => outputs.close().await,
            None => error!("Outputs still in use, skipping close"),
        }

        outcome.status
    }
}
