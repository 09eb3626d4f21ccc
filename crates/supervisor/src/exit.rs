//! Exit classification

use std::fmt;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

use nix::sys::signal::Signal;

/// Status used when there is no exit code to pass on
pub const FAILURE_STATUS: i32 = 1;

/// Shell convention for death by signal: 128 + signal number
const SIGNAL_STATUS_BASE: i32 = 128;

/// How the child ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitKind {
    /// Exit code 0
    Success,
    /// Killed by the signal the supervisor last relayed to it
    Relayed(Signal),
    /// Never started
    StartFailed { error: String },
    /// Any other ending
    Abnormal { description: String },
}

/// Classified child ending and the status to exit with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitOutcome {
    pub status: i32,
    pub kind: ExitKind,
}

impl ExitOutcome {
    pub fn start_failed(error: &impl fmt::Display) -> Self {
        Self {
            status: FAILURE_STATUS,
            kind: ExitKind::StartFailed {
                error: error.to_string(),
            },
        }
    }

    pub fn wait_failed(error: &io::Error) -> Self {
        Self {
            status: FAILURE_STATUS,
            kind: ExitKind::Abnormal {
                description: format!("failed to wait for process: {error}"),
            },
        }
    }

    /// Whether this ending is reported
    pub fn is_unexpected(&self) -> bool {
        matches!(self.kind, ExitKind::StartFailed { .. } | ExitKind::Abnormal { .. })
    }

    /// Description handed to error handlers, for unexpected endings
    pub fn description(&self) -> Option<String> {
        match &self.kind {
            ExitKind::StartFailed { error } => Some(format!("unable to start process: {error}")),
            ExitKind::Abnormal { description } => Some(description.clone()),
            ExitKind::Success | ExitKind::Relayed(_) => None,
        }
    }

    /// Line sunk to every output, for unexpected endings
    pub fn report_line(&self) -> Option<String> {
        match &self.kind {
            ExitKind::StartFailed { error } => Some(format!("Unable to start process: {error}")),
            ExitKind::Abnormal { description } => {
                Some(format!("Process exited abnormally: {description}"))
            }
            ExitKind::Success | ExitKind::Relayed(_) => None,
        }
    }
}

/// Classify a wait status given the last signal relayed to the child
pub fn classify(status: ExitStatus, last_relayed: Option<Signal>) -> ExitOutcome {
    if let Some(code) = status.code() {
        let kind = if code == 0 {
            ExitKind::Success
        } else {
            ExitKind::Abnormal {
                description: format!("exit status {code}"),
            }
        };
        return ExitOutcome { status: code, kind };
    }

    let Some(raw) = status.signal() else {
        return ExitOutcome {
            status: FAILURE_STATUS,
            kind: ExitKind::Abnormal {
                description: format!("unknown wait status {}", status.into_raw()),
            },
        };
    };

    let status = SIGNAL_STATUS_BASE + raw;
    match Signal::try_from(raw) {
        Ok(signal) if Some(signal) == last_relayed => ExitOutcome {
            status,
            kind: ExitKind::Relayed(signal),
        },
        Ok(signal) => ExitOutcome {
            status,
            kind: ExitKind::Abnormal {
                description: format!("signal: {}", signal.as_str()),
            },
        },
        Err(_) => ExitOutcome {
            status,
            kind: ExitKind::Abnormal {
                description: format!("signal: {raw}"),
            },
        },
    }
}
