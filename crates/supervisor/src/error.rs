//! Supervisor error types

use std::io;

use thiserror::Error;

/// Errors raised while starting or supervising the child
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Empty argument vector
    #[error("no command specified")]
    EmptyCommand,

    /// The child could not be spawned
    #[error("{0}")]
    Spawn(#[source] io::Error),

    /// A child pipe was not available after spawning
    #[error("failed to set up {stream} pipe")]
    Pipe { stream: &'static str },

    /// A signal listener could not be installed
    #[error("failed to listen for {signal}: {source}")]
    SignalListener {
        signal: &'static str,
        #[source]
        source: io::Error,
    },
}
