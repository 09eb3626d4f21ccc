//! # Supervisor
//!
//! Runs a child process and fans its output out to the configured outputs.
//!
//! Responsibilities:
//! - Spawn the child with piped stdout/stderr
//! - Tokenize both pipes into lines
//! - Relay signals received by this process to the child
//! - Classify the exit and report unexpected endings

pub mod error;
pub mod exit;
pub mod mock;
pub mod report;
pub mod signals;
pub mod supervisor;
pub mod tokenizer;

pub use error::SupervisorError;
pub use exit::{classify, ExitKind, ExitOutcome};
pub use mock::{MockErrorHandler, MockOutput};
pub use signals::{SignalRelay, RELAYED_SIGNALS};
pub use supervisor::{PreparedCommand, RunningChild, SignalSource, Supervisor};
pub use tokenizer::drain_lines;
