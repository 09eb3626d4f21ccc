//! # Contracts
//!
//! Interface contracts shared by every crate in the workspace.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Data flow
//! - Child process bytes are tokenized into [`Line`]s
//! - Each line is handed to every [`Output`] without blocking
//! - Outputs batch lines and flush them through a [`LineSink`]
//! - Abnormal exits become an [`ErrorRecord`] handed to every [`ErrorHandler`]

mod config;
mod error;
mod error_record;
mod output;

pub use config::*;
pub use error::*;
pub use error_record::{ErrorHandler, ErrorRecord};
pub use output::*;
