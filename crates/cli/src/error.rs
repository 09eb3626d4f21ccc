//! Error types for CLI operations.

use std::path::PathBuf;

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file could not be loaded
    #[error("Failed to load configuration from {path}: {source}")]
    ConfigLoad {
        path: PathBuf,
        #[source]
        source: contracts::ContractError,
    },

    /// Merged configuration is invalid
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(#[source] contracts::ContractError),

    /// An error handler could not be built
    #[error("Failed to set up error handlers: {0}")]
    ErrorHandlers(#[source] contracts::ContractError),

    /// An output could not be created
    #[error("Failed to set up outputs: {0}")]
    Outputs(#[from] outputs::OutputError),
}

pub type Result<T> = std::result::Result<T, CliError>;
