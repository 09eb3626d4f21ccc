//! Configuration assembly and the supervised run.

use tracing::{debug, info};

use config_loader::ConfigLoader;
use contracts::RunConfig;
use outputs::OutputSet;
use supervisor::Supervisor;

use crate::cli::Cli;
use crate::error::{CliError, Result};

/// Merge the config file (if any) with command-line outputs and overrides
///
/// Flag outputs come after config-file outputs.
pub fn build_config(cli: &Cli) -> Result<RunConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            info!(config = %path.display(), "Loading configuration");
            ConfigLoader::load_from_path(path).map_err(|source| CliError::ConfigLoad {
                path: path.clone(),
                source,
            })?
        }
        None => RunConfig::default(),
    };

    if let Some(buffer_size) = cli.buffer_size {
        config.buffer_size = buffer_size;
    }
    config.outputs.extend(cli.flag_outputs());

    ConfigLoader::validate(&config).map_err(CliError::ConfigValidation)?;

    debug!(
        outputs = config.outputs.len(),
        error_handlers = config.error_handlers.len(),
        buffer_size = config.buffer_size,
        "Configuration resolved"
    );

    Ok(config)
}

/// Run `command` under supervision and return its classified exit status
pub async fn run_command(command: Vec<String>, config: &RunConfig) -> Result<i32> {
    let handlers = error_handlers::build_handlers(&config.error_handlers)
        .map_err(CliError::ErrorHandlers)?;
    let outputs = OutputSet::from_configs(&config.outputs, config.buffer_size).await?;

    Ok(Supervisor::new(command, outputs, handlers).run().await)
}
