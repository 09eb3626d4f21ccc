//! OutputSet - fan-out of every line to all configured outputs

use tracing::{debug, info, instrument};

use contracts::{Line, Output, OutputConfig};

use crate::draining::DrainingOutput;
use crate::error::OutputError;
use crate::sinks::{FileSink, SyslogSink, TokenTcpSink};

/// Every output a run writes to
#[derive(Default)]
pub struct OutputSet {
    outputs: Vec<Box<dyn Output>>,
}

impl OutputSet {
    pub fn new(outputs: Vec<Box<dyn Output>>) -> Self {
        Self { outputs }
    }

    /// Build one draining output per config entry
    ///
    /// # Errors
    /// Returns the first output that cannot be created; outputs created
    /// before it are closed again
    #[instrument(name = "output_set_from_configs", skip(configs), fields(outputs = configs.len()))]
    pub async fn from_configs(
        configs: &[OutputConfig],
        buffer_size: usize,
    ) -> Result<Self, OutputError> {
        let mut set = Self::default();
        for config in configs {
            match create_output(config, buffer_size) {
                Ok(output) => set.push(output),
                Err(e) => {
                    set.close().await;
                    return Err(e);
                }
            }
        }
        info!(outputs = set.len(), buffer_size, "Outputs ready");
        Ok(set)
    }

    pub fn push(&mut self, output: Box<dyn Output>) {
        self.outputs.push(output);
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Hand `line` to every output; never blocks
    pub fn sink(&self, line: &Line) {
        for output in &self.outputs {
            output.sink(line.clone());
        }
    }

    /// Close outputs one after another, waiting for each to finish
    #[instrument(name = "output_set_close", skip(self), fields(outputs = self.outputs.len()))]
    pub async fn close(self) {
        for mut output in self.outputs {
            output.close().await;
        }
        debug!("All outputs closed");
    }
}

/// Create a draining output from configuration
///
/// Network outputs connect lazily, so this does no I/O beyond opening files.
/// Must be called within a Tokio runtime.
///
/// # Errors
/// Returns an error when a file cannot be opened or a config is invalid
#[instrument(name = "create_output", skip(config), fields(output = %config.label()))]
pub fn create_output(
    config: &OutputConfig,
    buffer_size: usize,
) -> Result<Box<dyn Output>, OutputError> {
    let output = match config {
        OutputConfig::Stdout => DrainingOutput::spawn(FileSink::stdout(), buffer_size),
        OutputConfig::Stderr => DrainingOutput::spawn(FileSink::stderr(), buffer_size),
        OutputConfig::File { path } => {
            let sink = FileSink::open(path)
                .map_err(|e| OutputError::sink_creation(config.label(), e.to_string()))?;
            DrainingOutput::spawn(sink, buffer_size)
        }
        OutputConfig::Syslog(syslog) => {
            DrainingOutput::spawn(SyslogSink::new(syslog)?, buffer_size)
        }
        OutputConfig::TokenTcp(token_tcp) => {
            DrainingOutput::spawn(TokenTcpSink::new(token_tcp)?, buffer_size)
        }
    };
    Ok(Box::new(output))
}
