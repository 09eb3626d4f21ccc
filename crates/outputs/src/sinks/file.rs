//! FileSink - appends lines to a file or to this process's stdout/stderr

use std::fs::OpenOptions;
use std::path::Path;

use tokio::io::AsyncWriteExt;
use tracing::{debug, error, instrument};

use contracts::{ContractError, Line, LineSink};

enum Target {
    Stdout(tokio::io::Stdout),
    Stderr(tokio::io::Stderr),
    File(tokio::fs::File),
}

/// Sink writing newline-terminated lines to a file-like target
pub struct FileSink {
    name: String,
    target: Option<Target>,
}

impl FileSink {
    /// Sink on this process's standard output
    pub fn stdout() -> Self {
        Self {
            name: "stdout".to_string(),
            target: Some(Target::Stdout(tokio::io::stdout())),
        }
    }

    /// Sink on this process's standard error
    pub fn stderr() -> Self {
        Self {
            name: "stderr".to_string(),
            target: Some(Target::Stderr(tokio::io::stderr())),
        }
    }

    /// Open `path` for appending, creating it if missing
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            name: format!("file:{}", path.display()),
            target: Some(Target::File(tokio::fs::File::from_std(file))),
        })
    }

    async fn write_batch(&mut self, payload: &[u8]) -> std::io::Result<()> {
        match &mut self.target {
            Some(Target::Stdout(out)) => {
                out.write_all(payload).await?;
                out.flush().await
            }
            Some(Target::Stderr(err)) => {
                err.write_all(payload).await?;
                err.flush().await
            }
            Some(Target::File(file)) => {
                file.write_all(payload).await?;
                file.sync_data().await
            }
            None => Err(std::io::Error::other("sink closed")),
        }
    }
}

/// Join lines with `\n`, terminating the last one too
fn join_lines(batch: &[Line]) -> Vec<u8> {
    let size = batch.iter().map(|l| l.len() + 1).sum();
    let mut payload = Vec::with_capacity(size);
    for line in batch {
        payload.extend_from_slice(line);
        payload.push(b'\n');
    }
    payload
}

impl LineSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_flush",
        skip(self, batch),
        fields(sink = %self.name, lines = batch.len())
    )]
    async fn flush(&mut self, batch: Vec<Line>) -> Result<(), ContractError> {
        let payload = join_lines(&batch);
        self.write_batch(&payload).await.map_err(|e| {
            error!(sink = %self.name, error = %e, "Write failed");
            ContractError::sink_write(&self.name, e.to_string())
        })
    }

    #[instrument(name = "file_sink_close", skip(self), fields(sink = %self.name))]
    async fn close(&mut self) {
        // Standard streams are flushed but never closed
        let result = match self.target.take() {
            Some(Target::Stdout(mut out)) => out.flush().await,
            Some(Target::Stderr(mut err)) => err.flush().await,
            Some(Target::File(file)) => file.sync_all().await,
            None => Ok(()),
        };
        if let Err(e) = result {
            debug!(sink = %self.name, error = %e, "Sync on close failed");
        }
        debug!(sink = %self.name, "FileSink closed");
    }
}
