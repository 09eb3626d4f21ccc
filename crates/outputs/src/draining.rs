//! DrainingOutput - non-blocking output with an isolated sink task
//!
//! Lines are handed to a dedicated task over an unbounded queue. The task
//! moves them into a [`RingBuffer`] and flushes the buffer as one batch while
//! it goes on accepting lines, so a slow destination sheds its oldest lines
//! instead of blocking producers. The ring buffer is the only place lines are
//! dropped while the output is open.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument};

use contracts::{BoxFuture, ContractError, Line, LineSink, Output};

use crate::buffer::RingBuffer;
use crate::metrics::SinkMetrics;

/// Lifecycle of a draining output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputState {
    /// Accepting lines
    Open,
    /// Close requested, final flush in progress
    Draining,
    /// Destination released
    Closed,
}

/// Output that buffers lines and drains them to a [`LineSink`] on its own task
pub struct DrainingOutput {
    /// Sink name
    name: String,
    /// Channel to the sink task, `None` once closing
    tx: Option<mpsc::UnboundedSender<Line>>,
    /// Shared metrics
    metrics: Arc<SinkMetrics>,
    /// Sink task handle, `None` once closed
    worker_handle: Option<JoinHandle<()>>,
}

impl DrainingOutput {
    /// Spawn the sink task; `buffer_size` bounds the lines retained per flush cycle
    pub fn spawn<S: LineSink + Send + 'static>(sink: S, buffer_size: usize) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::unbounded_channel();
        let metrics = Arc::new(SinkMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();

        let worker_handle = tokio::spawn(async move {
            drain_loop(sink, rx, buffer_size, worker_metrics, worker_name).await;
        });

        Self {
            name,
            tx: Some(tx),
            metrics,
            worker_handle: Some(worker_handle),
        }
    }

    /// Get sink name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    pub fn state(&self) -> OutputState {
        match (&self.tx, &self.worker_handle) {
            (Some(_), _) => OutputState::Open,
            (None, Some(_)) => OutputState::Draining,
            (None, None) => OutputState::Closed,
        }
    }

    /// Stop accepting lines and wait for the sink task to flush and release
    #[instrument(name = "draining_output_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(&mut self) {
        // Dropping the sender ends the task's receive loop
        drop(self.tx.take());

        if let Some(handle) = self.worker_handle.take() {
            if let Err(e) = handle.await {
                error!(sink = %self.name, error = ?e, "Sink task panicked");
            }
            debug!(sink = %self.name, metrics = ?self.metrics.snapshot(), "Output closed");
        }
    }
}

impl Output for DrainingOutput {
    fn sink(&self, line: Line) {
        let Some(tx) = &self.tx else {
            self.metrics.inc_rejected_lines();
            return;
        };

        match tx.send(line) {
            Ok(()) => self.metrics.inc_accepted_lines(),
            Err(_) => {
                self.metrics.inc_rejected_lines();
                error!(sink = %self.name, "Sink task stopped unexpectedly");
            }
        }
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(self.shutdown())
    }
}

/// Sink task: buffer, flush one batch at a time, keep buffering meanwhile
#[instrument(
    name = "draining_output_loop",
    skip(sink, rx, metrics, name),
    fields(sink = %name)
)]
async fn drain_loop<S: LineSink>(
    mut sink: S,
    mut rx: mpsc::UnboundedReceiver<Line>,
    buffer_size: usize,
    metrics: Arc<SinkMetrics>,
    name: String,
) {
    debug!(sink = %name, buffer_size, "Sink task started");

    let mut lines = RingBuffer::new(buffer_size);

    loop {
        // Lines buffered during the previous flush go out right away
        if lines.is_empty() {
            match rx.recv().await {
                Some(line) => buffer_line(&mut lines, line, &metrics),
                None => break,
            }
        }

        while !lines.is_full() {
            match rx.try_recv() {
                Ok(line) => buffer_line(&mut lines, line, &metrics),
                Err(_) => break,
            }
        }

        let batch = lines.drain();
        let (result, open) =
            flush_while_buffering(&mut sink, batch, &mut rx, &mut lines, &metrics).await;
        record_flush(&name, result, &metrics);

        if !open {
            break;
        }
    }

    // Queue closed: whatever arrived during the last flush
    if !lines.is_empty() {
        let batch = lines.drain();
        let count = batch.len();
        record_flush(&name, sink.flush(batch).await.map(|()| count), &metrics);
    }

    sink.close().await;

    debug!(sink = %name, "Sink task stopped");
}

/// Run one flush while still receiving into `lines`
///
/// Returns the flush result (line count on success) and whether the queue is
/// still open.
async fn flush_while_buffering<S: LineSink>(
    sink: &mut S,
    batch: Vec<Line>,
    rx: &mut mpsc::UnboundedReceiver<Line>,
    lines: &mut RingBuffer<Line>,
    metrics: &SinkMetrics,
) -> (Result<usize, ContractError>, bool) {
    let count = batch.len();
    let flush = sink.flush(batch);
    tokio::pin!(flush);

    let mut open = true;
    loop {
        tokio::select! {
            // A finished flush wins over new lines so a fast sink never evicts
            biased;

            result = &mut flush => return (result.map(|()| count), open),
            received = rx.recv(), if open => match received {
                Some(line) => buffer_line(lines, line, metrics),
                None => open = false,
            },
        }
    }
}

fn buffer_line(lines: &mut RingBuffer<Line>, line: Line, metrics: &SinkMetrics) {
    if lines.add(line) {
        metrics.inc_evicted_lines();
    }
}

fn record_flush(name: &str, result: Result<usize, ContractError>, metrics: &SinkMetrics) {
    match result {
        Ok(count) => metrics.record_flush(count),
        Err(e) => {
            metrics.inc_failed_flushes();
            debug!(sink = %name, error = %e, "Flush failed, batch dropped");
        }
    }
}
