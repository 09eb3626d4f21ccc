//! Output and LineSink traits
//!
//! [`Output`] is what producers see: a non-blocking `sink` and an awaited `close`.
//! [`LineSink`] is what a concrete destination supplies: batch flush and release.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

use crate::ContractError;

/// One line of child output, without its line terminator.
pub type Line = Bytes;

/// Boxed future used where a trait has to stay object safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Destination for output lines
///
/// Every producer and the supervisor talk to outputs through this trait.
pub trait Output: Send + Sync {
    /// Queue a line for delivery.
    ///
    /// Must never block, however slow or unavailable the destination is.
    fn sink(&self, line: Line);

    /// Stop accepting lines, flush what is buffered and release the destination.
    ///
    /// Resolves once the destination has been released. Calling it again
    /// resolves immediately.
    fn close(&mut self) -> BoxFuture<'_, ()>;
}

/// Batch writer behind an output
///
/// All sink implementations must implement this trait.
#[trait_variant::make(LineSink: Send)]
pub trait LocalLineSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Deliver one batch of lines, in order
    ///
    /// # Errors
    /// Returns the write or connection error that ended the batch
    async fn flush(&mut self, batch: Vec<Line>) -> Result<(), ContractError>;

    /// Release the destination
    async fn close(&mut self);
}
