//! # Outputs
//!
//! Line delivery for drainrun.
//!
//! Responsibilities:
//! - Fan every line out to all configured outputs
//! - Buffer per output in a drop-oldest ring buffer
//! - Isolate slow destinations so producers never block

pub mod buffer;
pub mod draining;
pub mod error;
pub mod fanout;
pub mod metrics;
pub mod sinks;

pub use buffer::RingBuffer;
pub use contracts::{Line, LineSink, Output};
pub use draining::{DrainingOutput, OutputState};
pub use error::OutputError;
pub use fanout::{create_output, OutputSet};
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{FileSink, SyslogSink, TokenTcpSink};
