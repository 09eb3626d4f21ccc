//! Mock output and error handler
//!
//! In-memory stand-ins used by tests to observe what the supervisor sinks
//! and reports.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use contracts::{BoxFuture, ContractError, ErrorHandler, ErrorRecord, Line, Output};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Lines captured by a [`MockOutput`]
#[derive(Debug, Clone, Default)]
pub struct CapturedLines {
    lines: Arc<Mutex<Vec<Line>>>,
    closed: Arc<Mutex<bool>>,
}

impl CapturedLines {
    pub fn lines(&self) -> Vec<Line> {
        lock(&self.lines).clone()
    }

    pub fn is_closed(&self) -> bool {
        *lock(&self.closed)
    }
}

/// Output keeping every line in memory
#[derive(Debug, Default)]
pub struct MockOutput {
    captured: CapturedLines,
}

impl MockOutput {
    pub fn new() -> (Self, CapturedLines) {
        let output = Self::default();
        let captured = output.captured.clone();
        (output, captured)
    }
}

impl Output for MockOutput {
    fn sink(&self, line: Line) {
        if !self.captured.is_closed() {
            lock(&self.captured.lines).push(line);
        }
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        *lock(&self.captured.closed) = true;
        Box::pin(async {})
    }
}

/// Records handed to a [`MockErrorHandler`]
#[derive(Debug, Clone, Default)]
pub struct CapturedRecords {
    records: Arc<Mutex<Vec<ErrorRecord>>>,
}

impl CapturedRecords {
    pub fn records(&self) -> Vec<ErrorRecord> {
        lock(&self.records).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Error handler keeping every record, optionally failing each call
#[derive(Debug, Default)]
pub struct MockErrorHandler {
    captured: CapturedRecords,
    failure: Option<String>,
}

impl MockErrorHandler {
    pub fn new() -> (Self, CapturedRecords) {
        let handler = Self::default();
        let captured = handler.captured.clone();
        (handler, captured)
    }

    /// Handler that records nothing and fails with `message`
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            captured: CapturedRecords::default(),
            failure: Some(message.into()),
        }
    }
}

impl ErrorHandler for MockErrorHandler {
    fn name(&self) -> &str {
        "mock"
    }

    fn handle<'a>(&'a self, record: &'a ErrorRecord) -> BoxFuture<'a, Result<(), ContractError>> {
        Box::pin(async move {
            if let Some(message) = &self.failure {
                return Err(ContractError::error_handler("mock", message.clone()));
            }
            lock(&self.captured.records).push(record.clone());
            Ok(())
        })
    }
}
