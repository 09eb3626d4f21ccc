//! Error records for abnormal exits

use chrono::Utc;
use tracing::{error, instrument};

use contracts::{ErrorHandler, ErrorRecord};

/// Snapshot host, environment and time for an abnormal exit
pub fn capture(command: &[String], description: impl Into<String>) -> ErrorRecord {
    let hostname = hostname::get()
        .ok()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_default();

    let environment = std::env::vars_os()
        .map(|(k, v)| (k.to_string_lossy().into_owned(), v.to_string_lossy().into_owned()))
        .collect();

    ErrorRecord {
        command: command.to_vec(),
        description: description.into(),
        hostname,
        environment,
        timestamp: Utc::now(),
    }
}

/// Hand `record` to every handler in turn; failures are logged, not returned
///
/// Returns the number of handlers that failed.
#[instrument(name = "notify_error_handlers", skip_all, fields(handlers = handlers.len()))]
pub async fn notify(handlers: &[Box<dyn ErrorHandler>], record: &ErrorRecord) -> usize {
    let mut failures = 0;
    for handler in handlers {
        if let Err(e) = handler.handle(record).await {
            error!(handler = handler.name(), error = %e, "Failed to send error message");
            failures += 1;
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockErrorHandler;

    #[test]
    fn test_capture_snapshots_environment() {
        let record = capture(&["false".to_string()], "exit status 1");
        assert_eq!(record.command, vec!["false"]);
        assert_eq!(record.description, "exit status 1");
        assert!(record.environment.contains_key("PATH"));
    }

    #[tokio::test]
    async fn test_notify_continues_after_failure() {
        let failing = MockErrorHandler::failing("down");
        let (working, records) = MockErrorHandler::new();
        let handlers: Vec<Box<dyn ErrorHandler>> = vec![Box::new(failing), Box::new(working)];

        let record = capture(&["false".to_string()], "exit status 1");
        assert_eq!(notify(&handlers, &record).await, 1);
        assert_eq!(records.len(), 1);
    }
}
