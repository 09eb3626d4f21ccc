//! Error records handed to error handlers on abnormal exit

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{BoxFuture, ContractError};

/// Description of one abnormal child exit
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    /// Command argument vector
    pub command: Vec<String>,
    /// Human-readable description
    pub description: String,
    /// Hostname, empty when unknown
    pub hostname: String,
    /// Environment snapshot
    pub environment: BTreeMap<String, String>,
    /// When the event happened
    pub timestamp: DateTime<Utc>,
}

impl ErrorRecord {
    /// Command line with parts quoted where needed, joined by spaces
    ///
    /// A part is quoted when it holds any character outside `*`..=`_` and
    /// `a`..=`z`. Inside quotes `"` and `\` are escaped with a backslash.
    pub fn quoted_command(&self) -> String {
        self.command
            .iter()
            .map(|part| quote_part(part))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn needs_quoting(part: &str) -> bool {
    part.chars()
        .any(|c| !matches!(c, '*'..='_') && !c.is_ascii_lowercase())
}

fn quote_part(part: &str) -> String {
    if !needs_quoting(part) {
        return part.to_string();
    }

    let mut quoted = String::with_capacity(part.len() + 2);
    quoted.push('"');
    for c in part.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Receiver of error records
pub trait ErrorHandler: Send + Sync {
    /// Handler name (used for logging)
    fn name(&self) -> &str;

    /// Deliver a record
    ///
    /// # Errors
    /// Returns why the record could not be delivered
    fn handle<'a>(&'a self, record: &'a ErrorRecord) -> BoxFuture<'a, Result<(), ContractError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(command: &[&str]) -> ErrorRecord {
        ErrorRecord {
            command: command.iter().map(|s| s.to_string()).collect(),
            description: "exit status 1".to_string(),
            hostname: String::new(),
            environment: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_plain_parts_are_not_quoted() {
        let r = record(&["/usr/bin/env", "python3", "-m", "app.main"]);
        assert_eq!(r.quoted_command(), "/usr/bin/env python3 -m app.main");
    }

    #[test]
    fn test_parts_with_spaces_are_quoted() {
        let r = record(&["echo", "hello world", "Value", "a~b"]);
        assert_eq!(r.quoted_command(), r#"echo "hello world" Value "a~b""#);
    }

    #[test]
    fn test_quotes_and_backslashes_are_escaped() {
        let r = record(&["sh", r#"say "hi"\n"#]);
        assert_eq!(r.quoted_command(), r#"sh "say \"hi\"\\n""#);
    }

    #[test]
    fn test_record_serializes_timestamp() {
        let r = record(&["true"]);
        let json = serde_json::to_value(&r).unwrap();
        assert!(json["timestamp"].is_string());
        assert_eq!(json["command"][0], "true");
    }
}
