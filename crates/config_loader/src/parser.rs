//! Configuration parsing
//!
//! TOML (primary) and JSON (optional).

use contracts::{ContractError, RunConfig};

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML (recommended)
    Toml,
    /// JSON
    Json,
}

impl ConfigFormat {
    /// Infer the format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Parse TOML configuration
pub fn parse_toml(content: &str) -> Result<RunConfig, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse JSON configuration
pub fn parse_json(content: &str) -> Result<RunConfig, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse configuration in the given format
pub fn parse(content: &str, format: ConfigFormat) -> Result<RunConfig, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{OutputConfig, SyslogFacility, SyslogNetwork, SyslogSeverity};

    #[test]
    fn test_parse_toml_outputs() {
        let content = r#"
buffer_size = 64

[[outputs]]
type = "stdout"

[[outputs]]
type = "syslog"
facility = "daemon"
severity = "notice"
network = "udp"
address = "127.0.0.1:514"

[[outputs]]
type = "token_tcp"
url = "tcps://api.logentries.com:20000/abc"
timeout_secs = 2
"#;
        let config = parse_toml(content).unwrap();
        assert_eq!(config.buffer_size, 64);
        assert_eq!(config.outputs.len(), 3);
        match &config.outputs[1] {
            OutputConfig::Syslog(s) => {
                assert_eq!(s.facility, SyslogFacility::Daemon);
                assert_eq!(s.severity, SyslogSeverity::Notice);
                assert_eq!(s.network, Some(SyslogNetwork::Udp));
            }
            other => panic!("unexpected output {other:?}"),
        }
        match &config.outputs[2] {
            OutputConfig::TokenTcp(t) => assert_eq!(t.timeout_secs, 2),
            other => panic!("unexpected output {other:?}"),
        }
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{ "outputs": [{ "type": "stderr" }] }"#;
        let config = parse_json(content).unwrap();
        assert_eq!(config.outputs, vec![OutputConfig::Stderr]);
        assert_eq!(config.buffer_size, contracts::DEFAULT_BUFFER_SIZE);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let result = parse_toml("invalid toml [[[");
        assert!(matches!(result, Err(ContractError::ConfigParse { .. })));
    }

    #[test]
    fn test_unknown_output_type_is_parse_error() {
        let result = parse_toml("[[outputs]]\ntype = \"carrier_pigeon\"\n");
        assert!(matches!(result, Err(ContractError::ConfigParse { .. })));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("toml"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
