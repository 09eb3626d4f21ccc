//! Output specifications given as single command-line values

use contracts::{ContractError, OutputConfig, SyslogConfig, SyslogFacility, TokenTcpConfig};

/// Parse `tcp[s]://<host>:<port>/<token>` into a token TCP output
pub fn parse_token_tcp(value: &str) -> Result<OutputConfig, ContractError> {
    let config = TokenTcpConfig::new(value);
    config.endpoint()?;
    Ok(OutputConfig::TokenTcp(config))
}

/// Parse `[<facility>[:<tag>]]` into a local syslog output
///
/// An empty facility selects `local0`; an empty tag leaves the default.
pub fn parse_syslog(value: &str) -> Result<OutputConfig, ContractError> {
    let (facility_name, tag) = match value.split_once(':') {
        Some((facility, tag)) => (facility, Some(tag)),
        None => (value, None),
    };

    let facility: SyslogFacility = facility_name.parse()?;

    Ok(OutputConfig::Syslog(SyslogConfig {
        facility,
        tag: tag.filter(|t| !t.is_empty()).map(str::to_string),
        ..Default::default()
    }))
}
