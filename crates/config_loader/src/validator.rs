//! Configuration validation
//!
//! Rules:
//! - buffer_size >= 1
//! - file paths are non-empty
//! - syslog `address` is present exactly when `network` is
//! - token TCP URLs resolve to an endpoint
//! - error handler credentials are non-empty

use contracts::{ContractError, ErrorHandlerConfig, OutputConfig, RunConfig, SyslogConfig};

/// Validate a RunConfig
///
/// Returns the first error found, or Ok(()).
pub fn validate(config: &RunConfig) -> Result<(), ContractError> {
    validate_buffer_size(config)?;
    validate_outputs(config)?;
    validate_error_handlers(config)?;
    Ok(())
}

fn validate_buffer_size(config: &RunConfig) -> Result<(), ContractError> {
    if config.buffer_size == 0 {
        return Err(ContractError::config_validation(
            "buffer_size",
            "buffer_size must be >= 1",
        ));
    }
    Ok(())
}

/// Validate every output entry
pub fn validate_outputs(config: &RunConfig) -> Result<(), ContractError> {
    for (idx, output) in config.outputs.iter().enumerate() {
        validate_output(output).map_err(|e| match e {
            ContractError::ConfigValidation { field, message } => {
                ContractError::config_validation(format!("outputs[{idx}].{field}"), message)
            }
            other => other,
        })?;
    }
    Ok(())
}

/// Validate one output entry
pub fn validate_output(output: &OutputConfig) -> Result<(), ContractError> {
    match output {
        OutputConfig::Stdout | OutputConfig::Stderr => Ok(()),
        OutputConfig::File { path } => {
            if path.as_os_str().is_empty() {
                return Err(ContractError::config_validation(
                    "path",
                    "file output path cannot be empty",
                ));
            }
            Ok(())
        }
        OutputConfig::Syslog(syslog) => validate_syslog(syslog),
        OutputConfig::TokenTcp(token_tcp) => token_tcp.endpoint().map(|_| ()),
    }
}

fn validate_syslog(syslog: &SyslogConfig) -> Result<(), ContractError> {
    match (&syslog.network, &syslog.address) {
        (Some(_), None) => Err(ContractError::config_validation(
            "address",
            "remote syslog requires an address",
        )),
        (Some(_), Some(address)) if address.is_empty() => Err(ContractError::config_validation(
            "address",
            "remote syslog address cannot be empty",
        )),
        (None, Some(_)) => Err(ContractError::config_validation(
            "network",
            "syslog address given without a network (udp or tcp)",
        )),
        _ => Ok(()),
    }
}

fn validate_error_handlers(config: &RunConfig) -> Result<(), ContractError> {
    for (idx, handler) in config.error_handlers.iter().enumerate() {
        match handler {
            ErrorHandlerConfig::Opbeat {
                organization_id,
                app_id,
                secret_token,
            } => {
                for (name, value) in [
                    ("organization_id", organization_id),
                    ("app_id", app_id),
                    ("secret_token", secret_token),
                ] {
                    if value.is_empty() {
                        return Err(ContractError::config_validation(
                            format!("error_handlers[{idx}].{name}"),
                            format!("{name} cannot be empty"),
                        ));
                    }
                }
            }
        }
    }
    Ok(())
}
