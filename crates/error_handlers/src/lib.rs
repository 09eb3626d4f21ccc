//! # Error Handlers
//!
//! Receivers notified when the supervised process exits abnormally.

mod opbeat;

pub use contracts::{ErrorHandler, ErrorRecord};
pub use opbeat::{OpbeatHandler, OPBEAT_INTAKE_URL};

use contracts::{ContractError, ErrorHandlerConfig};

/// Build a handler for each config entry
///
/// # Errors
/// Returns the first handler that cannot be constructed
pub fn build_handlers(
    configs: &[ErrorHandlerConfig],
) -> Result<Vec<Box<dyn ErrorHandler>>, ContractError> {
    configs
        .iter()
        .map(|config| match config {
            ErrorHandlerConfig::Opbeat {
                organization_id,
                app_id,
                secret_token,
            } => OpbeatHandler::new(organization_id, app_id, secret_token)
                .map(|h| Box::new(h) as Box<dyn ErrorHandler>),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_handlers() {
        let configs = vec![ErrorHandlerConfig::Opbeat {
            organization_id: "org".to_string(),
            app_id: "app".to_string(),
            secret_token: "secret".to_string(),
        }];
        let handlers = build_handlers(&configs).unwrap();
        assert_eq!(handlers.len(), 1);
        assert_eq!(handlers[0].name(), "opbeat");
    }

    #[test]
    fn test_build_handlers_rejects_empty_credentials() {
        let configs = vec![ErrorHandlerConfig::Opbeat {
            organization_id: "org".to_string(),
            app_id: String::new(),
            secret_token: "secret".to_string(),
        }];
        assert!(build_handlers(&configs).is_err());
    }
}
