//! Opbeat error intake

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::SecondsFormat;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use tracing::{debug, instrument};

use contracts::{BoxFuture, ContractError, ErrorHandler, ErrorRecord};

/// Intake API root
pub const OPBEAT_INTAKE_URL: &str = "https://intake.opbeat.com/api/v1";

const HANDLER_NAME: &str = "opbeat";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct Payload<'a> {
    message: &'a str,
    culprit: String,
    extra: BTreeMap<&'a str, &'a str>,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    machine: Option<Machine<'a>>,
}

#[derive(Debug, Serialize)]
struct Machine<'a> {
    hostname: &'a str,
}

/// Printable ASCII only
fn is_printable_ascii(s: &str) -> bool {
    s.chars().all(|c| matches!(c, ' '..='~'))
}

impl<'a> Payload<'a> {
    fn from_record(record: &'a ErrorRecord) -> Self {
        let extra = record
            .environment
            .iter()
            .filter(|(k, v)| is_printable_ascii(k) && is_printable_ascii(v))
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        Self {
            message: &record.description,
            culprit: record.quoted_command(),
            extra,
            timestamp: record.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            machine: (!record.hostname.is_empty()).then_some(Machine {
                hostname: &record.hostname,
            }),
        }
    }
}

/// Posts error records to an Opbeat app
pub struct OpbeatHandler {
    endpoint: String,
    secret_token: String,
    client: reqwest::Client,
}

impl OpbeatHandler {
    /// # Errors
    /// Returns an error when a credential is empty or the HTTP client cannot be built
    pub fn new(
        organization_id: &str,
        app_id: &str,
        secret_token: &str,
    ) -> Result<Self, ContractError> {
        Self::with_base_url(OPBEAT_INTAKE_URL, organization_id, app_id, secret_token)
    }

    /// Handler posting to an alternative intake root
    ///
    /// # Errors
    /// Same as [`OpbeatHandler::new`]
    pub fn with_base_url(
        base_url: &str,
        organization_id: &str,
        app_id: &str,
        secret_token: &str,
    ) -> Result<Self, ContractError> {
        for (field, value) in [
            ("app_id", app_id),
            ("organization_id", organization_id),
            ("secret_token", secret_token),
        ] {
            if value.is_empty() {
                return Err(ContractError::config_validation(
                    format!("opbeat.{field}"),
                    "cannot be empty",
                ));
            }
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ContractError::error_handler(HANDLER_NAME, e.to_string()))?;

        Ok(Self {
            endpoint: format!(
                "{}/organizations/{organization_id}/apps/{app_id}/errors/",
                base_url.trim_end_matches('/')
            ),
            secret_token: secret_token.to_string(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[instrument(name = "opbeat_send", skip(self, record))]
    async fn send(&self, record: &ErrorRecord) -> Result<(), ContractError> {
        let fail = |message: String| ContractError::error_handler(HANDLER_NAME, message);

        let payload = Payload::from_record(record);
        debug!(endpoint = %self.endpoint, message = payload.message, "Posting error record");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.secret_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/json"));

        if is_json {
            if let Ok(body) = response.json::<serde_json::Value>().await {
                if let Some(message) = body.get("error_message") {
                    let message = message
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| message.to_string());
                    return Err(fail(format!(
                        "error from Opbeat for status code {}: {message}",
                        status.as_u16()
                    )));
                }
            }
        }

        Err(fail(format!("unexpected status code: {}", status.as_u16())))
    }
}

impl ErrorHandler for OpbeatHandler {
    fn name(&self) -> &str {
        HANDLER_NAME
    }

    fn handle<'a>(&'a self, record: &'a ErrorRecord) -> BoxFuture<'a, Result<(), ContractError>> {
        Box::pin(self.send(record))
    }
}
