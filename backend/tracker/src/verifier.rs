//! PIN verification transports.
//!
//! * [`SecretVerifier`] checks against the configured `PIN_CODE` in-process.
//! * [`HttpPinVerifier`] delegates to a remote `POST {"pin": ...}` endpoint
//!   answering `{"success": bool}`, the same contract `POST /pin/verify`
//!   exposes.  Network errors and non-2xx replies are reported as
//!   [`VerifyError`], never as a wrong PIN.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use loan_protocol::{PinVerifier, VerifyError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Config;
use crate::errors::{Result, TrackerError};

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub pin: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub success: bool,
}

pub struct SecretVerifier {
    secret: String,
}

impl SecretVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn check(&self, code: &str) -> bool {
        code == self.secret
    }
}

#[async_trait]
impl PinVerifier for SecretVerifier {
    async fn verify(&self, code: &str) -> std::result::Result<bool, VerifyError> {
        Ok(self.check(code))
    }
}

pub struct HttpPinVerifier {
    client: Client,
    url: String,
}

impl HttpPinVerifier {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl PinVerifier for HttpPinVerifier {
    async fn verify(&self, code: &str) -> std::result::Result<bool, VerifyError> {
        debug!("Verifying PIN against {}", self.url);
        let response = self
            .client
            .post(&self.url)
            .json(&VerifyRequest {
                pin: code.to_string(),
            })
            .send()
            .await
            .map_err(|e| VerifyError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VerifyError(format!("verifier responded with {status}")));
        }

        let body: VerifyResponse = response
            .json()
            .await
            .map_err(|e| VerifyError(e.to_string()))?;
        Ok(body.success)
    }
}

/// Pick the verification transport from configuration.  A remote URL takes
/// precedence over a local secret.
pub fn from_config(config: &Config) -> Result<Arc<dyn PinVerifier>> {
    if let Some(url) = &config.pin_verify_url {
        info!("PIN verification delegated to {url}");
        let client = Client::builder()
            .timeout(Duration::from_secs(config.verify_timeout_secs))
            .build()?;
        return Ok(Arc::new(HttpPinVerifier::new(client, url.clone())));
    }

    match &config.pin_code {
        Some(secret) => Ok(Arc::new(SecretVerifier::new(secret.clone()))),
        None => Err(TrackerError::Config(
            "No PIN verification source configured".to_string(),
        )),
    }
}
