//! Credential validation for providers that require an API key.
//!
//! [`ProviderValidator`] wraps a [`CredentialChecker`] collaborator with a
//! bounded timeout and never fails: transport errors, timeouts, and missing
//! credentials all come back as `valid = false` with a message.
//!
//! [`HttpCredentialChecker`] probes the provider's base URL with the
//! credential as a bearer token:
//!
//! - 2xx → valid
//! - 401 / 403 → rejected
//! - any other status → invalid, status reported
//! - transport failure → error (turned into invalid by the validator)

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::config::ValidatorConfig;
use crate::error::{Result, SearchError};
use crate::http::{build_client, describe_reqwest_error};
use crate::spans::{FIELD_PROVIDER_TYPE, SPAN_VALIDATE};
use crate::types::{ProviderType, Secret};

/// Outcome of a credential check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    /// Whether the credential was accepted.
    pub valid: bool,
    /// Optional human-readable detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Validation {
    /// An accepted credential.
    pub fn valid() -> Self {
        Self {
            valid: true,
            message: None,
        }
    }

    /// A rejected credential with a reason.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: Some(message.into()),
        }
    }

    /// Attach a message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.valid { "valid" } else { "invalid" };
        match &self.message {
            Some(message) => write!(f, "{verdict}: {message}"),
            None => f.write_str(verdict),
        }
    }
}

/// Collaborator that decides whether a credential works for an endpoint.
#[async_trait]
pub trait CredentialChecker: Send + Sync {
    /// Check `credential` against the provider at `base_url`.
    ///
    /// # Errors
    ///
    /// Transport or decoding failures. The validator reports them as invalid.
    async fn check(
        &self,
        provider_type: ProviderType,
        base_url: Option<&str>,
        credential: &Secret,
    ) -> Result<Validation>;
}

/// Validates provider credentials through a [`CredentialChecker`].
#[derive(Clone)]
pub struct ProviderValidator {
    checker: Arc<dyn CredentialChecker>,
    timeout: Duration,
}

impl fmt::Debug for ProviderValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderValidator")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ProviderValidator {
    /// Create a validator around `checker`.
    pub fn new(checker: Arc<dyn CredentialChecker>, config: &ValidatorConfig) -> Self {
        Self {
            checker,
            timeout: config.timeout(),
        }
    }

    /// Override the check timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validate a credential. Never errors.
    pub async fn validate(
        &self,
        provider_type: ProviderType,
        base_url: Option<&str>,
        credential: Option<&Secret>,
    ) -> Validation {
        let span = tracing::info_span!(SPAN_VALIDATE, { FIELD_PROVIDER_TYPE } = %provider_type);

        async move {
            let Some(credential) = credential.filter(|c| !c.is_blank()) else {
                return Validation::invalid("a credential is required");
            };

            let outcome = tokio::time::timeout(
                self.timeout,
                self.checker.check(provider_type, base_url, credential),
            )
            .await;

            let validation = match outcome {
                Ok(Ok(validation)) => validation,
                Ok(Err(err)) => Validation::invalid(format!("validation failed: {err}")),
                Err(_) => Validation::invalid(format!(
                    "validation timed out after {}s",
                    self.timeout.as_secs_f64()
                )),
            };
            tracing::debug!(valid = validation.valid, "credential checked");
            validation
        }
        .instrument(span)
        .await
    }
}

/// Checks a credential by calling the provider's base URL directly.
#[derive(Debug, Clone)]
pub struct HttpCredentialChecker {
    client: reqwest::Client,
}

impl HttpCredentialChecker {
    /// Create a checker whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Http`] if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout, None)?,
        })
    }

    /// Create a checker around an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CredentialChecker for HttpCredentialChecker {
    async fn check(
        &self,
        _provider_type: ProviderType,
        base_url: Option<&str>,
        credential: &Secret,
    ) -> Result<Validation> {
        let Some(base_url) = base_url.map(str::trim).filter(|u| !u.is_empty()) else {
            return Ok(Validation::invalid("no base URL to validate against"));
        };

        let response = self
            .client
            .get(base_url)
            .bearer_auth(credential.expose())
            .send()
            .await
            .map_err(|e| SearchError::Http(describe_reqwest_error(&e)))?;

        let status = response.status();
        let validation = if status.is_success() {
            Validation::valid()
        } else if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            Validation::invalid(format!("credential rejected (HTTP {})", status.as_u16()))
        } else {
            Validation::invalid(format!("unexpected HTTP {}", status.as_u16()))
        };
        Ok(validation)
    }
}
