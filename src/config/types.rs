//! Configuration schema for polysearch.
//!
//! Engine sections (`[dispatch]`, `[detection]`, `[validation]`) embed the
//! engine's own config structs; the rest is application wiring.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use polysearch_engine::{DetectorConfig, DispatchConfig, Secret, ValidatorConfig};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root configuration, deserialized from `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolysearchConfig {
    /// Fan-out timeouts, truncation and circuit breaker settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Provider-type detection settings.
    #[serde(default)]
    pub detection: DetectorConfig,

    /// Credential validation settings.
    #[serde(default)]
    pub validation: ValidatorConfig,

    /// Host backend serving aggregate search, detection, validation and
    /// provider persistence.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Local storage locations.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Credentials by provider id, for built-ins and stored providers.
    #[serde(default)]
    pub credentials: BTreeMap<String, SecretRef>,
}

impl PolysearchConfig {
    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        self.dispatch
            .validate()
            .map_err(|e| AppError::Config(format!("[dispatch] {e}")))?;
        self.detection
            .validate()
            .map_err(|e| AppError::Config(format!("[detection] {e}")))?;
        self.validation
            .validate()
            .map_err(|e| AppError::Config(format!("[validation] {e}")))?;
        self.backend.validate()
    }

    /// Resolve the credential configured for `provider_id`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Secret`] if the reference cannot be resolved.
    pub fn credential_for(&self, provider_id: &str) -> Result<Option<Secret>> {
        match self.credentials.get(provider_id) {
            Some(secret) => secret.resolve(),
            None => Ok(None),
        }
    }
}

/// Host backend connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the backend, e.g. `http://localhost:8000`. Unset runs
    /// fully local.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Bound on each backend call, in seconds.
    pub timeout_secs: u64,

    /// Also persist registered providers to the backend.
    pub persist_providers: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 10,
            persist_providers: true,
        }
    }
}

impl BackendConfig {
    /// Backend call timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The configured backend URL, if set and non-empty.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }

    fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(AppError::Config(
                "[backend] timeout_secs must be greater than 0".into(),
            ));
        }
        if let Some(raw) = self.url() {
            let url = url::Url::parse(raw)
                .map_err(|e| AppError::Config(format!("[backend] invalid url '{raw}': {e}")))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(AppError::Config(format!(
                    "[backend] url must be http or https, got '{}'",
                    url.scheme()
                )));
            }
        }
        Ok(())
    }
}

/// Local storage locations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// File holding user-added providers. Defaults to
    /// [`crate::paths::providers_file`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub providers_file: Option<PathBuf>,
}

impl StorageConfig {
    /// The effective providers file path.
    pub fn providers_file(&self) -> PathBuf {
        self.providers_file
            .clone()
            .unwrap_or_else(crate::paths::providers_file)
    }
}

/// Reference to a secret value.
///
/// Secrets can be:
/// - Not configured (None)
/// - Loaded from an environment variable (Env)
/// - A literal value (Literal), for development only
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SecretRef {
    /// No secret configured
    #[default]
    None,
    /// Load from environment variable
    Env { var: String },
    /// Literal value (development only, insecure)
    Literal { value: String },
}

impl SecretRef {
    /// Resolve the reference to a secret.
    ///
    /// # Returns
    /// - `Ok(None)` for [`SecretRef::None`]
    /// - `Ok(Some(secret))` for successfully resolved secrets
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Secret`] if an environment variable is unset.
    pub fn resolve(&self) -> Result<Option<Secret>> {
        match self {
            Self::None => Ok(None),
            Self::Env { var } => std::env::var(var)
                .map(|value| Some(Secret::new(value)))
                .map_err(|_| AppError::Secret(format!("environment variable '{var}' not set"))),
            Self::Literal { value } => Ok(Some(Secret::new(value.clone()))),
        }
    }
}
