//! Engine configuration with sensible defaults.
//!
//! [`DispatchConfig`] controls fan-out timeouts, result truncation, and the
//! per-provider circuit breaker. [`DetectorConfig`] and [`ValidatorConfig`]
//! bound the collaborator calls made while adding providers. All three are
//! deserialisable so an application can embed them as TOML sections.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SearchError;

/// Configuration for [`crate::dispatch::DispatchEngine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Per-provider call timeout in seconds.
    pub provider_timeout_secs: u64,
    /// Overall deadline for one dispatch in seconds. `None` waits for every
    /// provider to settle (each still bounded by its own timeout).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_timeout_secs: Option<u64>,
    /// Truncate merged results to this many. `None` keeps everything.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_results: Option<usize>,
    /// Consecutive failures before a provider's circuit opens.
    pub failure_threshold: u32,
    /// Seconds an open circuit waits before allowing a probe call.
    pub cooldown_secs: u64,
    /// User-Agent for the built-in HTTP adapter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            provider_timeout_secs: 8,
            overall_timeout_secs: None,
            max_results: None,
            failure_threshold: 3,
            cooldown_secs: 60,
            user_agent: None,
        }
    }
}

impl DispatchConfig {
    /// Per-provider timeout as a [`Duration`].
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    /// Overall deadline as a [`Duration`], if set.
    pub fn overall_timeout(&self) -> Option<Duration> {
        self.overall_timeout_secs.map(Duration::from_secs)
    }

    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - `provider_timeout_secs` must be greater than 0
    /// - `overall_timeout_secs`, when set, must be greater than 0
    /// - `max_results`, when set, must be greater than 0
    /// - `failure_threshold` must be greater than 0
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.provider_timeout_secs == 0 {
            return Err(SearchError::Config(
                "provider_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.overall_timeout_secs == Some(0) {
            return Err(SearchError::Config(
                "overall_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.max_results == Some(0) {
            return Err(SearchError::Config(
                "max_results must be greater than 0".into(),
            ));
        }
        if self.failure_threshold == 0 {
            return Err(SearchError::Config(
                "failure_threshold must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration for [`crate::detect::ProviderDetector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Bound on one classification call, in seconds.
    pub timeout_secs: u64,
    /// How long successful classifications stay cached. 0 disables caching.
    pub cache_ttl_secs: u64,
    /// Whether the heuristic classifier may issue an HTTP probe.
    pub probe: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            cache_ttl_secs: 600,
            probe: true,
        }
    }
}

impl DetectorConfig {
    /// Classification timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validates this configuration.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.timeout_secs == 0 {
            return Err(SearchError::Config(
                "detection timeout_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration for [`crate::validate::ProviderValidator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Bound on one credential check, in seconds.
    pub timeout_secs: u64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

impl ValidatorConfig {
    /// Check timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validates this configuration.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.timeout_secs == 0 {
            return Err(SearchError::Config(
                "validation timeout_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
