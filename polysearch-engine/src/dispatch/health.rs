//! Per-provider circuit breaker.
//!
//! Tracks consecutive failures per provider id and temporarily skips
//! providers that fail repeatedly. After a cooldown a tripped provider enters
//! a half-open state where the next call decides whether to restore or
//! re-trip the circuit.
//!
//! # State Machine
//!
//! ```text
//! ┌────────┐  N failures   ┌────────┐  cooldown   ┌──────────┐
//! │ Closed ├──────────────►│  Open  ├────────────►│ HalfOpen │
//! └───▲────┘               └────────┘             └────┬─────┘
//!     │                         ▲                      │
//!     │  success                │  failure              │
//!     └─────────────────────────┴──────────────────────┘
//! ```

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Serialize;

/// Circuit state for a single provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls go through.
    Closed,
    /// Calls are skipped until the cooldown expires.
    Open,
    /// Cooldown elapsed; the next call is a probe.
    HalfOpen,
}

#[derive(Debug, Clone)]
struct ProviderHealth {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
}

impl Default for ProviderHealth {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure_at: None,
        }
    }
}

/// One row of [`CircuitBreaker::health_report`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthEntry {
    /// Provider id.
    pub provider_id: String,
    /// Current state.
    pub state: CircuitState,
    /// Failures since the last success.
    pub consecutive_failures: u32,
}

/// Per-provider circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    cooldown: Duration,
    providers: HashMap<String, ProviderHealth>,
}

impl CircuitBreaker {
    /// Trip after `failure_threshold` consecutive failures; probe again
    /// after `cooldown`.
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            cooldown,
            providers: HashMap::new(),
        }
    }

    /// Record a successful call. Closes the circuit.
    pub fn record_success(&mut self, provider_id: &str) {
        let health = self.providers.entry(provider_id.to_string()).or_default();
        health.state = CircuitState::Closed;
        health.consecutive_failures = 0;
    }

    /// Record a failed call. Opens the circuit at the threshold.
    pub fn record_failure(&mut self, provider_id: &str) {
        let health = self.providers.entry(provider_id.to_string()).or_default();
        health.consecutive_failures = health.consecutive_failures.saturating_add(1);
        health.last_failure_at = Some(Instant::now());

        if health.consecutive_failures >= self.failure_threshold {
            health.state = CircuitState::Open;
        }
    }

    /// Whether a call to `provider_id` should be attempted.
    ///
    /// An open circuit whose cooldown has elapsed moves to half-open and
    /// allows the call.
    pub fn should_attempt(&mut self, provider_id: &str) -> bool {
        let Some(health) = self.providers.get_mut(provider_id) else {
            return true;
        };

        match health.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooldown_elapsed = health
                    .last_failure_at
                    .is_none_or(|t| t.elapsed() >= self.cooldown);
                if cooldown_elapsed {
                    health.state = CircuitState::HalfOpen;
                }
                cooldown_elapsed
            }
        }
    }

    /// Current state of `provider_id`; unseen providers are closed.
    pub fn status(&self, provider_id: &str) -> CircuitState {
        self.providers
            .get(provider_id)
            .map_or(CircuitState::Closed, |h| h.state)
    }

    /// State of every provider seen so far, sorted by id.
    pub fn health_report(&self) -> Vec<HealthEntry> {
        let mut report: Vec<HealthEntry> = self
            .providers
            .iter()
            .map(|(id, health)| HealthEntry {
                provider_id: id.clone(),
                state: health.state,
                consecutive_failures: health.consecutive_failures,
            })
            .collect();
        report.sort_by(|a, b| a.provider_id.cmp(&b.provider_id));
        report
    }

    /// Forget all state.
    pub fn reset(&mut self) {
        self.providers.clear();
    }
}
