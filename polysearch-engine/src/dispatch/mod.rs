//! Concurrent fan-out dispatch across the selected providers.
//!
//! # Pipeline
//!
//! 1. Validate the request and snapshot the selected providers
//! 2. Skip providers with no adapter, a missing required credential, or an
//!    open circuit (each becomes a warning)
//! 3. Resolve effective filters and start every remaining call concurrently,
//!    each bounded by the per-provider timeout
//! 4. Collect outcomes as they settle, until all settle or the overall
//!    deadline passes (outstanding calls become warnings)
//! 5. Stamp provider ids, make result ids unique, merge and sort
//! 6. Truncate to `max_results`
//!
//! Only when **every** selected provider fails does dispatch return
//! [`SearchError::TotalDispatchFailure`].

pub mod health;
pub mod ranking;

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::Instrument;

use crate::adapter::{AdapterCall, AdapterSet};
use crate::config::DispatchConfig;
use crate::error::{Result, SearchError};
use crate::filters::FilterSchema;
use crate::registry::{ProviderRegistry, ProviderSettings};
use crate::spans::{FIELD_PROVIDER, FIELD_PROVIDER_COUNT, SPAN_DISPATCH, SPAN_PROVIDER_CALL};
use crate::types::{FailureKind, Provider, ProviderFailure, SearchRequest, SearchResponse, SearchResult};

use health::{CircuitBreaker, HealthEntry};

type CallOutcome = std::result::Result<Vec<SearchResult>, ProviderFailure>;

/// Fans a search out to providers and merges what comes back.
pub struct DispatchEngine {
    registry: Arc<ProviderRegistry>,
    schema: Arc<FilterSchema>,
    adapters: AdapterSet,
    config: DispatchConfig,
    breaker: Mutex<CircuitBreaker>,
}

impl std::fmt::Debug for DispatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchEngine")
            .field("registry", &self.registry)
            .field("adapters", &self.adapters)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DispatchEngine {
    /// Create a dispatch engine.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if `config` is invalid.
    pub fn new(
        registry: Arc<ProviderRegistry>,
        schema: Arc<FilterSchema>,
        adapters: AdapterSet,
        config: DispatchConfig,
    ) -> Result<Self> {
        config.validate()?;
        let breaker = CircuitBreaker::new(
            config.failure_threshold,
            Duration::from_secs(config.cooldown_secs),
        );
        Ok(Self {
            registry,
            schema,
            adapters,
            config,
            breaker: Mutex::new(breaker),
        })
    }

    /// The registry providers are resolved from.
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// The filter schema used to resolve effective filters.
    pub fn schema(&self) -> &Arc<FilterSchema> {
        &self.schema
    }

    /// The active configuration.
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Circuit state of every provider dispatched to so far.
    pub fn health_report(&self) -> Vec<HealthEntry> {
        self.breaker().health_report()
    }

    fn breaker(&self) -> MutexGuard<'_, CircuitBreaker> {
        self.breaker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `request` against its selected providers.
    ///
    /// # Errors
    ///
    /// - [`SearchError::InvalidRequest`] for an empty query or provider list
    /// - [`SearchError::ProviderNotFound`] if any selected id is unknown; no
    ///   provider is called
    /// - [`SearchError::TotalDispatchFailure`] if every provider failed
    pub async fn dispatch(&self, request: &SearchRequest) -> Result<SearchResponse> {
        request.validate()?;
        let (providers, settings): (Vec<_>, Vec<_>) = self
            .registry
            .resolve_with_settings(request.providers.as_slice())?
            .into_iter()
            .unzip();

        let span = tracing::info_span!(SPAN_DISPATCH, { FIELD_PROVIDER_COUNT } = providers.len());
        self.fan_out(request, providers, settings).instrument(span).await
    }

    async fn fan_out(
        &self,
        request: &SearchRequest,
        providers: Vec<Arc<Provider>>,
        settings: Vec<ProviderSettings>,
    ) -> Result<SearchResponse> {
        tracing::trace!(query = %request.query, "dispatching search");

        let provider_timeout = self.config.provider_timeout();
        let mut outcomes: Vec<Option<CallOutcome>> = vec![None; providers.len()];
        let mut pending = FuturesUnordered::new();

        for (index, (provider, settings)) in providers.iter().zip(settings).enumerate() {
            if let Some(failure) = self.precheck(provider) {
                outcomes[index] = Some(Err(failure));
                continue;
            }
            let Some(adapter) = self.adapters.adapter_for(provider) else {
                continue;
            };

            let filters = self
                .schema
                .resolve(provider, request.filters.get(&provider.id));
            let call = AdapterCall::new(request, provider, settings, filters);
            let provider = Arc::clone(provider);
            let span = tracing::debug_span!(SPAN_PROVIDER_CALL, { FIELD_PROVIDER } = %provider.id);

            pending.push(
                async move {
                    let outcome =
                        tokio::time::timeout(provider_timeout, adapter.search(&provider, &call)).await;
                    let outcome = match outcome {
                        Ok(Ok(results)) => Ok(results),
                        Ok(Err(err)) => Err(ProviderFailure::new(&provider.id, err.to_string())),
                        Err(_) => Err(ProviderFailure::with_kind(
                            &provider.id,
                            FailureKind::Timeout,
                            format!("timed out after {}s", provider_timeout.as_secs_f64()),
                        )),
                    };
                    (index, outcome)
                }
                .instrument(span),
            );
        }

        let deadline = self
            .config
            .overall_timeout()
            .map(|d| tokio::time::Instant::now() + d);

        loop {
            let next = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, pending.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        tracing::warn!(outstanding = pending.len(), "overall deadline elapsed");
                        break;
                    }
                },
                None => pending.next().await,
            };
            let Some((index, outcome)) = next else {
                break;
            };
            self.record(&providers[index].id, &outcome);
            outcomes[index] = Some(outcome);
        }
        drop(pending);

        self.assemble(request, &providers, outcomes)
    }

    /// Reasons to skip a provider without calling it.
    fn precheck(&self, provider: &Provider) -> Option<ProviderFailure> {
        if self.adapters.adapter_for(provider).is_none() {
            return Some(ProviderFailure::with_kind(
                &provider.id,
                FailureKind::NoAdapter,
                format!("no adapter configured for {} providers", provider.provider_type),
            ));
        }
        if provider.requires_credential && provider.usable_credential().is_none() {
            return Some(ProviderFailure::with_kind(
                &provider.id,
                FailureKind::MissingCredential,
                "provider requires a credential but none is configured",
            ));
        }
        if !self.breaker().should_attempt(&provider.id) {
            return Some(ProviderFailure::with_kind(
                &provider.id,
                FailureKind::CircuitOpen,
                "skipped after repeated failures",
            ));
        }
        None
    }

    fn record(&self, provider_id: &str, outcome: &CallOutcome) {
        let mut breaker = self.breaker();
        match outcome {
            Ok(_) => breaker.record_success(provider_id),
            Err(_) => breaker.record_failure(provider_id),
        }
    }

    fn assemble(
        &self,
        request: &SearchRequest,
        providers: &[Arc<Provider>],
        outcomes: Vec<Option<CallOutcome>>,
    ) -> Result<SearchResponse> {
        let mut per_provider = Vec::with_capacity(providers.len());
        let mut warnings = Vec::new();
        let mut used_ids = HashSet::new();

        for (provider, outcome) in providers.iter().zip(outcomes) {
            let outcome = outcome.unwrap_or_else(|| {
                Err(ProviderFailure::with_kind(
                    &provider.id,
                    FailureKind::Cancelled,
                    "cancelled at the overall deadline",
                ))
            });
            match outcome {
                Ok(mut results) => {
                    tracing::debug!(provider = %provider.id, count = results.len(), "provider returned results");
                    for (position, result) in results.iter_mut().enumerate() {
                        result.provider_id = provider.id.clone();
                        result.id = unique_id(&provider.id, &result.id, position, &mut used_ids);
                    }
                    per_provider.push(results);
                }
                Err(failure) => {
                    tracing::warn!(provider = %failure.provider_id, kind = ?failure.kind, reason = %failure.reason, "provider failed");
                    warnings.push(failure);
                }
            }
        }

        if !providers.is_empty() && warnings.len() == providers.len() {
            return Err(SearchError::TotalDispatchFailure(warnings));
        }

        let mut results = ranking::merge(per_provider, request.sort_by);
        if let Some(max) = self.config.max_results {
            results.truncate(max);
        }
        Ok(SearchResponse { results, warnings })
    }
}

/// `<provider>:<id>`, with `-2`, `-3`, ... appended on collision.
fn unique_id(
    provider_id: &str,
    result_id: &str,
    position: usize,
    used: &mut HashSet<String>,
) -> String {
    let local = if result_id.trim().is_empty() {
        position.to_string()
    } else {
        result_id.to_string()
    };
    let prefix = format!("{provider_id}:");
    let base = if local.starts_with(&prefix) {
        local
    } else {
        format!("{prefix}{local}")
    };

    let mut candidate = base.clone();
    let mut n = 2;
    while !used.insert(candidate.clone()) {
        candidate = format!("{base}-{n}");
        n += 1;
    }
    candidate
}
