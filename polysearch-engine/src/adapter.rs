//! Trait definition for pluggable provider adapters.
//!
//! An adapter knows how to run one search call against one kind of provider.
//! [`AdapterSet`] routes each provider to its adapter: an adapter registered
//! for the provider id wins, then one for the provider type, then the default.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::filters::FilterMap;
use crate::registry::ProviderSettings;
use crate::types::{Provider, ProviderType, SearchRequest, SearchResult, Secret, SortKey, TimeRange};

/// Everything an adapter receives for one provider call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterCall {
    /// Free-text query.
    pub query: String,
    /// Effective filters for this provider.
    pub filters: FilterMap,
    /// Global time window.
    pub time_range: TimeRange,
    /// Requested ordering; adapters may use it as a hint.
    pub sort_by: SortKey,
    /// Language code.
    pub language: String,
    /// Provider headers, forwarded verbatim.
    #[serde(skip)]
    pub custom_headers: BTreeMap<String, String>,
    /// Provider credential, if any.
    #[serde(skip)]
    pub credential: Option<Secret>,
    /// Type-specific settings checked when the provider was registered.
    #[serde(skip)]
    pub settings: ProviderSettings,
}

impl AdapterCall {
    /// Build the call for `provider` from a request, its registered settings
    /// and resolved filters.
    pub fn new(
        request: &SearchRequest,
        provider: &Provider,
        settings: ProviderSettings,
        filters: FilterMap,
    ) -> Self {
        Self {
            query: request.query.clone(),
            filters,
            time_range: request.time_range,
            sort_by: request.sort_by,
            language: request.language.clone(),
            custom_headers: provider.custom_headers.clone(),
            credential: provider.usable_credential().cloned(),
            settings,
        }
    }
}

/// A pluggable provider backend.
///
/// All implementations must be `Send + Sync` for concurrent dispatch.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Run `call` against `provider` and return its results.
    ///
    /// Returned results need not carry `provider_id`; the dispatcher stamps
    /// it and makes ids unique.
    ///
    /// # Errors
    ///
    /// Any transport, status, or decoding failure. The dispatcher turns it
    /// into a per-provider warning.
    async fn search(&self, provider: &Provider, call: &AdapterCall) -> Result<Vec<SearchResult>>;
}

/// Routes providers to adapters.
#[derive(Clone, Default)]
pub struct AdapterSet {
    by_provider: HashMap<String, Arc<dyn ProviderAdapter>>,
    by_type: HashMap<ProviderType, Arc<dyn ProviderAdapter>>,
    default: Option<Arc<dyn ProviderAdapter>>,
}

impl fmt::Debug for AdapterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut providers: Vec<&String> = self.by_provider.keys().collect();
        providers.sort();
        let mut types: Vec<&str> = self.by_type.keys().map(ProviderType::as_str).collect();
        types.sort_unstable();
        f.debug_struct("AdapterSet")
            .field("providers", &providers)
            .field("types", &types)
            .field("default", &self.default.is_some())
            .finish()
    }
}

impl AdapterSet {
    /// An empty set; every provider is unrouted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Route one provider id to `adapter`.
    pub fn with_provider(mut self, id: impl Into<String>, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.by_provider.insert(id.into(), adapter);
        self
    }

    /// Route every provider of `provider_type` to `adapter`.
    pub fn with_type(mut self, provider_type: ProviderType, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.by_type.insert(provider_type, adapter);
        self
    }

    /// Route everything else to `adapter`.
    pub fn with_default(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.default = Some(adapter);
        self
    }

    /// The adapter for `provider`, if any route matches.
    pub fn adapter_for(&self, provider: &Provider) -> Option<Arc<dyn ProviderAdapter>> {
        self.by_provider
            .get(&provider.id)
            .or_else(|| self.by_type.get(&provider.provider_type))
            .or(self.default.as_ref())
            .cloned()
    }
}
