//! JSON-over-HTTP adapter.
//!
//! POSTs the adapter call as a JSON envelope and decodes either a bare
//! array of results or an object with a `results` array. Providers are
//! queried at their base URL; aggregate providers (which have no endpoint of
//! their own) are queried at a fixed backend endpoint, with the provider id
//! in the envelope.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::adapter::{AdapterCall, ProviderAdapter};
use crate::error::{Result, SearchError};
use crate::http::{build_client, describe_reqwest_error};
use crate::types::{Provider, ProviderType, SearchResult};

/// Request body sent to the endpoint.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<'a> {
    provider: &'a str,
    provider_type: ProviderType,
    #[serde(flatten)]
    call: &'a AdapterCall,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ResultsBody {
    Bare(Vec<SearchResult>),
    Wrapped { results: Vec<SearchResult> },
}

impl ResultsBody {
    fn into_results(self) -> Vec<SearchResult> {
        match self {
            Self::Bare(results) | Self::Wrapped { results } => results,
        }
    }
}

/// Generic JSON search adapter.
#[derive(Debug, Clone)]
pub struct HttpJsonAdapter {
    client: reqwest::Client,
    aggregate_endpoint: Option<String>,
}

impl HttpJsonAdapter {
    /// Create an adapter whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Http`] if the HTTP client cannot be built.
    pub fn new(timeout: Duration, user_agent: Option<&str>) -> Result<Self> {
        Ok(Self::with_client(build_client(timeout, user_agent)?))
    }

    /// Create an adapter around an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            aggregate_endpoint: None,
        }
    }

    /// Serve aggregate providers from `endpoint`.
    pub fn with_aggregate_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.aggregate_endpoint = Some(endpoint.into());
        self
    }

    fn endpoint_for<'a>(&'a self, provider: &Provider, call: &'a AdapterCall) -> Result<&'a str> {
        match call.settings.endpoint() {
            Some(endpoint) => Ok(endpoint),
            None => self.aggregate_endpoint.as_deref().ok_or_else(|| {
                SearchError::Config(format!(
                    "no backend endpoint configured for aggregate provider '{}'",
                    provider.id
                ))
            }),
        }
    }
}

#[async_trait]
impl ProviderAdapter for HttpJsonAdapter {
    async fn search(&self, provider: &Provider, call: &AdapterCall) -> Result<Vec<SearchResult>> {
        let endpoint = self.endpoint_for(provider, call)?;
        let envelope = Envelope {
            provider: &provider.id,
            provider_type: provider.provider_type,
            call,
        };

        let mut request = self.client.post(endpoint).json(&envelope);
        for (name, value) in &call.custom_headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(credential) = &call.credential {
            request = request.bearer_auth(credential.expose());
        }

        let response = request
            .send()
            .await
            .map_err(|e| SearchError::Http(describe_reqwest_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Http(format!("HTTP {}", status.as_u16())));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SearchError::Http(describe_reqwest_error(&e)))?;
        let parsed: ResultsBody = serde_json::from_str(&body)
            .map_err(|e| SearchError::Parse(format!("invalid results body: {e}")))?;

        let mut results = parsed.into_results();
        for result in &mut results {
            if result.provider_id.is_empty() {
                result.provider_id = provider.id.clone();
            }
        }
        Ok(results)
    }
}
