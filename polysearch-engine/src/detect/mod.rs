//! Provider-type detection from a URL.
//!
//! [`ProviderDetector`] asks a [`ProviderClassifier`] collaborator what kind
//! of provider lives at a URL, bounded by a timeout. It never fails: on
//! timeout, classifier error, or unusable input it returns the `web`
//! fallback with an explicit [`FallbackReason`]. Successful classifications
//! are cached per normalised URL; fallbacks are not.

pub mod heuristic;
pub mod normalize;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use url::Url;

use crate::config::DetectorConfig;
use crate::error::Result;
use crate::spans::SPAN_DETECT;
use crate::types::{Provider, ProviderType, Secret};

pub use heuristic::HeuristicClassifier;

/// Maximum number of cached classifications.
const MAX_CACHE_ENTRIES: u64 = 256;

/// What a classifier reports about a URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    /// Detected provider type.
    #[serde(alias = "provider_type")]
    pub provider_type: ProviderType,
    /// Suggested type-specific config.
    #[serde(default)]
    pub config: BTreeMap<String, serde_json::Value>,
    /// Whether the endpoint appears to need a credential.
    #[serde(default, alias = "api_key_required")]
    pub api_key_required: bool,
}

impl Classification {
    /// A classification with empty config and no credential requirement.
    pub fn new(provider_type: ProviderType) -> Self {
        Self {
            provider_type,
            config: BTreeMap::new(),
            api_key_required: false,
        }
    }

    /// Add a config entry.
    pub fn with_config(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.config.insert(key.to_string(), value.into());
        self
    }

    /// Mark the endpoint as needing a credential.
    pub fn requiring_key(mut self) -> Self {
        self.api_key_required = true;
        self
    }
}

/// Collaborator that classifies a URL.
#[async_trait]
pub trait ProviderClassifier: Send + Sync {
    /// Classify the endpoint at `url`.
    ///
    /// # Errors
    ///
    /// Any failure; the detector falls back to `web`.
    async fn classify(&self, url: &Url) -> Result<Classification>;
}

/// Why a detection result is the safe default rather than a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// The classifier did not answer in time.
    Timeout,
    /// The classifier failed.
    ClassifierError,
    /// The input is not a usable URL.
    InvalidUrl,
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Timeout => "detection timed out",
            Self::ClassifierError => "classifier failed",
            Self::InvalidUrl => "invalid URL",
        })
    }
}

/// Advisory outcome of [`ProviderDetector::detect`]. Never auto-committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// The URL that was examined.
    pub url: String,
    /// Detected or fallback provider type.
    pub provider_type: ProviderType,
    /// Suggested type-specific config.
    pub config: BTreeMap<String, serde_json::Value>,
    /// Whether a credential appears to be needed.
    pub api_key_required: bool,
    /// Suggested provider id (first host label without `www.`).
    pub suggested_id: String,
    /// Suggested display name (capitalised id).
    pub suggested_name: String,
    /// Set when this is the fallback rather than a classification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackReason>,
}

impl DetectionResult {
    fn classified(url: &Url, classification: Classification) -> Self {
        let suggested_id = suggest_id(url);
        Self {
            url: url.to_string(),
            provider_type: classification.provider_type,
            config: classification.config,
            api_key_required: classification.api_key_required,
            suggested_name: capitalize(&suggested_id),
            suggested_id,
            fallback: None,
        }
    }

    fn fallback(raw: &str, parsed: Option<&Url>, reason: FallbackReason) -> Self {
        let suggested_id = parsed.map_or_else(|| "custom".to_string(), suggest_id);
        Self {
            url: parsed.map_or_else(|| raw.trim().to_string(), Url::to_string),
            provider_type: ProviderType::Web,
            config: BTreeMap::new(),
            api_key_required: false,
            suggested_name: capitalize(&suggested_id),
            suggested_id,
            fallback: Some(reason),
        }
    }

    /// Whether this is the safe default.
    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Build the provider this detection suggests.
    ///
    /// The provider still has to go through registration.
    pub fn into_provider(self, credential: Option<Secret>) -> Provider {
        let mut provider = Provider::new(self.suggested_id, self.suggested_name, self.provider_type)
            .with_base_url(self.url);
        provider.config = self.config;
        provider.requires_credential = self.api_key_required;
        provider.credential = credential;
        provider
    }
}

/// First host label without `www.`, lowercased; for host-less URLs the last
/// path segment.
fn suggest_id(url: &Url) -> String {
    let raw = match url.host_str() {
        Some(host) if !host.is_empty() => {
            let host = host.strip_prefix("www.").unwrap_or(host);
            host.split('.').next().unwrap_or(host).to_string()
        }
        _ => url
            .path_segments()
            .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
            .unwrap_or("custom")
            .to_string(),
    };

    let id: String = raw
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if id.is_empty() {
        "custom".to_string()
    } else {
        id
    }
}

fn capitalize(id: &str) -> String {
    let mut chars = id.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Detects provider types with a bounded timeout and a result cache.
#[derive(Clone)]
pub struct ProviderDetector {
    classifier: Arc<dyn ProviderClassifier>,
    timeout: Duration,
    cache: Option<Cache<String, Classification>>,
}

impl fmt::Debug for ProviderDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDetector")
            .field("timeout", &self.timeout)
            .field("cache", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}

impl ProviderDetector {
    /// Create a detector around `classifier`.
    pub fn new(classifier: Arc<dyn ProviderClassifier>, config: &DetectorConfig) -> Self {
        let cache = (config.cache_ttl_secs > 0).then(|| {
            Cache::builder()
                .max_capacity(MAX_CACHE_ENTRIES)
                .time_to_live(Duration::from_secs(config.cache_ttl_secs))
                .build()
        });
        Self {
            classifier,
            timeout: config.timeout(),
            cache,
        }
    }

    /// Override the classification timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Detect the provider type at `url`. Never fails.
    pub async fn detect(&self, url: &str) -> DetectionResult {
        let span = tracing::info_span!(SPAN_DETECT);
        self.detect_inner(url).instrument(span).await
    }

    async fn detect_inner(&self, raw: &str) -> DetectionResult {
        let Some(url) = normalize::parse_input(raw) else {
            tracing::debug!("detection input is not a usable URL");
            return DetectionResult::fallback(raw, None, FallbackReason::InvalidUrl);
        };
        let key = normalize::normalize(&url);

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&key).await {
                tracing::debug!(url = %key, "detection cache hit");
                return DetectionResult::classified(&url, hit);
            }
        }

        match tokio::time::timeout(self.timeout, self.classifier.classify(&url)).await {
            Ok(Ok(classification)) => {
                tracing::debug!(url = %key, provider_type = %classification.provider_type, "provider type detected");
                if let Some(cache) = &self.cache {
                    cache.insert(key, classification.clone()).await;
                }
                DetectionResult::classified(&url, classification)
            }
            Ok(Err(err)) => {
                tracing::warn!(url = %key, error = %err, "provider classification failed");
                DetectionResult::fallback(raw, Some(&url), FallbackReason::ClassifierError)
            }
            Err(_) => {
                tracing::warn!(url = %key, timeout_secs = self.timeout.as_secs_f64(), "provider classification timed out");
                DetectionResult::fallback(raw, Some(&url), FallbackReason::Timeout)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SearchError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProviderClassifier for Counting {
        async fn classify(&self, _: &Url) -> Result<Classification> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Classification::new(ProviderType::Api).requiring_key())
        }
    }

    #[derive(Default)]
    struct Broken {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProviderClassifier for Broken {
        async fn classify(&self, _: &Url) -> Result<Classification> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(SearchError::Http("connection refused".into()))
        }
    }

    struct Slow;

    #[async_trait]
    impl ProviderClassifier for Slow {
        async fn classify(&self, _: &Url) -> Result<Classification> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Classification::new(ProviderType::Graphql))
        }
    }

    fn detector(classifier: Arc<dyn ProviderClassifier>) -> ProviderDetector {
        ProviderDetector::new(classifier, &DetectorConfig::default())
    }

    #[tokio::test]
    async fn classification_is_returned_with_suggestions() {
        let d = detector(Arc::new(Counting::default()));
        let result = d.detect("https://www.newsapi.org/v2/everything").await;
        assert_eq!(result.provider_type, ProviderType::Api);
        assert!(result.api_key_required);
        assert_eq!(result.suggested_id, "newsapi");
        assert_eq!(result.suggested_name, "Newsapi");
        assert!(!result.is_fallback());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_classifier_falls_back_within_timeout() {
        let d = detector(Arc::new(Slow)).with_timeout(Duration::from_secs(5));
        let started = tokio::time::Instant::now();
        let result = d.detect("https://slow.example.com").await;
        assert!(started.elapsed() <= Duration::from_secs(6));
        assert_eq!(result.provider_type, ProviderType::Web);
        assert!(!result.api_key_required);
        assert!(result.config.is_empty());
        assert_eq!(result.fallback, Some(FallbackReason::Timeout));
    }

    #[tokio::test]
    async fn bare_host_and_port_is_classified() {
        let d = detector(Arc::new(heuristic::HeuristicClassifier::offline()));

        let local = d.detect("localhost:9200").await;
        assert!(!local.is_fallback());
        assert_eq!(local.suggested_id, "localhost");
        assert_eq!(local.url, "https://localhost:9200/");

        let api = d.detect("search.example.com:8080/api/v1").await;
        assert!(!api.is_fallback());
        assert_eq!(api.provider_type, ProviderType::Api);
        assert_eq!(api.suggested_id, "search");
    }

    #[tokio::test]
    async fn classifier_error_falls_back() {
        let d = detector(Arc::new(Broken::default()));
        let result = d.detect("https://down.example.com").await;
        assert_eq!(result.provider_type, ProviderType::Web);
        assert_eq!(result.fallback, Some(FallbackReason::ClassifierError));
        assert_eq!(result.suggested_id, "down");
    }

    #[tokio::test]
    async fn invalid_url_falls_back_without_calling_classifier() {
        let broken = Arc::new(Broken::default());
        let d = detector(broken.clone());
        let result = d.detect("definitely not a url").await;
        assert_eq!(result.fallback, Some(FallbackReason::InvalidUrl));
        assert_eq!(result.provider_type, ProviderType::Web);
        assert_eq!(broken.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn successful_classification_is_cached_per_normalised_url() {
        let counting = Arc::new(Counting::default());
        let d = detector(counting.clone());
        d.detect("https://API.example.com/v1/").await;
        d.detect("https://api.example.com/v1#docs").await;
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fallbacks_are_not_cached() {
        let broken = Arc::new(Broken::default());
        let d = detector(broken.clone());
        d.detect("https://down.example.com").await;
        d.detect("https://down.example.com").await;
        assert_eq!(broken.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn zero_ttl_disables_cache() {
        let counting = Arc::new(Counting::default());
        let config = DetectorConfig {
            cache_ttl_secs: 0,
            ..Default::default()
        };
        let d = ProviderDetector::new(counting.clone(), &config);
        d.detect("https://api.example.com").await;
        d.detect("https://api.example.com").await;
        assert_eq!(counting.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn into_provider_uses_suggestions() {
        let url = Url::parse("https://www.hasura.io/v1/graphql").expect("url");
        let result = DetectionResult::classified(
            &url,
            Classification::new(ProviderType::Graphql)
                .with_config("graphql_endpoint", "https://www.hasura.io/v1/graphql")
                .requiring_key(),
        );
        let provider = result.into_provider(Some(Secret::new("admin")));
        assert_eq!(provider.id, "hasura");
        assert_eq!(provider.name, "Hasura");
        assert_eq!(provider.base_url(), Some("https://www.hasura.io/v1/graphql"));
        assert!(provider.requires_credential);
        assert!(provider.config_str("graphql_endpoint").is_some());
    }

    #[test]
    fn hostless_urls_use_last_path_segment() {
        let url = Url::parse("file:///srv/Team%20Docs/").expect("url");
        assert_eq!(suggest_id(&url), "team_20docs");
    }

    #[test]
    fn remote_classification_shape_deserialises() {
        let json = r#"{"providerType":"graphql","config":{"graphql_endpoint":"https://x/graphql"},"apiKeyRequired":true}"#;
        let c: Classification = serde_json::from_str(json).expect("deserialize");
        assert_eq!(c.provider_type, ProviderType::Graphql);
        assert!(c.api_key_required);
    }
}
