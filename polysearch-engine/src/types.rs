//! Core types: providers, requests, results, and per-provider failures.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SearchError;
use crate::filters::{FilterMap, FilterValue};

/// Kind of data source a provider talks to.
///
/// The type decides which configuration fields are mandatory at
/// registration time (see [`crate::registry::ProviderSettings`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// Scraped or OpenSearch-style web endpoint.
    Web,
    /// REST/JSON API.
    Api,
    /// GraphQL API.
    Graphql,
    /// Direct database access.
    Database,
    /// Local or mounted filesystem.
    Filesystem,
    /// Streaming endpoint (websocket, SSE).
    Streaming,
    /// Enterprise directory or transfer service (LDAP, FTP).
    Enterprise,
    /// Pure aggregation provider served by the host backend; no endpoint of its own.
    Aggregate,
}

impl ProviderType {
    /// Stable lowercase name used in config files and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Api => "api",
            Self::Graphql => "graphql",
            Self::Database => "database",
            Self::Filesystem => "filesystem",
            Self::Streaming => "streaming",
            Self::Enterprise => "enterprise",
            Self::Aggregate => "aggregate",
        }
    }

    /// Whether a provider of this type must carry a base URL.
    pub fn requires_base_url(&self) -> bool {
        !matches!(self, Self::Aggregate)
    }

    /// Type-specific `config` keys that must be present and non-empty.
    pub fn required_config_keys(&self) -> &'static [&'static str] {
        match self {
            Self::Graphql => &["graphql_endpoint"],
            Self::Database => &["database_url"],
            Self::Filesystem => &["filesystem_path"],
            Self::Streaming => &["streaming_endpoint"],
            Self::Web | Self::Api | Self::Enterprise | Self::Aggregate => &[],
        }
    }

    /// Returns all variants.
    pub fn all() -> &'static [ProviderType] {
        &[
            Self::Web,
            Self::Api,
            Self::Graphql,
            Self::Database,
            Self::Filesystem,
            Self::Streaming,
            Self::Enterprise,
            Self::Aggregate,
        ]
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderType {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SearchError::Config(format!("unknown provider type '{s}'")))
    }
}

/// A credential whose value never appears in `Debug` or `Display` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the inner value. Only call this where the value is sent, never logged.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// True if the wrapped value is empty or whitespace.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(\"[REDACTED]\")")
    }
}

fn default_icon() -> String {
    "🔍".to_string()
}

/// A registered data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    /// Globally unique id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Display icon.
    #[serde(default = "default_icon")]
    pub icon: String,
    /// Optional human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Determines which configuration fields are mandatory.
    pub provider_type: ProviderType,
    /// Ordered filter keys this provider exposes.
    #[serde(default)]
    pub filters: Vec<String>,
    /// Endpoint the provider is queried at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// API key or token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<Secret>,
    /// Whether a credential is mandatory for this provider.
    #[serde(default)]
    pub requires_credential: bool,
    /// Headers forwarded verbatim on every dispatch.
    #[serde(default)]
    pub custom_headers: BTreeMap<String, String>,
    /// Type-specific settings (`database_url`, `graphql_endpoint`, ...).
    #[serde(default)]
    pub config: BTreeMap<String, serde_json::Value>,
}

impl Provider {
    /// Create a provider with only identity and type set.
    pub fn new(id: impl Into<String>, name: impl Into<String>, provider_type: ProviderType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            icon: default_icon(),
            description: None,
            provider_type,
            filters: Vec::new(),
            base_url: None,
            credential: None,
            requires_credential: false,
            custom_headers: BTreeMap::new(),
            config: BTreeMap::new(),
        }
    }

    /// Set the display icon.
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the exposed filter keys, in order.
    pub fn with_filters<I, S>(mut self, filters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters = filters.into_iter().map(Into::into).collect();
        self
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Attach a credential.
    pub fn with_credential(mut self, credential: Secret) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Mark the provider as requiring a credential.
    pub fn requiring_credential(mut self) -> Self {
        self.requires_credential = true;
        self
    }

    /// Add a custom header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.insert(name.into(), value.into());
        self
    }

    /// Add a config entry.
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Returns a config entry as a non-empty string, if present.
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Returns the base URL if present and non-empty.
    pub fn base_url(&self) -> Option<&str> {
        self.base_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Returns the credential if present and non-blank.
    pub fn usable_credential(&self) -> Option<&Secret> {
        self.credential.as_ref().filter(|c| !c.is_blank())
    }
}

/// Result ordering policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Descending relevance score.
    #[default]
    Relevance,
    /// Newest first; undated results last.
    Date,
    /// Descending popularity; missing counts as zero.
    Popularity,
}

impl SortKey {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Relevance => "relevance",
            Self::Date => "date",
            Self::Popularity => "popularity",
        }
    }
}

impl FromStr for SortKey {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relevance" => Ok(Self::Relevance),
            "date" => Ok(Self::Date),
            "popularity" => Ok(Self::Popularity),
            other => Err(SearchError::InvalidRequest(format!("unknown sort key '{other}'"))),
        }
    }
}

/// Global time constraint applied by providers that support it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    /// No restriction.
    #[default]
    Anytime,
    /// Last 24 hours.
    PastDay,
    /// Last 7 days.
    PastWeek,
    /// Last month.
    PastMonth,
    /// Last year.
    PastYear,
}

impl FromStr for TimeRange {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anytime" | "any" => Ok(Self::Anytime),
            "past_day" | "day" => Ok(Self::PastDay),
            "past_week" | "week" => Ok(Self::PastWeek),
            "past_month" | "month" => Ok(Self::PastMonth),
            "past_year" | "year" => Ok(Self::PastYear),
            other => Err(SearchError::InvalidRequest(format!("unknown time range '{other}'"))),
        }
    }
}

fn default_language() -> String {
    "en".to_string()
}

/// One federated search request. Treated as immutable once dispatched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Query text.
    pub query: String,
    /// Selected provider ids, in selection order.
    pub providers: Vec<String>,
    /// Per-provider filter overrides keyed by provider id.
    #[serde(default)]
    pub filters: HashMap<String, FilterMap>,
    /// Global time constraint.
    #[serde(default)]
    pub time_range: TimeRange,
    /// Result ordering.
    #[serde(default)]
    pub sort_by: SortKey,
    /// Preferred result language.
    #[serde(default = "default_language")]
    pub language: String,
}

impl SearchRequest {
    /// Create a request with default constraints.
    pub fn new<I, S>(query: impl Into<String>, providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            query: query.into(),
            providers: providers.into_iter().map(Into::into).collect(),
            filters: HashMap::new(),
            time_range: TimeRange::default(),
            sort_by: SortKey::default(),
            language: default_language(),
        }
    }

    /// Override one filter for one provider.
    pub fn with_filter(
        mut self,
        provider_id: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<FilterValue>,
    ) -> Self {
        self.filters
            .entry(provider_id.into())
            .or_default()
            .insert(key.into(), value.into());
        self
    }

    /// Set the sort key.
    pub fn with_sort(mut self, sort_by: SortKey) -> Self {
        self.sort_by = sort_by;
        self
    }

    /// Set the time range.
    pub fn with_time_range(mut self, time_range: TimeRange) -> Self {
        self.time_range = time_range;
        self
    }

    /// Set the language.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Checks that the request can be dispatched at all.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.query.trim().is_empty() {
            return Err(SearchError::InvalidRequest("query must not be empty".into()));
        }
        if self.providers.is_empty() {
            return Err(SearchError::InvalidRequest(
                "at least one provider must be selected".into(),
            ));
        }
        Ok(())
    }
}

/// A single merged search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Unique within one response.
    #[serde(default)]
    pub id: String,
    /// Provider that produced this result.
    #[serde(default, alias = "providerId", alias = "provider")]
    pub provider_id: String,
    /// Title.
    pub title: String,
    /// Text snippet.
    #[serde(default)]
    pub snippet: String,
    /// Link to the source, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Provider-defined relevance (higher is better).
    #[serde(default, alias = "relevanceScore", alias = "relevance")]
    pub relevance_score: f64,
    /// Publication or modification date. Unreadable dates become `None`.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_date"
    )]
    pub date: Option<DateTime<Utc>>,
    /// Popularity signal (views, stars, citations).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popularity: Option<f64>,
    /// Provider-specific payload, e.g. an embeddable dashboard reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl SearchResult {
    /// Create a result with only the required fields.
    pub fn new(id: impl Into<String>, title: impl Into<String>, relevance_score: f64) -> Self {
        Self {
            id: id.into(),
            provider_id: String::new(),
            title: title.into(),
            snippet: String::new(),
            url: None,
            relevance_score,
            date: None,
            popularity: None,
            payload: None,
        }
    }
}

/// Accepts RFC 3339 timestamps, plain `YYYY-MM-DD` dates and Unix seconds.
/// Anything else is treated as undated rather than failing the whole body.
fn lenient_date<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::String(text)) => parse_date(text.trim()),
        Some(serde_json::Value::Number(n)) => n.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0)),
        _ => None,
    })
}

fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Some(at.with_timezone(&Utc));
    }
    chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|at| at.and_utc())
}

/// Why a provider contributed no results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The adapter returned an error.
    Error,
    /// The per-provider timeout elapsed.
    Timeout,
    /// The overall deadline elapsed before the provider settled.
    Cancelled,
    /// The provider's circuit breaker is open.
    CircuitOpen,
    /// The provider requires a credential and has none.
    MissingCredential,
    /// No adapter is routed for this provider.
    NoAdapter,
}

/// A non-fatal per-provider dispatch failure, attached to a response as a warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFailure {
    /// Provider that failed.
    pub provider_id: String,
    /// Failure category.
    pub kind: FailureKind,
    /// Human-readable reason.
    pub reason: String,
}

impl ProviderFailure {
    /// An adapter error.
    pub fn new(provider_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::with_kind(provider_id, FailureKind::Error, reason)
    }

    /// A failure of the given kind.
    pub fn with_kind(
        provider_id: impl Into<String>,
        kind: FailureKind,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            kind,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.provider_id, self.reason)
    }
}

/// Outcome classification of a successful dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    /// Every selected provider answered.
    Complete,
    /// Some providers failed; `failed` warnings are attached.
    Partial {
        /// Number of failed providers.
        failed: usize,
    },
}

/// Merged results plus per-provider warnings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Ranked results.
    pub results: Vec<SearchResult>,
    /// One entry per provider that contributed nothing because it failed.
    pub warnings: Vec<ProviderFailure>,
}

impl SearchResponse {
    /// Full or partial success.
    pub fn status(&self) -> DispatchStatus {
        if self.warnings.is_empty() {
            DispatchStatus::Complete
        } else {
            DispatchStatus::Partial {
                failed: self.warnings.len(),
            }
        }
    }
}
