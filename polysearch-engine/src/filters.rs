//! Filter schema: per-provider and per-type catalogs of filter fields.
//!
//! Every provider exposes an ordered list of filter keys. The schema maps
//! those keys to [`FilterDescriptor`]s (value domain + default) and resolves
//! the effective filters for a request: catalog defaults overridden by the
//! caller's values for declared keys only. Overrides for keys the provider
//! does not declare are ignored.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Provider, ProviderType};

/// A single filter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Boolean toggle.
    Bool(bool),
    /// Numeric value.
    Number(f64),
    /// Free text or a single choice.
    Text(String),
    /// Multi-select choice.
    List(Vec<String>),
}

impl FilterValue {
    /// Parse a value typed on a command line or form field.
    ///
    /// `true`/`false` become booleans, numbers become numbers, comma-separated
    /// values become lists, anything else is text.
    pub fn parse_loose(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Ok(b) = trimmed.parse::<bool>() {
            return Self::Bool(b);
        }
        if let Ok(n) = trimmed.parse::<f64>() {
            return Self::Number(n);
        }
        if trimmed.contains(',') {
            return Self::List(
                trimmed
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            );
        }
        Self::Text(trimmed.to_string())
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
            Self::List(items) => f.write_str(&items.join(",")),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<u32> for FilterValue {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<Vec<String>> for FilterValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

/// Effective filters for one provider, ordered by key.
pub type FilterMap = BTreeMap<String, FilterValue>;

/// The set of values a filter accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterDomain {
    /// Exactly one of the listed options.
    Choice {
        /// Allowed values.
        options: Vec<String>,
    },
    /// Any subset of the listed options.
    MultiChoice {
        /// Allowed values.
        options: Vec<String>,
    },
    /// A number within `[min, max]`; `max` unbounded when `None`.
    Range {
        /// Inclusive lower bound.
        min: f64,
        /// Inclusive upper bound.
        max: Option<f64>,
    },
    /// True or false.
    Boolean,
    /// Any text.
    Text,
}

/// One filter field: key, value domain, and default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDescriptor {
    /// Filter key as sent to the provider.
    pub key: String,
    /// Accepted values.
    pub domain: FilterDomain,
    /// Value used when the caller does not override it.
    pub default: FilterValue,
}

impl FilterDescriptor {
    /// A single-choice filter.
    pub fn choice(key: &str, options: &[&str], default: &str) -> Self {
        Self {
            key: key.to_string(),
            domain: FilterDomain::Choice {
                options: options.iter().map(|s| s.to_string()).collect(),
            },
            default: FilterValue::Text(default.to_string()),
        }
    }

    /// A multi-choice filter.
    pub fn multi_choice(key: &str, options: &[&str], default: &[&str]) -> Self {
        Self {
            key: key.to_string(),
            domain: FilterDomain::MultiChoice {
                options: options.iter().map(|s| s.to_string()).collect(),
            },
            default: FilterValue::List(default.iter().map(|s| s.to_string()).collect()),
        }
    }

    /// A numeric range filter.
    pub fn range(key: &str, min: f64, max: Option<f64>, default: f64) -> Self {
        Self {
            key: key.to_string(),
            domain: FilterDomain::Range { min, max },
            default: FilterValue::Number(default),
        }
    }

    /// A boolean filter.
    pub fn boolean(key: &str, default: bool) -> Self {
        Self {
            key: key.to_string(),
            domain: FilterDomain::Boolean,
            default: FilterValue::Bool(default),
        }
    }

    /// A free-text filter.
    pub fn text(key: &str, default: &str) -> Self {
        Self {
            key: key.to_string(),
            domain: FilterDomain::Text,
            default: FilterValue::Text(default.to_string()),
        }
    }

    /// Whether `value` lies inside this descriptor's domain.
    pub fn accepts(&self, value: &FilterValue) -> bool {
        match (&self.domain, value) {
            (FilterDomain::Choice { options }, FilterValue::Text(s)) => options.contains(s),
            (FilterDomain::MultiChoice { options }, FilterValue::List(items)) => {
                items.iter().all(|item| options.contains(item))
            }
            (FilterDomain::MultiChoice { options }, FilterValue::Text(s)) => options.contains(s),
            (FilterDomain::Range { min, max }, FilterValue::Number(n)) => {
                *n >= *min && max.map_or(true, |m| *n <= m)
            }
            (FilterDomain::Boolean, FilterValue::Bool(_)) => true,
            (FilterDomain::Text, FilterValue::Text(_)) => true,
            _ => false,
        }
    }
}

/// Which catalog to look up.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SchemaKey {
    /// The catalog of one built-in provider.
    Provider(String),
    /// The generic catalog for a provider type.
    Type(ProviderType),
}

/// Static filter catalogs keyed by provider id and by provider type.
#[derive(Debug, Clone, Default)]
pub struct FilterSchema {
    by_provider: HashMap<String, Vec<FilterDescriptor>>,
    by_type: HashMap<ProviderType, Vec<FilterDescriptor>>,
}

impl FilterSchema {
    /// An empty schema. Every declared key resolves to a free-text filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// The catalogs for the built-in providers and every provider type.
    pub fn builtin() -> Self {
        let mut schema = Self::new();
        for (id, descriptors) in crate::catalog::builtin_filter_catalogs() {
            schema = schema.with_provider_catalog(id, descriptors);
        }
        for (provider_type, descriptors) in crate::catalog::type_filter_catalogs() {
            schema = schema.with_type_catalog(provider_type, descriptors);
        }
        schema
    }

    /// Add or replace the catalog for one provider id.
    pub fn with_provider_catalog(
        mut self,
        provider_id: impl Into<String>,
        descriptors: Vec<FilterDescriptor>,
    ) -> Self {
        self.by_provider.insert(provider_id.into(), descriptors);
        self
    }

    /// Add or replace the catalog for one provider type.
    pub fn with_type_catalog(
        mut self,
        provider_type: ProviderType,
        descriptors: Vec<FilterDescriptor>,
    ) -> Self {
        self.by_type.insert(provider_type, descriptors);
        self
    }

    /// The raw catalog for a provider id or type, in catalog order.
    pub fn descriptors_for(&self, key: &SchemaKey) -> &[FilterDescriptor] {
        let found = match key {
            SchemaKey::Provider(id) => self.by_provider.get(id),
            SchemaKey::Type(t) => self.by_type.get(t),
        };
        found.map(Vec::as_slice).unwrap_or_default()
    }

    /// The descriptors a provider exposes, in the provider's declared order.
    ///
    /// Keys are looked up in the provider's own catalog first, then in its
    /// type catalog. Declared keys found in neither become free-text filters
    /// with an empty default. A provider that declares no keys exposes its
    /// whole catalog.
    pub fn descriptors_for_provider(&self, provider: &Provider) -> Vec<FilterDescriptor> {
        let own = self.descriptors_for(&SchemaKey::Provider(provider.id.clone()));
        let by_type = self.descriptors_for(&SchemaKey::Type(provider.provider_type));

        if provider.filters.is_empty() {
            return if own.is_empty() { by_type } else { own }.to_vec();
        }

        provider
            .filters
            .iter()
            .map(|key| {
                own.iter()
                    .chain(by_type.iter())
                    .find(|d| &d.key == key)
                    .cloned()
                    .unwrap_or_else(|| FilterDescriptor::text(key, ""))
            })
            .collect()
    }

    /// Resolve the effective filters for `provider`.
    ///
    /// Starts from every descriptor's default and applies each override whose
    /// key is declared. Undeclared override keys are left out. Values outside
    /// a descriptor's domain are still applied.
    pub fn resolve(&self, provider: &Provider, overrides: Option<&FilterMap>) -> FilterMap {
        let descriptors = self.descriptors_for_provider(provider);
        let mut effective: FilterMap = descriptors
            .iter()
            .map(|d| (d.key.clone(), d.default.clone()))
            .collect();

        if let Some(overrides) = overrides {
            for descriptor in &descriptors {
                if let Some(value) = overrides.get(&descriptor.key) {
                    if !descriptor.accepts(value) {
                        tracing::debug!(
                            provider = %provider.id,
                            key = %descriptor.key,
                            %value,
                            "filter override outside declared domain"
                        );
                    }
                    effective.insert(descriptor.key.clone(), value.clone());
                }
            }
        }

        effective
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn youtube() -> Provider {
        Provider::new("youtube", "YouTube", ProviderType::Aggregate)
            .with_filters(["duration", "channel", "quality", "caption"])
    }

    #[test]
    fn builtin_descriptors_follow_declared_order() {
        let schema = FilterSchema::builtin();
        let keys: Vec<String> = schema
            .descriptors_for_provider(&youtube())
            .into_iter()
            .map(|d| d.key)
            .collect();
        assert_eq!(keys, ["duration", "channel", "quality", "caption"]);
    }

    #[test]
    fn resolve_without_overrides_yields_defaults() {
        let schema = FilterSchema::builtin();
        let resolved = schema.resolve(&youtube(), None);
        assert_eq!(resolved.get("duration"), Some(&FilterValue::from("any")));
        assert_eq!(resolved.get("caption"), Some(&FilterValue::Bool(false)));
        assert_eq!(resolved.len(), 4);
    }

    #[test]
    fn resolve_applies_declared_overrides() {
        let schema = FilterSchema::builtin();
        let mut overrides = FilterMap::new();
        overrides.insert("duration".into(), "short".into());
        overrides.insert("caption".into(), true.into());

        let resolved = schema.resolve(&youtube(), Some(&overrides));
        assert_eq!(resolved.get("duration"), Some(&FilterValue::from("short")));
        assert_eq!(resolved.get("caption"), Some(&FilterValue::Bool(true)));
        assert_eq!(resolved.get("quality"), Some(&FilterValue::from("any")));
    }

    #[test]
    fn undeclared_overrides_do_not_change_result() {
        let schema = FilterSchema::builtin();
        let mut declared = FilterMap::new();
        declared.insert("channel".into(), "rustconf".into());

        let mut noisy = declared.clone();
        noisy.insert("stars".into(), 500u32.into());
        noisy.insert("subreddit".into(), "rust".into());

        assert_eq!(
            schema.resolve(&youtube(), Some(&declared)),
            schema.resolve(&youtube(), Some(&noisy))
        );
        assert!(!schema.resolve(&youtube(), Some(&noisy)).contains_key("stars"));
    }

    #[test]
    fn unknown_declared_key_becomes_text_filter() {
        let schema = FilterSchema::builtin();
        let provider = Provider::new("intranet", "Intranet", ProviderType::Api)
            .with_base_url("https://intranet.example")
            .with_filters(["department"]);
        let descriptors = schema.descriptors_for_provider(&provider);
        assert_eq!(descriptors, vec![FilterDescriptor::text("department", "")]);
    }

    #[test]
    fn provider_without_declared_keys_exposes_type_catalog() {
        let schema = FilterSchema::builtin();
        let provider = Provider::new("pg", "Warehouse", ProviderType::Database);
        let descriptors = schema.descriptors_for_provider(&provider);
        assert_eq!(
            descriptors,
            schema.descriptors_for(&SchemaKey::Type(ProviderType::Database))
        );
        assert!(!descriptors.is_empty());
    }

    #[test]
    fn descriptors_for_unknown_key_is_empty() {
        let schema = FilterSchema::new();
        assert!(schema
            .descriptors_for(&SchemaKey::Provider("nope".into()))
            .is_empty());
    }

    #[test]
    fn resolve_is_deterministic() {
        let schema = FilterSchema::builtin();
        let a = schema.resolve(&youtube(), None);
        let b = schema.resolve(&youtube(), None);
        assert_eq!(a, b);
    }

    #[test]
    fn accepts_checks_domain() {
        let d = FilterDescriptor::choice("mode", &["smart", "focused"], "smart");
        assert!(d.accepts(&"focused".into()));
        assert!(!d.accepts(&"deep".into()));

        let r = FilterDescriptor::range("stars", 0.0, None, 0.0);
        assert!(r.accepts(&FilterValue::Number(10_000.0)));
        assert!(!r.accepts(&FilterValue::Number(-1.0)));

        let m = FilterDescriptor::multi_choice("file_type", &["pdf", "md"], &["pdf"]);
        assert!(m.accepts(&FilterValue::List(vec!["md".into()])));
        assert!(!m.accepts(&FilterValue::List(vec!["exe".into()])));

        assert!(FilterDescriptor::boolean("local", false).accepts(&true.into()));
        assert!(!FilterDescriptor::text("site", "").accepts(&true.into()));
    }

    #[test]
    fn out_of_domain_override_still_applied() {
        let schema = FilterSchema::builtin();
        let mut overrides = FilterMap::new();
        overrides.insert("quality".into(), "8k".into());
        let resolved = schema.resolve(&youtube(), Some(&overrides));
        assert_eq!(resolved.get("quality"), Some(&FilterValue::from("8k")));
    }

    #[test]
    fn parse_loose_values() {
        assert_eq!(FilterValue::parse_loose("true"), FilterValue::Bool(true));
        assert_eq!(FilterValue::parse_loose("42"), FilterValue::Number(42.0));
        assert_eq!(
            FilterValue::parse_loose("pdf, md"),
            FilterValue::List(vec!["pdf".into(), "md".into()])
        );
        assert_eq!(FilterValue::parse_loose("rust"), FilterValue::from("rust"));
    }

    #[test]
    fn filter_value_untagged_serde() {
        let json = r#"{"a":true,"b":3,"c":"x","d":["p","q"]}"#;
        let map: FilterMap = serde_json::from_str(json).expect("deserialize");
        assert_eq!(map.get("a"), Some(&FilterValue::Bool(true)));
        assert_eq!(map.get("b"), Some(&FilterValue::Number(3.0)));
        assert_eq!(map.get("c"), Some(&FilterValue::from("x")));
        assert_eq!(
            map.get("d"),
            Some(&FilterValue::List(vec!["p".into(), "q".into()]))
        );
    }
}
