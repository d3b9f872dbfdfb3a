//! Built-in providers, their filter catalogs, and provider templates.
//!
//! Built-ins are seeded into every registry in the order listed here.
//! Templates are blueprints for user-added providers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::filters::FilterDescriptor;
use crate::types::{Provider, ProviderType, Secret};

const ALL: &str = "all";
const ANY: &str = "any";

/// The built-in providers, in display order.
pub fn builtin_providers() -> Vec<Provider> {
    use ProviderType::{Aggregate, Api};

    vec![
        Provider::new("universal", "Universal Search", Aggregate)
            .with_icon("🔍")
            .with_description("AI-powered universal search across all sources")
            .with_filters(["mode", "depth", "focus"]),
        Provider::new("web", "Web", Aggregate)
            .with_icon("🌐")
            .with_filters(["region", "site", "type"]),
        Provider::new("academic", "Academic", Aggregate)
            .with_icon("📚")
            .with_filters(["journal", "year", "citation_count", "field"]),
        Provider::new("youtube", "YouTube", Aggregate)
            .with_icon("▶️")
            .with_filters(["duration", "channel", "quality", "caption"]),
        Provider::new("wolfram", "Wolfram", Aggregate)
            .with_icon("🧮")
            .with_filters(["category", "complexity", "format"]),
        Provider::new("reddit", "Reddit", Aggregate)
            .with_icon("📱")
            .with_filters(["subreddit", "sort", "time", "flair"]),
        Provider::new("github", "GitHub", Aggregate)
            .with_icon("💻")
            .with_filters(["language", "stars", "forks", "updated"]),
        Provider::new("docs", "Documentation", Aggregate)
            .with_icon("📖")
            .with_filters(["source", "type", "framework", "version", "local"]),
        Provider::new("local_docs", "Local Documents", Aggregate)
            .with_icon("📂")
            .with_filters(["file_type", "folder", "date_modified", "content_type"]),
        Provider::new("metabase", "Analytics", Aggregate)
            .with_icon("📊")
            .with_filters([
                "dashboard",
                "chart_type",
                "time_range",
                "data_source",
                "refresh_rate",
            ]),
        Provider::new("eu_opendata", "EU Data Portal", Api)
            .with_icon("🇪🇺")
            .with_base_url("https://data.europa.eu/api/hub/search/datasets")
            .with_filters(["country", "dataType", "language", "year", "format"]),
        Provider::new("apollo", "Apollo.io", Api)
            .with_icon("🎯")
            .with_base_url("https://api.apollo.io/v1")
            .requiring_credential()
            .with_filters(["region", "companySize", "industry", "technology", "jobTitle"]),
        Provider::new("zefix", "Zefix", Aggregate)
            .with_icon("🇨🇭")
            .with_description("Swiss commercial register")
            .with_filters(["canton", "legalForm", "status", "year"]),
        Provider::new("swissfirms", "Swissfirms", Aggregate)
            .with_icon("🏢")
            .with_filters(["region", "industry", "size"]),
    ]
}

fn universal_filters() -> Vec<FilterDescriptor> {
    vec![
        FilterDescriptor::choice("mode", &["smart", "focused", "comprehensive"], "smart"),
        FilterDescriptor::choice("depth", &["auto", "shallow", "deep"], "auto"),
        FilterDescriptor::choice("focus", &[ALL, "academic", "news", "technical"], ALL),
    ]
}

fn github_filters() -> Vec<FilterDescriptor> {
    vec![
        FilterDescriptor::text("language", ANY),
        FilterDescriptor::range("stars", 0.0, None, 0.0),
        FilterDescriptor::range("forks", 0.0, None, 0.0),
        FilterDescriptor::choice(
            "updated",
            &["anytime", "past_day", "past_week", "past_month", "past_year"],
            "anytime",
        ),
    ]
}

fn apollo_filters() -> Vec<FilterDescriptor> {
    vec![
        FilterDescriptor::multi_choice("region", &["CH", "DACH", "EU"], &["CH", "DACH", "EU"]),
        FilterDescriptor::text("companySize", ALL),
        FilterDescriptor::text("industry", ALL),
        FilterDescriptor::text("technology", ALL),
        FilterDescriptor::text("jobTitle", ALL),
    ]
}

/// Filter catalogs keyed by built-in provider or template id.
pub fn builtin_filter_catalogs() -> Vec<(&'static str, Vec<FilterDescriptor>)> {
    let years = ["all", "2024", "2023", "last5", "last10"];
    let file_types = ["pdf", "doc", "docx", "txt", "md", "json", "csv", "xls", "xlsx"];

    vec![
        ("universal", universal_filters()),
        (
            "web",
            vec![
                FilterDescriptor::text("region", "global"),
                FilterDescriptor::text("site", ""),
                FilterDescriptor::choice("type", &[ALL, "news", "images", "videos"], ALL),
            ],
        ),
        (
            "academic",
            vec![
                FilterDescriptor::text("journal", ""),
                FilterDescriptor::choice("year", &years, ALL),
                FilterDescriptor::range("citation_count", 0.0, None, 0.0),
                FilterDescriptor::text("field", ALL),
            ],
        ),
        (
            "youtube",
            vec![
                FilterDescriptor::choice("duration", &[ANY, "short", "medium", "long"], ANY),
                FilterDescriptor::text("channel", ""),
                FilterDescriptor::choice("quality", &[ANY, "hd", "4k"], ANY),
                FilterDescriptor::boolean("caption", false),
            ],
        ),
        (
            "wolfram",
            vec![
                FilterDescriptor::text("category", ALL),
                FilterDescriptor::choice("complexity", &["simple", "medium", "advanced"], "medium"),
                FilterDescriptor::choice("format", &["simple", "detailed", "step_by_step"], "simple"),
            ],
        ),
        (
            "reddit",
            vec![
                FilterDescriptor::text("subreddit", ""),
                FilterDescriptor::choice("sort", &["relevance", "hot", "top", "new", "comments"], "relevance"),
                FilterDescriptor::choice("time", &[ALL, "hour", "day", "week", "month", "year"], ALL),
                FilterDescriptor::text("flair", ""),
            ],
        ),
        ("github", github_filters()),
        (
            "docs",
            vec![
                FilterDescriptor::text("source", ALL),
                FilterDescriptor::choice("type", &[ALL, "api", "guide", "tutorial", "reference"], ALL),
                FilterDescriptor::text("framework", ALL),
                FilterDescriptor::text("version", "latest"),
                FilterDescriptor::boolean("local", false),
            ],
        ),
        (
            "local_docs",
            vec![
                FilterDescriptor::multi_choice("file_type", &file_types, &file_types),
                FilterDescriptor::text("folder", "/"),
                FilterDescriptor::choice("date_modified", &[ANY, "past_day", "past_week", "past_month", "past_year"], ANY),
                FilterDescriptor::text("content_type", ALL),
            ],
        ),
        (
            "metabase",
            vec![
                FilterDescriptor::text("dashboard", ALL),
                FilterDescriptor::choice("chart_type", &[ANY, "table", "line", "bar", "pie", "scalar"], ANY),
                FilterDescriptor::choice(
                    "time_range",
                    &["auto", "last_day", "last_week", "last_month", "custom"],
                    "auto",
                ),
                FilterDescriptor::text("data_source", ALL),
                FilterDescriptor::choice("refresh_rate", &["auto", "real_time", "hourly", "daily"], "auto"),
            ],
        ),
        (
            "eu_opendata",
            vec![
                FilterDescriptor::multi_choice(
                    "country",
                    &["CH", "DE", "FR", "IT", "AT"],
                    &["CH", "DE", "FR", "IT", "AT"],
                ),
                FilterDescriptor::multi_choice(
                    "dataType",
                    &["company", "economic", "research", "public"],
                    &["company", "economic", "research", "public"],
                ),
                FilterDescriptor::multi_choice("language", &["de", "fr", "it", "en"], &["de", "fr", "it", "en"]),
                FilterDescriptor::text("year", ALL),
                FilterDescriptor::text("format", ALL),
            ],
        ),
        ("apollo", apollo_filters()),
        (
            "zefix",
            vec![
                FilterDescriptor::text("canton", ALL),
                FilterDescriptor::text("legalForm", ALL),
                FilterDescriptor::choice("status", &[ALL, "active", "deleted"], "active"),
                FilterDescriptor::text("year", ALL),
            ],
        ),
        (
            "swissfirms",
            vec![
                FilterDescriptor::text("region", ALL),
                FilterDescriptor::text("industry", ALL),
                FilterDescriptor::text("size", ALL),
            ],
        ),
        ("github_api", github_filters()),
        ("apollo_io", apollo_filters()),
    ]
}

/// Generic filter catalogs per provider type, used for user-added providers.
pub fn type_filter_catalogs() -> Vec<(ProviderType, Vec<FilterDescriptor>)> {
    vec![
        (
            ProviderType::Web,
            vec![
                FilterDescriptor::text("region", "global"),
                FilterDescriptor::text("site", ""),
                FilterDescriptor::choice("type", &[ALL, "news", "images", "videos"], ALL),
            ],
        ),
        (
            ProviderType::Api,
            vec![
                FilterDescriptor::range("limit", 1.0, Some(100.0), 10.0),
                FilterDescriptor::range("offset", 0.0, None, 0.0),
            ],
        ),
        (
            ProviderType::Graphql,
            vec![FilterDescriptor::range("limit", 1.0, Some(100.0), 10.0)],
        ),
        (
            ProviderType::Database,
            vec![
                FilterDescriptor::text("table", ""),
                FilterDescriptor::range("limit", 1.0, Some(1000.0), 50.0),
            ],
        ),
        (
            ProviderType::Filesystem,
            vec![
                FilterDescriptor::multi_choice("file_type", &["pdf", "txt", "md", "docx"], &["pdf", "txt", "md", "docx"]),
                FilterDescriptor::text("folder", "/"),
                FilterDescriptor::choice("date_modified", &[ANY, "past_day", "past_week", "past_month", "past_year"], ANY),
            ],
        ),
        (
            ProviderType::Streaming,
            vec![FilterDescriptor::choice("window", &["live", "1h", "24h"], "live")],
        ),
        (
            ProviderType::Enterprise,
            vec![FilterDescriptor::choice("scope", &[ALL, "users", "groups", "documents"], ALL)],
        ),
        (ProviderType::Aggregate, universal_filters()),
    ]
}

/// A blueprint for a user-added provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderTemplate {
    /// Template id; also the id of the instantiated provider.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Display icon.
    pub icon: String,
    /// Short description shown in template pickers.
    pub description: String,
    /// Type of the instantiated provider.
    pub provider_type: ProviderType,
    /// Default endpoint.
    pub base_url: String,
    /// Whether the instantiated provider needs a credential.
    pub requires_api_key: bool,
    /// Type-specific defaults copied into `Provider::config`.
    pub default_config: BTreeMap<String, serde_json::Value>,
    /// Exposed filter keys.
    pub filters: Vec<String>,
}

impl ProviderTemplate {
    fn new(
        id: &str,
        name: &str,
        icon: &str,
        description: &str,
        provider_type: ProviderType,
        base_url: &str,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            icon: icon.to_string(),
            description: description.to_string(),
            provider_type,
            base_url: base_url.to_string(),
            requires_api_key: false,
            default_config: BTreeMap::new(),
            filters: Vec::new(),
        }
    }

    fn api_key(mut self) -> Self {
        self.requires_api_key = true;
        self
    }

    fn config(mut self, key: &str, value: &str) -> Self {
        self.default_config
            .insert(key.to_string(), serde_json::Value::from(value));
        self
    }

    fn filters(mut self, keys: &[&str]) -> Self {
        self.filters = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    /// Build the provider this template describes.
    ///
    /// The credential is attached as given; the registry decides whether a
    /// missing credential is acceptable.
    pub fn instantiate(&self, credential: Option<Secret>) -> Provider {
        let mut provider = Provider::new(self.id.clone(), self.name.clone(), self.provider_type)
            .with_icon(self.icon.clone())
            .with_description(self.description.clone())
            .with_base_url(self.base_url.clone())
            .with_filters(self.filters.iter().cloned());
        provider.config = self.default_config.clone();
        provider.requires_credential = self.requires_api_key;
        provider.credential = credential;
        provider
    }
}

/// All provider templates.
pub fn templates() -> Vec<ProviderTemplate> {
    use ProviderType::{Api, Database, Graphql, Web};

    vec![
        ProviderTemplate::new(
            "searxng",
            "SearXNG",
            "🔎",
            "Self-hosted SearXNG metasearch instance",
            Web,
            "https://searx.example.org",
        )
        .config("format", "json")
        .filters(&["region", "site", "type"]),
        ProviderTemplate::new(
            "elasticsearch",
            "Elasticsearch",
            "🧭",
            "Elasticsearch cluster over the REST API",
            Api,
            "http://localhost:9200",
        )
        .config("index", "_all")
        .filters(&["limit", "offset"]),
        ProviderTemplate::new(
            "github_api",
            "GitHub API",
            "💻",
            "GitHub code and repository search",
            Api,
            "https://api.github.com",
        )
        .api_key()
        .filters(&["language", "stars", "forks", "updated"]),
        ProviderTemplate::new(
            "hasura",
            "Hasura",
            "🕸️",
            "Hasura GraphQL engine",
            Graphql,
            "https://hasura.example.com",
        )
        .api_key()
        .config("graphql_endpoint", "https://hasura.example.com/v1/graphql")
        .filters(&["limit"]),
        ProviderTemplate::new(
            "postgres",
            "PostgreSQL",
            "🐘",
            "PostgreSQL full-text search",
            Database,
            "postgres://localhost:5432",
        )
        .config("database_url", "postgres://localhost:5432/postgres")
        .filters(&["table", "limit"]),
        ProviderTemplate::new(
            "apollo_io",
            "Apollo.io",
            "🎯",
            "Apollo.io company and contact search",
            Api,
            "https://api.apollo.io/v1",
        )
        .api_key()
        .filters(&["region", "companySize", "industry", "technology", "jobTitle"]),
    ]
}

/// Look up a template by id.
pub fn template(id: &str) -> Option<ProviderTemplate> {
    templates().into_iter().find(|t| t.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn builtin_ids_are_unique_and_ordered() {
        let ids: Vec<String> = builtin_providers().into_iter().map(|p| p.id).collect();
        assert_eq!(ids.len(), 14);
        assert_eq!(ids[0], "universal");
        assert_eq!(ids[13], "swissfirms");
        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn every_builtin_has_a_catalog_covering_its_keys() {
        let catalogs: BTreeMap<_, _> = builtin_filter_catalogs().into_iter().collect();
        for provider in builtin_providers() {
            let catalog = catalogs
                .get(provider.id.as_str())
                .unwrap_or_else(|| panic!("no catalog for {}", provider.id));
            for key in &provider.filters {
                assert!(
                    catalog.iter().any(|d| &d.key == key),
                    "{} missing descriptor {key}",
                    provider.id
                );
            }
        }
    }

    #[test]
    fn catalog_defaults_are_in_domain() {
        for (id, catalog) in builtin_filter_catalogs() {
            for d in catalog {
                assert!(d.accepts(&d.default), "{id}.{} default out of domain", d.key);
            }
        }
        for (t, catalog) in type_filter_catalogs() {
            for d in catalog {
                assert!(d.accepts(&d.default), "{t}.{} default out of domain", d.key);
            }
        }
    }

    #[test]
    fn every_type_has_a_catalog() {
        let types: HashSet<_> = type_filter_catalogs().into_iter().map(|(t, _)| t).collect();
        for t in ProviderType::all() {
            assert!(types.contains(t), "no catalog for {t}");
        }
    }

    #[test]
    fn apollo_requires_credential() {
        let apollo = builtin_providers()
            .into_iter()
            .find(|p| p.id == "apollo")
            .expect("apollo");
        assert!(apollo.requires_credential);
        assert_eq!(apollo.base_url(), Some("https://api.apollo.io/v1"));
    }

    #[test]
    fn template_instantiation_carries_config() {
        let pg = template("postgres").expect("postgres template");
        let provider = pg.instantiate(None);
        assert_eq!(provider.provider_type, ProviderType::Database);
        assert_eq!(
            provider.config_str("database_url"),
            Some("postgres://localhost:5432/postgres")
        );
        assert!(!provider.requires_credential);
    }

    #[test]
    fn credential_templates_require_key() {
        let hasura = template("hasura").expect("hasura template");
        let provider = hasura.instantiate(Some(Secret::new("s3cret")));
        assert!(provider.requires_credential);
        assert_eq!(provider.usable_credential().map(Secret::expose), Some("s3cret"));
    }

    #[test]
    fn unknown_template_is_none() {
        assert!(template("altavista").is_none());
    }
}
