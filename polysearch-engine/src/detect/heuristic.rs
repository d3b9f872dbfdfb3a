//! Local rule-based classifier with an optional HTTP probe.
//!
//! # Rules
//!
//! | Input                                         | Type        |
//! |-----------------------------------------------|-------------|
//! | `postgres`, `mysql`, `mongodb`, ... scheme    | database    |
//! | `file` scheme                                 | filesystem  |
//! | `ws` / `wss` scheme                           | streaming   |
//! | `ldap`, `ftp`, `sftp` scheme                  | enterprise  |
//! | path ending in `/graphql`                     | graphql     |
//! | `api.` host or `/api` path                    | api (key)   |
//! | probe: JSON content type                      | api         |
//! | probe: `text/event-stream`                    | streaming   |
//! | probe: 401 / 403                              | api (key)   |
//! | probe: HTML with an OpenSearch link           | web         |
//! | anything else                                 | web         |

use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use super::{Classification, ProviderClassifier};
use crate::error::{Result, SearchError};
use crate::http::{build_client, describe_reqwest_error};
use crate::types::ProviderType;

const DATABASE_SCHEMES: &[&str] = &[
    "postgres",
    "postgresql",
    "mysql",
    "mariadb",
    "mongodb",
    "mongodb+srv",
    "redis",
    "sqlite",
];

const ENTERPRISE_SCHEMES: &[&str] = &["ldap", "ldaps", "ftp", "ftps", "sftp"];

/// Classifies URLs from their shape, probing HTTP endpoints when enabled.
#[derive(Debug, Clone)]
pub struct HeuristicClassifier {
    client: Option<reqwest::Client>,
}

impl HeuristicClassifier {
    /// A classifier that probes HTTP endpoints, each probe bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Http`] if the HTTP client cannot be built.
    pub fn with_probe(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Some(build_client(timeout, None)?),
        })
    }

    /// A classifier that never touches the network.
    pub fn offline() -> Self {
        Self { client: None }
    }

    fn classify_shape(url: &Url) -> Option<Classification> {
        let scheme = url.scheme();
        if DATABASE_SCHEMES.contains(&scheme) {
            return Some(
                Classification::new(ProviderType::Database).with_config("database_url", url.as_str()),
            );
        }
        if scheme == "file" {
            return Some(
                Classification::new(ProviderType::Filesystem)
                    .with_config("filesystem_path", url.path()),
            );
        }
        if matches!(scheme, "ws" | "wss") {
            return Some(
                Classification::new(ProviderType::Streaming)
                    .with_config("streaming_endpoint", url.as_str()),
            );
        }
        if ENTERPRISE_SCHEMES.contains(&scheme) {
            return Some(Classification::new(ProviderType::Enterprise));
        }

        let path = url.path().trim_end_matches('/').to_lowercase();
        if path.ends_with("/graphql") {
            return Some(
                Classification::new(ProviderType::Graphql)
                    .with_config("graphql_endpoint", url.as_str()),
            );
        }

        let host = url.host_str().unwrap_or_default();
        if host.starts_with("api.") || path == "/api" || path.starts_with("/api/") {
            return Some(Classification::new(ProviderType::Api).requiring_key());
        }
        None
    }

    async fn probe(&self, client: &reqwest::Client, url: &Url) -> Result<Classification> {
        let response = client
            .get(url.as_str())
            .header(
                reqwest::header::ACCEPT,
                "application/json, text/html;q=0.9, */*;q=0.5",
            )
            .send()
            .await
            .map_err(|e| SearchError::Http(describe_reqwest_error(&e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Ok(Classification::new(ProviderType::Api).requiring_key());
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_lowercase();

        if content_type.contains("text/event-stream") {
            return Ok(Classification::new(ProviderType::Streaming)
                .with_config("streaming_endpoint", url.as_str()));
        }
        if content_type.contains("json") {
            return Ok(Classification::new(ProviderType::Api));
        }
        if content_type.contains("html") && status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|e| SearchError::Http(describe_reqwest_error(&e)))?;
            let mut classification = Classification::new(ProviderType::Web);
            if let Some(href) = opensearch_link(&body, url) {
                classification = classification.with_config("opensearch_url", href);
            }
            return Ok(classification);
        }
        Ok(Classification::new(ProviderType::Web))
    }
}

/// Absolute URL of the page's OpenSearch description, if it links one.
fn opensearch_link(html: &str, base: &Url) -> Option<String> {
    let document = Html::parse_document(html);
    let selector =
        Selector::parse(r#"link[rel="search"][type="application/opensearchdescription+xml"]"#).ok()?;
    let href = document
        .select(&selector)
        .find_map(|el| el.value().attr("href"))?;
    base.join(href).ok().map(|u| u.to_string())
}

#[async_trait]
impl ProviderClassifier for HeuristicClassifier {
    async fn classify(&self, url: &Url) -> Result<Classification> {
        if let Some(classification) = Self::classify_shape(url) {
            return Ok(classification);
        }
        match (&self.client, url.scheme()) {
            (Some(client), "http" | "https") => self.probe(client, url).await,
            (_, "http" | "https") => Ok(Classification::new(ProviderType::Web)),
            (_, scheme) => Err(SearchError::Parse(format!("unsupported URL scheme '{scheme}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn offline(raw: &str) -> Classification {
        let url = Url::parse(raw).expect("url");
        HeuristicClassifier::offline()
            .classify(&url)
            .await
            .expect("classify")
    }

    fn prober() -> HeuristicClassifier {
        HeuristicClassifier::with_probe(Duration::from_secs(2)).expect("client")
    }

    #[tokio::test]
    async fn scheme_rules() {
        let db = offline("postgres://db.internal:5432/app").await;
        assert_eq!(db.provider_type, ProviderType::Database);
        assert!(db.config.contains_key("database_url"));

        let fs = offline("file:///srv/docs").await;
        assert_eq!(fs.provider_type, ProviderType::Filesystem);
        assert_eq!(fs.config["filesystem_path"], "/srv/docs");

        let ws = offline("wss://stream.example.com/feed").await;
        assert_eq!(ws.provider_type, ProviderType::Streaming);

        let ldap = offline("ldap://directory.corp").await;
        assert_eq!(ldap.provider_type, ProviderType::Enterprise);
    }

    #[tokio::test]
    async fn path_and_host_rules() {
        let gql = offline("https://hasura.example.com/v1/graphql").await;
        assert_eq!(gql.provider_type, ProviderType::Graphql);
        assert_eq!(gql.config["graphql_endpoint"], "https://hasura.example.com/v1/graphql");

        let api = offline("https://api.github.com").await;
        assert_eq!(api.provider_type, ProviderType::Api);
        assert!(api.api_key_required);

        let api_path = offline("https://example.com/api/v2/search").await;
        assert_eq!(api_path.provider_type, ProviderType::Api);
    }

    #[tokio::test]
    async fn offline_http_defaults_to_web() {
        let web = offline("https://example.com/blog").await;
        assert_eq!(web.provider_type, ProviderType::Web);
        assert!(!web.api_key_required);
    }

    #[tokio::test]
    async fn unknown_scheme_is_an_error() {
        let url = Url::parse("gopher://old.example").expect("url");
        assert!(HeuristicClassifier::offline().classify(&url).await.is_err());
    }

    #[tokio::test]
    async fn json_response_is_api() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/search", server.uri())).expect("url");
        let c = prober().classify(&url).await.expect("classify");
        assert_eq!(c.provider_type, ProviderType::Api);
        assert!(!c.api_key_required);
    }

    #[tokio::test]
    async fn auth_challenge_requires_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).expect("url");
        let c = prober().classify(&url).await.expect("classify");
        assert!(c.api_key_required);
    }

    #[tokio::test]
    async fn event_stream_response_is_streaming() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("data: hi\n\n", "text/event-stream"),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).expect("url");
        let c = prober().classify(&url).await.expect("classify");
        assert_eq!(c.provider_type, ProviderType::Streaming);
    }

    #[tokio::test]
    async fn html_response_finds_opensearch_link() {
        let server = MockServer::start().await;
        let page = r#"<html><head>
            <link rel="search" type="application/opensearchdescription+xml" href="/opensearch.xml" title="Example">
            </head><body>hi</body></html>"#;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(page, "text/html; charset=utf-8"),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).expect("url");
        let c = prober().classify(&url).await.expect("classify");
        assert_eq!(c.provider_type, ProviderType::Web);
        assert_eq!(
            c.config["opensearch_url"],
            format!("{}/opensearch.xml", server.uri())
        );
    }

    #[test]
    fn opensearch_link_absent() {
        let base = Url::parse("https://example.com").expect("url");
        assert!(opensearch_link("<html><head></head></html>", &base).is_none());
    }
}
