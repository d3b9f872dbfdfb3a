//! Provider persistence.
//!
//! [`TomlProviderStore`] keeps user-added providers in a local TOML file,
//! written atomically, and loads them back on startup. Credentials are never
//! written: they are configured as secret references under
//! `[credentials.<id>]` in `config.toml`.
//!
//! [`HttpProviderStore`] forwards each new provider to the backend.
//! [`MirroredStore`] writes locally and then mirrors to the backend; a mirror
//! failure comes back as a receipt warning.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use polysearch_engine::{Provider, ProviderStore, SearchError, StoreReceipt};
use serde::{Deserialize, Serialize};

use crate::backend::{BackendClient, PROVIDERS_PATH};
use crate::config::persist::write_toml_text_atomic;
use crate::error::{AppError, Result};

/// One provider as written to the providers file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredProvider {
    /// When the provider was added.
    pub created_at: DateTime<Utc>,
    /// The provider definition, without its credential.
    #[serde(flatten)]
    pub provider: Provider,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProvidersFile {
    #[serde(default)]
    providers: Vec<StoredProvider>,
}

/// Local TOML-backed provider store.
#[derive(Debug, Clone)]
pub struct TomlProviderStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl TomlProviderStore {
    /// A store writing to `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// The providers file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every stored provider, in the order they were added. A missing file
    /// is an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`] if the file cannot be read or parsed.
    pub fn load(&self) -> Result<Vec<StoredProvider>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        read_file(&self.path).map(|file| file.providers)
    }

    fn append(path: &Path, provider: &Provider) -> Result<()> {
        let mut file = read_file(path)?;
        if file.providers.iter().any(|p| p.provider.id == provider.id) {
            return Err(AppError::Store(format!(
                "provider '{}' is already stored",
                provider.id
            )));
        }

        let mut provider = provider.clone();
        provider.credential = None;
        provider.config.retain(|_, value| !value.is_null());
        file.providers.push(StoredProvider {
            created_at: Utc::now(),
            provider,
        });

        let text = toml::to_string_pretty(&file)
            .map_err(|e| AppError::Store(format!("failed to serialize providers: {e}")))?;
        write_toml_text_atomic(path, &text).map_err(AppError::Store)
    }
}

fn read_file(path: &Path) -> Result<ProvidersFile> {
    if !path.exists() {
        return Ok(ProvidersFile::default());
    }
    let text = std::fs::read_to_string(path).map_err(|e| {
        AppError::Store(format!(
            "failed to read providers file '{}': {e}",
            path.display()
        ))
    })?;
    toml::from_str(&text).map_err(|e| {
        AppError::Store(format!(
            "failed to parse providers file '{}': {e}",
            path.display()
        ))
    })
}

#[async_trait]
impl ProviderStore for TomlProviderStore {
    async fn create_provider(&self, provider: &Provider) -> polysearch_engine::Result<StoreReceipt> {
        let path = self.path.clone();
        let lock = Arc::clone(&self.lock);
        let provider = provider.clone();
        let id = provider.id.clone();

        tokio::task::spawn_blocking(move || {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            Self::append(&path, &provider)
        })
        .await
        .map_err(|e| SearchError::Persistence(format!("store task failed: {e}")))?
        .map_err(|e| SearchError::Persistence(e.to_string()))?;

        tracing::debug!(provider = %id, "provider written to local store");
        Ok(StoreReceipt::new(id))
    }
}

#[derive(Serialize)]
struct CreateBody<'a> {
    name: &'a str,
    provider_type: polysearch_engine::ProviderType,
    api_key: Option<&'a str>,
    base_url: Option<&'a str>,
    custom_headers: &'a std::collections::BTreeMap<String, String>,
    config: &'a std::collections::BTreeMap<String, serde_json::Value>,
    is_active: bool,
}

#[derive(Deserialize)]
struct CreateReply {
    id: serde_json::Value,
}

/// Persists providers through the backend's provider collection.
#[derive(Debug, Clone)]
pub struct HttpProviderStore {
    backend: BackendClient,
}

impl HttpProviderStore {
    /// Create a store backed by `backend`.
    pub fn new(backend: BackendClient) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl ProviderStore for HttpProviderStore {
    async fn create_provider(&self, provider: &Provider) -> polysearch_engine::Result<StoreReceipt> {
        let body = CreateBody {
            name: &provider.name,
            provider_type: provider.provider_type,
            api_key: provider.usable_credential().map(|c| c.expose()),
            base_url: provider.base_url(),
            custom_headers: &provider.custom_headers,
            config: &provider.config,
            is_active: true,
        };
        let response = self.backend.post_json(PROVIDERS_PATH, &body).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Persistence(format!(
                "backend refused provider (HTTP {})",
                status.as_u16()
            )));
        }
        let reply = response
            .json::<CreateReply>()
            .await
            .map_err(|e| SearchError::Parse(format!("invalid provider reply: {e}")))?;
        match reply.id {
            serde_json::Value::String(id) => Ok(StoreReceipt::new(id)),
            serde_json::Value::Number(id) => Ok(StoreReceipt::new(id.to_string())),
            other => Err(SearchError::Parse(format!("unexpected provider id {other}"))),
        }
    }
}

/// Writes to a local store first, then mirrors to the backend.
///
/// A backend failure does not fail the write: the local id is returned with
/// the mirror error as a warning.
pub struct MirroredStore {
    local: TomlProviderStore,
    mirror: Option<HttpProviderStore>,
}

impl MirroredStore {
    /// A store writing to `local` and, if given, mirroring to `mirror`.
    pub fn new(local: TomlProviderStore, mirror: Option<HttpProviderStore>) -> Self {
        Self { local, mirror }
    }
}

#[async_trait]
impl ProviderStore for MirroredStore {
    async fn create_provider(&self, provider: &Provider) -> polysearch_engine::Result<StoreReceipt> {
        let mut receipt = self.local.create_provider(provider).await?;
        if let Some(mirror) = &self.mirror {
            match mirror.create_provider(provider).await {
                Ok(remote) => {
                    tracing::info!(provider = %provider.id, remote_id = %remote.id, "provider mirrored to backend");
                    receipt.warnings.extend(remote.warnings);
                }
                Err(err) => {
                    tracing::warn!(provider = %provider.id, error = %err, "failed to mirror provider to backend");
                    receipt = receipt.with_warning(format!("provider not mirrored to backend: {err}"));
                }
            }
        }
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polysearch_engine::{ProviderType, Secret};
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_test_dir() -> tempfile::TempDir {
        match tempfile::tempdir() {
            Ok(d) => d,
            Err(_) => unreachable!("tempdir creation should not fail"),
        }
    }

    fn graphql_provider() -> Provider {
        Provider::new("hasura", "Hasura", ProviderType::Graphql)
            .with_base_url("https://hasura.example.com")
            .with_config("graphql_endpoint", "https://hasura.example.com/v1/graphql")
            .with_header("x-hasura-role", "reader")
            .with_filters(["limit"])
            .with_credential(Secret::new("admin-secret"))
            .requiring_credential()
    }

    #[tokio::test]
    async fn toml_store_round_trips_without_credentials() {
        let dir = make_test_dir();
        let store = TomlProviderStore::new(dir.path().join("providers.toml"));

        let receipt = store
            .create_provider(&graphql_provider())
            .await
            .expect("create");
        assert_eq!(receipt.id, "hasura");

        let text = std::fs::read_to_string(store.path()).expect("read");
        assert!(!text.contains("admin-secret"));

        let loaded = store.load().expect("load");
        assert_eq!(loaded.len(), 1);
        let provider = &loaded[0].provider;
        assert_eq!(provider.id, "hasura");
        assert_eq!(provider.provider_type, ProviderType::Graphql);
        assert!(provider.credential.is_none());
        assert!(provider.requires_credential);
        assert_eq!(provider.custom_headers["x-hasura-role"], "reader");
        assert_eq!(
            provider.config_str("graphql_endpoint"),
            Some("https://hasura.example.com/v1/graphql")
        );
    }

    #[tokio::test]
    async fn toml_store_rejects_duplicate_ids_and_keeps_order() {
        let dir = make_test_dir();
        let store = TomlProviderStore::new(dir.path().join("providers.toml"));

        let first = Provider::new("alpha", "Alpha", ProviderType::Web).with_base_url("https://a.example");
        let second = Provider::new("beta", "Beta", ProviderType::Web).with_base_url("https://b.example");
        store.create_provider(&first).await.expect("alpha");
        store.create_provider(&second).await.expect("beta");
        let err = store.create_provider(&first).await.unwrap_err();
        assert_eq!(err.code(), "PERSISTENCE_FAILED");

        let ids: Vec<String> = store
            .load()
            .expect("load")
            .into_iter()
            .map(|s| s.provider.id)
            .collect();
        assert_eq!(ids, ["alpha", "beta"]);
    }

    #[test]
    fn missing_file_is_empty_store() {
        let dir = make_test_dir();
        let store = TomlProviderStore::new(dir.path().join("absent.toml"));
        assert!(store.load().expect("load").is_empty());
    }

    #[test]
    fn corrupt_file_is_store_error() {
        let dir = make_test_dir();
        let path = dir.path().join("providers.toml");
        std::fs::write(&path, "[[providers]\nbroken").expect("write");
        let err = TomlProviderStore::new(path).load().unwrap_err();
        assert_eq!(err.code(), "STORE_FAILED");
    }

    #[tokio::test]
    async fn http_store_posts_provider_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/providers/"))
            .and(body_partial_json(serde_json::json!({
                "name": "Hasura",
                "provider_type": "graphql",
                "api_key": "admin-secret",
                "base_url": "https://hasura.example.com",
                "custom_headers": {"x-hasura-role": "reader"},
                "config": {"graphql_endpoint": "https://hasura.example.com/v1/graphql"},
                "is_active": true
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 42})))
            .expect(1)
            .mount(&server)
            .await;

        let backend = BackendClient::new(&server.uri(), Duration::from_secs(2)).expect("client");
        let receipt = HttpProviderStore::new(backend)
            .create_provider(&graphql_provider())
            .await
            .expect("create");
        assert_eq!(receipt.id, "42");
    }

    #[tokio::test]
    async fn mirrored_store_survives_backend_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let dir = make_test_dir();
        let local = TomlProviderStore::new(dir.path().join("providers.toml"));
        let backend = BackendClient::new(&server.uri(), Duration::from_secs(2)).expect("client");
        let store = MirroredStore::new(local.clone(), Some(HttpProviderStore::new(backend)));

        let receipt = store
            .create_provider(&graphql_provider())
            .await
            .expect("local write wins");
        assert_eq!(receipt.id, "hasura");
        assert_eq!(receipt.warnings.len(), 1);
        assert!(receipt.warnings[0].contains("PERSISTENCE_FAILED"));
        assert_eq!(local.load().expect("load").len(), 1);
    }
}
