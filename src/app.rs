//! Application wiring.
//!
//! [`App::bootstrap`] turns a [`PolysearchConfig`] into a ready engine:
//!
//! 1. Built-in providers, with credentials from `[credentials.<id>]`
//! 2. Stored providers restored from the local providers file
//! 3. Validator, detector and provider store, backed by the host backend
//!    when `[backend] url` is set and by local implementations otherwise
//! 4. A dispatch engine over the JSON adapter
//!
//! Problems with individual providers (unresolvable secrets, stored entries
//! that no longer pass configuration checks) become startup warnings.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use polysearch_engine::catalog::{self, ProviderTemplate};
use polysearch_engine::{
    AdapterSet, CredentialChecker, DetectionResult, DispatchEngine, FilterDescriptor,
    FilterSchema, HeuristicClassifier, HttpCredentialChecker, HttpJsonAdapter, Provider,
    ProviderClassifier, ProviderDetector, ProviderRegistry, ProviderType, ProviderValidator,
    Registration, SearchRequest, SearchResponse, Secret, Validation,
};

use crate::backend::{BackendClient, RemoteClassifier, RemoteCredentialChecker, SEARCH_PATH};
use crate::config::{PolysearchConfig, SecretRef, save_config};
use crate::error::Result;
use crate::store::{HttpProviderStore, MirroredStore, TomlProviderStore};

/// A bootstrapped polysearch instance.
pub struct App {
    config: PolysearchConfig,
    config_path: Option<PathBuf>,
    registry: Arc<ProviderRegistry>,
    engine: DispatchEngine,
    detector: ProviderDetector,
    validator: ProviderValidator,
    store: TomlProviderStore,
    warnings: Vec<String>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("config_path", &self.config_path)
            .field("providers", &self.registry.len())
            .field("store", &self.store.path())
            .field("warnings", &self.warnings.len())
            .finish_non_exhaustive()
    }
}

impl App {
    /// Build every component from `config`.
    ///
    /// `config_path` is where credential references added at runtime are
    /// saved; `None` keeps them in memory only.
    ///
    /// # Errors
    ///
    /// - [`AppError::Config`](crate::error::AppError::Config) for invalid configuration
    /// - [`AppError::Store`](crate::error::AppError::Store) if the providers file cannot be read
    /// - [`AppError::Engine`](crate::error::AppError::Engine) if an engine component cannot be built
    pub fn bootstrap(config: PolysearchConfig, config_path: Option<PathBuf>) -> Result<Self> {
        config.validate()?;
        let mut warnings = Vec::new();

        let backend = config
            .backend
            .url()
            .map(|url| BackendClient::new(url, config.backend.timeout()))
            .transpose()?;

        let builtins = catalog::builtin_providers()
            .into_iter()
            .map(|provider| attach_credential(&config, provider, &mut warnings))
            .collect();

        let checker: Arc<dyn CredentialChecker> = match &backend {
            Some(backend) => Arc::new(RemoteCredentialChecker::new(backend.clone())),
            None => Arc::new(HttpCredentialChecker::new(config.validation.timeout())?),
        };
        let validator = ProviderValidator::new(checker, &config.validation);

        let store = TomlProviderStore::new(config.storage.providers_file());
        let mirror = backend
            .as_ref()
            .filter(|_| config.backend.persist_providers)
            .map(|backend| HttpProviderStore::new(backend.clone()));

        let registry = ProviderRegistry::with_builtins(builtins)
            .with_validator(validator.clone())
            .with_store(Arc::new(MirroredStore::new(store.clone(), mirror)))
            .with_store_timeout(config.backend.timeout());

        for stored in store.load()? {
            let provider = attach_credential(&config, stored.provider, &mut warnings);
            let id = provider.id.clone();
            if let Err(err) = registry.restore(provider) {
                tracing::warn!(provider = %id, error = %err, "skipping stored provider");
                warnings.push(format!("stored provider '{id}' skipped: {err}"));
            }
        }
        let registry = Arc::new(registry);

        let classifier: Arc<dyn ProviderClassifier> = match &backend {
            Some(backend) => Arc::new(RemoteClassifier::new(backend.clone())),
            None if config.detection.probe => {
                Arc::new(HeuristicClassifier::with_probe(config.detection.timeout())?)
            }
            None => Arc::new(HeuristicClassifier::offline()),
        };
        let detector = ProviderDetector::new(classifier, &config.detection);

        let mut adapter = HttpJsonAdapter::new(
            config.dispatch.provider_timeout(),
            config.dispatch.user_agent.as_deref(),
        )?;
        if let Some(backend) = &backend {
            adapter = adapter.with_aggregate_endpoint(backend.endpoint(SEARCH_PATH)?.to_string());
        }
        let adapters = AdapterSet::new().with_default(Arc::new(adapter));

        let engine = DispatchEngine::new(
            Arc::clone(&registry),
            Arc::new(FilterSchema::builtin()),
            adapters,
            config.dispatch.clone(),
        )?;

        tracing::info!(
            providers = registry.len(),
            backend = backend.is_some(),
            "polysearch ready"
        );

        Ok(Self {
            config,
            config_path,
            registry,
            engine,
            detector,
            validator,
            store,
            warnings,
        })
    }

    /// Load `path` (or defaults if it is absent) and bootstrap from it.
    ///
    /// # Errors
    ///
    /// Same as [`bootstrap`](Self::bootstrap), plus config read failures.
    pub fn from_config_file(path: &Path) -> Result<Self> {
        let config = crate::config::load_or_default(path)?;
        Self::bootstrap(config, Some(path.to_path_buf()))
    }

    /// The active configuration.
    pub fn config(&self) -> &PolysearchConfig {
        &self.config
    }

    /// Startup problems that did not prevent bootstrapping.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// The provider registry.
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// The dispatch engine.
    pub fn engine(&self) -> &DispatchEngine {
        &self.engine
    }

    /// The local provider store.
    pub fn store(&self) -> &TomlProviderStore {
        &self.store
    }

    /// Every provider: built-ins first, then user-added ones.
    pub fn providers(&self) -> Vec<Arc<Provider>> {
        self.registry.list()
    }

    /// Provider templates for the add flow.
    pub fn templates(&self) -> Vec<ProviderTemplate> {
        catalog::templates()
    }

    /// The filters `provider_id` exposes, with their domains and defaults.
    ///
    /// # Errors
    ///
    /// Returns a not-found engine error for an unknown id.
    pub fn filters_for(&self, provider_id: &str) -> Result<Vec<FilterDescriptor>> {
        let provider = self.registry.get(provider_id)?;
        Ok(self.engine.schema().descriptors_for_provider(&provider))
    }

    /// Suggest a provider for `url`. Never fails.
    pub async fn detect(&self, url: &str) -> DetectionResult {
        self.detector.detect(url).await
    }

    /// Check a credential. Never fails.
    pub async fn validate(
        &self,
        provider_type: ProviderType,
        base_url: Option<&str>,
        credential: Option<&Secret>,
    ) -> Validation {
        self.validator
            .validate(provider_type, base_url, credential)
            .await
    }

    /// Register a user-defined provider.
    ///
    /// # Errors
    ///
    /// The registry's errors: duplicate id, missing type-required fields, or
    /// a rejected credential.
    pub async fn add_provider(&self, provider: Provider) -> Result<Registration> {
        Ok(self.registry.register(provider).await?)
    }

    /// Remember where `provider_id`'s credential comes from and save the
    /// config file.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`](crate::error::AppError::Config) if the config file cannot be written.
    pub fn remember_credential(&mut self, provider_id: &str, secret: SecretRef) -> Result<()> {
        self.config
            .credentials
            .insert(provider_id.to_string(), secret);
        match &self.config_path {
            Some(path) => save_config(path, &self.config),
            None => Ok(()),
        }
    }

    /// Run a search.
    ///
    /// # Errors
    ///
    /// Request errors (empty query, unknown provider) and total dispatch
    /// failure.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        Ok(self.engine.dispatch(request).await?)
    }
}

fn attach_credential(
    config: &PolysearchConfig,
    provider: Provider,
    warnings: &mut Vec<String>,
) -> Provider {
    match config.credential_for(&provider.id) {
        Ok(Some(secret)) => provider.with_credential(secret),
        Ok(None) => provider,
        Err(err) => {
            tracing::warn!(provider = %provider.id, error = %err, "credential unavailable");
            warnings.push(format!("credential for '{}' unavailable: {err}", provider.id));
            provider
        }
    }
}
