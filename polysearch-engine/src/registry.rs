//! Provider registry: built-ins plus dynamically registered providers.
//!
//! The registry is read concurrently (list, get, dispatch snapshots) and
//! mutated by a single writer at a time. Registration checks type-required
//! configuration, validates credentials where required, inserts the provider,
//! and finally notifies the persistence collaborator. A persistence failure is
//! reported as a warning and never removes the in-memory entry.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::catalog::builtin_providers;
use crate::error::{Result, SearchError};
use crate::spans::{FIELD_PROVIDER, FIELD_PROVIDER_TYPE, SPAN_REGISTER};
use crate::types::{Provider, ProviderType};
use crate::validate::ProviderValidator;

/// Default bound on one persistence call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

/// Type-specific provider configuration, checked at registration.
///
/// Each variant carries exactly the fields its type requires, so a value of
/// this type is proof that the provider is dispatchable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderSettings {
    /// Web endpoint.
    Web {
        /// Endpoint URL.
        base_url: String,
    },
    /// REST API.
    Api {
        /// Endpoint URL.
        base_url: String,
    },
    /// GraphQL API.
    Graphql {
        /// Service URL.
        base_url: String,
        /// GraphQL endpoint.
        graphql_endpoint: String,
    },
    /// Database.
    Database {
        /// Service URL.
        base_url: String,
        /// Connection string.
        database_url: String,
    },
    /// Filesystem.
    Filesystem {
        /// Service URL.
        base_url: String,
        /// Root path to search.
        filesystem_path: String,
    },
    /// Streaming endpoint.
    Streaming {
        /// Service URL.
        base_url: String,
        /// Stream endpoint.
        streaming_endpoint: String,
    },
    /// Enterprise service.
    Enterprise {
        /// Endpoint URL.
        base_url: String,
    },
    /// Host-served aggregate provider.
    Aggregate,
}

impl ProviderSettings {
    /// Extract and check the type-required fields of `provider`.
    ///
    /// Empty or whitespace-only values count as missing.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidProviderConfig`] naming every missing field.
    pub fn from_provider(provider: &Provider) -> Result<Self> {
        if provider.id.trim().is_empty() {
            return Err(SearchError::InvalidProviderConfig(
                "provider id must not be empty".into(),
            ));
        }

        let provider_type = provider.provider_type;
        let mut missing: Vec<&str> = Vec::new();
        if provider_type.requires_base_url() && provider.base_url().is_none() {
            missing.push("base_url");
        }
        for key in provider_type.required_config_keys() {
            if provider.config_str(key).is_none() {
                missing.push(key);
            }
        }
        if !missing.is_empty() {
            return Err(SearchError::InvalidProviderConfig(format!(
                "provider '{}' of type {provider_type} is missing {}",
                provider.id,
                missing.join(", ")
            )));
        }

        let base_url = || provider.base_url().unwrap_or_default().to_string();
        let config = |key: &str| provider.config_str(key).unwrap_or_default().to_string();

        Ok(match provider_type {
            ProviderType::Web => Self::Web {
                base_url: base_url(),
            },
            ProviderType::Api => Self::Api {
                base_url: base_url(),
            },
            ProviderType::Graphql => Self::Graphql {
                base_url: base_url(),
                graphql_endpoint: config("graphql_endpoint"),
            },
            ProviderType::Database => Self::Database {
                base_url: base_url(),
                database_url: config("database_url"),
            },
            ProviderType::Filesystem => Self::Filesystem {
                base_url: base_url(),
                filesystem_path: config("filesystem_path"),
            },
            ProviderType::Streaming => Self::Streaming {
                base_url: base_url(),
                streaming_endpoint: config("streaming_endpoint"),
            },
            ProviderType::Enterprise => Self::Enterprise {
                base_url: base_url(),
            },
            ProviderType::Aggregate => Self::Aggregate,
        })
    }

    /// Where the provider is queried. `None` for host-served aggregates.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::Web { base_url }
            | Self::Api { base_url }
            | Self::Graphql { base_url, .. }
            | Self::Database { base_url, .. }
            | Self::Filesystem { base_url, .. }
            | Self::Streaming { base_url, .. }
            | Self::Enterprise { base_url } => Some(base_url),
            Self::Aggregate => None,
        }
    }

    /// The provider type these settings belong to.
    pub fn provider_type(&self) -> ProviderType {
        match self {
            Self::Web { .. } => ProviderType::Web,
            Self::Api { .. } => ProviderType::Api,
            Self::Graphql { .. } => ProviderType::Graphql,
            Self::Database { .. } => ProviderType::Database,
            Self::Filesystem { .. } => ProviderType::Filesystem,
            Self::Streaming { .. } => ProviderType::Streaming,
            Self::Enterprise { .. } => ProviderType::Enterprise,
            Self::Aggregate => ProviderType::Aggregate,
        }
    }
}

/// What a [`ProviderStore`] reports after persisting a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreReceipt {
    /// Id the store assigned.
    pub id: String,
    /// Partial failures that did not prevent the write.
    pub warnings: Vec<String>,
}

impl StoreReceipt {
    /// A clean write under `id`.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            warnings: Vec::new(),
        }
    }

    /// Attach a partial-failure warning.
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

impl From<String> for StoreReceipt {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

/// Persistence collaborator notified after a successful registration.
#[async_trait]
pub trait ProviderStore: Send + Sync {
    /// Persist `provider`, returning the id the store assigned and any
    /// partial failures.
    ///
    /// # Errors
    ///
    /// Any failure. The registry keeps the provider and reports a warning.
    async fn create_provider(&self, provider: &Provider) -> Result<StoreReceipt>;
}

/// Outcome of a successful [`ProviderRegistry::register`].
#[derive(Debug, Clone)]
pub struct Registration {
    /// The registered provider.
    pub provider: Arc<Provider>,
    /// Id assigned by the persistence collaborator, when it succeeded.
    pub stored_id: Option<String>,
    /// Non-fatal problems, e.g. persistence failures.
    pub warnings: Vec<String>,
}

impl Registration {
    /// Whether the provider was also persisted.
    pub fn is_persisted(&self) -> bool {
        self.stored_id.is_some()
    }
}

#[derive(Default)]
struct Entries {
    providers: Vec<Arc<Provider>>,
    settings: Vec<ProviderSettings>,
    index: HashMap<String, usize>,
    builtin_count: usize,
}

impl Entries {
    fn insert(&mut self, provider: Provider, settings: ProviderSettings) -> Result<Arc<Provider>> {
        if self.index.contains_key(&provider.id) {
            return Err(SearchError::DuplicateProviderId(provider.id));
        }
        let provider = Arc::new(provider);
        self.index
            .insert(provider.id.clone(), self.providers.len());
        self.providers.push(Arc::clone(&provider));
        self.settings.push(settings);
        Ok(provider)
    }

    fn get(&self, id: &str) -> Option<(&Arc<Provider>, &ProviderSettings)> {
        let &i = self.index.get(id)?;
        Some((self.providers.get(i)?, self.settings.get(i)?))
    }
}

/// Registry of every provider known to the engine.
///
/// Built-ins come first in [`list`](Self::list), followed by registered
/// providers in insertion order.
pub struct ProviderRegistry {
    entries: RwLock<Entries>,
    validator: Option<ProviderValidator>,
    store: Option<Arc<dyn ProviderStore>>,
    store_timeout: Duration,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.len())
            .field("validator", &self.validator.is_some())
            .field("store", &self.store.is_some())
            .finish()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRegistry {
    /// A registry seeded with the built-in providers.
    pub fn new() -> Self {
        Self::with_builtins(builtin_providers())
    }

    /// A registry with no providers at all.
    pub fn empty() -> Self {
        Self::with_builtins(Vec::new())
    }

    /// A registry seeded with `builtins`. Built-ins skip credential
    /// validation; incomplete or duplicate ones are dropped with a warning.
    pub fn with_builtins(builtins: Vec<Provider>) -> Self {
        let mut entries = Entries::default();
        for provider in builtins {
            let seeded = ProviderSettings::from_provider(&provider)
                .and_then(|settings| entries.insert(provider, settings));
            if let Err(err) = seeded {
                tracing::warn!(error = %err, "skipping built-in provider");
            }
        }
        entries.builtin_count = entries.providers.len();
        Self {
            entries: RwLock::new(entries),
            validator: None,
            store: None,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Use `validator` for credential-requiring registrations.
    pub fn with_validator(mut self, validator: ProviderValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Notify `store` after each successful registration.
    pub fn with_store(mut self, store: Arc<dyn ProviderStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Bound each persistence call by `timeout`.
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    fn read(&self) -> RwLockReadGuard<'_, Entries> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Entries> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// All providers: built-ins first, then registered ones in insertion order.
    pub fn list(&self) -> Vec<Arc<Provider>> {
        self.read().providers.clone()
    }

    /// Number of providers.
    pub fn len(&self) -> usize {
        self.read().providers.len()
    }

    /// Whether the registry holds no providers.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.read().index.contains_key(id)
    }

    /// Whether `id` is one of the seeded built-ins.
    pub fn is_builtin(&self, id: &str) -> bool {
        let entries = self.read();
        entries
            .index
            .get(id)
            .is_some_and(|&i| i < entries.builtin_count)
    }

    /// Look up a provider by id.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::ProviderNotFound`] if `id` is unknown.
    pub fn get(&self, id: &str) -> Result<Arc<Provider>> {
        self.read()
            .get(id)
            .map(|(provider, _)| Arc::clone(provider))
            .ok_or_else(|| SearchError::ProviderNotFound(id.to_string()))
    }

    /// Snapshot the providers for `ids` under one read lock.
    ///
    /// Repeated ids are collapsed to their first occurrence; order follows
    /// `ids`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::ProviderNotFound`] for the first unknown id.
    pub fn resolve<S: AsRef<str>>(&self, ids: &[S]) -> Result<Vec<Arc<Provider>>> {
        Ok(self
            .resolve_with_settings(ids)?
            .into_iter()
            .map(|(provider, _)| provider)
            .collect())
    }

    /// Like [`resolve`](Self::resolve), paired with each provider's
    /// registered settings.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::ProviderNotFound`] for the first unknown id.
    pub fn resolve_with_settings<S: AsRef<str>>(
        &self,
        ids: &[S],
    ) -> Result<Vec<(Arc<Provider>, ProviderSettings)>> {
        let entries = self.read();
        let mut seen = std::collections::HashSet::new();
        let mut selected = Vec::with_capacity(ids.len());
        for id in ids {
            let id = id.as_ref();
            let (provider, settings) = entries
                .get(id)
                .ok_or_else(|| SearchError::ProviderNotFound(id.to_string()))?;
            if seen.insert(id) {
                selected.push((Arc::clone(provider), settings.clone()));
            }
        }
        Ok(selected)
    }

    /// The settings `id` was registered with.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::ProviderNotFound`] if `id` is not registered.
    pub fn settings(&self, id: &str) -> Result<ProviderSettings> {
        self.read()
            .get(id)
            .map(|(_, settings)| settings.clone())
            .ok_or_else(|| SearchError::ProviderNotFound(id.to_string()))
    }

    /// Register a new provider.
    ///
    /// # Errors
    ///
    /// - [`SearchError::InvalidProviderConfig`] if a type-required field is missing
    /// - [`SearchError::DuplicateProviderId`] if the id is taken
    /// - [`SearchError::ValidationFailure`] if a required credential is missing
    ///   or rejected
    ///
    /// On error the registry is unchanged.
    pub async fn register(&self, provider: Provider) -> Result<Registration> {
        let span = tracing::info_span!(
            SPAN_REGISTER,
            { FIELD_PROVIDER } = %provider.id,
            { FIELD_PROVIDER_TYPE } = %provider.provider_type
        );

        async move {
            let settings = ProviderSettings::from_provider(&provider)?;
            if self.contains(&provider.id) {
                return Err(SearchError::DuplicateProviderId(provider.id));
            }

            if provider.requires_credential {
                self.check_credential(&provider).await?;
            }

            let provider = self.write().insert(provider, settings)?;
            tracing::info!(provider = %provider.id, "provider registered");

            let mut registration = Registration {
                provider,
                stored_id: None,
                warnings: Vec::new(),
            };
            self.persist(&mut registration).await;
            Ok(registration)
        }
        .instrument(span)
        .await
    }

    /// Re-add a previously persisted provider without validation or persistence.
    ///
    /// # Errors
    ///
    /// Same configuration and uniqueness errors as [`register`](Self::register).
    pub fn restore(&self, provider: Provider) -> Result<Arc<Provider>> {
        let settings = ProviderSettings::from_provider(&provider)?;
        let provider = self.write().insert(provider, settings)?;
        tracing::debug!(provider = %provider.id, "provider restored");
        Ok(provider)
    }

    async fn check_credential(&self, provider: &Provider) -> Result<()> {
        let Some(validator) = &self.validator else {
            return Err(SearchError::ValidationFailure(format!(
                "provider '{}' requires a credential but no validator is configured",
                provider.id
            )));
        };

        let validation = validator
            .validate(
                provider.provider_type,
                provider.base_url(),
                provider.usable_credential(),
            )
            .await;
        if validation.valid {
            Ok(())
        } else {
            let reason = validation
                .message
                .unwrap_or_else(|| "credential rejected".to_string());
            Err(SearchError::ValidationFailure(format!(
                "provider '{}': {reason}",
                provider.id
            )))
        }
    }

    async fn persist(&self, registration: &mut Registration) {
        let Some(store) = &self.store else {
            return;
        };

        let outcome =
            tokio::time::timeout(self.store_timeout, store.create_provider(&registration.provider))
                .await;
        match outcome {
            Ok(Ok(receipt)) => {
                tracing::debug!(provider = %registration.provider.id, stored_id = %receipt.id, "provider persisted");
                registration.stored_id = Some(receipt.id);
                registration.warnings.extend(receipt.warnings);
            }
            Ok(Err(err)) => {
                tracing::warn!(provider = %registration.provider.id, error = %err, "failed to persist provider");
                registration
                    .warnings
                    .push(format!("provider not persisted: {err}"));
            }
            Err(_) => {
                tracing::warn!(provider = %registration.provider.id, "persisting provider timed out");
                registration.warnings.push(format!(
                    "provider not persisted: timed out after {}s",
                    self.store_timeout.as_secs_f64()
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidatorConfig;
    use crate::types::Secret;
    use crate::validate::{CredentialChecker, Validation};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct KeyChecker;

    #[async_trait]
    impl CredentialChecker for KeyChecker {
        async fn check(&self, _: ProviderType, _: Option<&str>, credential: &Secret) -> Result<Validation> {
            if credential.expose() == "good" {
                Ok(Validation::valid())
            } else {
                Ok(Validation::invalid("unknown key"))
            }
        }
    }

    #[derive(Default)]
    struct CountingStore {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProviderStore for CountingStore {
        async fn create_provider(&self, provider: &Provider) -> Result<StoreReceipt> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("db-{}", provider.id).into())
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl ProviderStore for BrokenStore {
        async fn create_provider(&self, _: &Provider) -> Result<StoreReceipt> {
            Err(SearchError::Persistence("disk full".into()))
        }
    }

    struct HalfWrittenStore;

    #[async_trait]
    impl ProviderStore for HalfWrittenStore {
        async fn create_provider(&self, provider: &Provider) -> Result<StoreReceipt> {
            Ok(StoreReceipt::new(provider.id.clone()).with_warning("mirror unreachable"))
        }
    }

    struct HangingStore;

    #[async_trait]
    impl ProviderStore for HangingStore {
        async fn create_provider(&self, _: &Provider) -> Result<StoreReceipt> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(StoreReceipt::new("late"))
        }
    }

    fn validator() -> ProviderValidator {
        ProviderValidator::new(Arc::new(KeyChecker), &ValidatorConfig::default())
    }

    fn api(id: &str) -> Provider {
        Provider::new(id, id.to_uppercase(), ProviderType::Api).with_base_url("https://api.example.com")
    }

    #[test]
    fn builtins_listed_first_in_order() {
        let registry = ProviderRegistry::new();
        let list = registry.list();
        assert_eq!(list.len(), 14);
        assert_eq!(list[0].id, "universal");
        assert!(registry.is_builtin("apollo"));
    }

    #[tokio::test]
    async fn registered_providers_follow_builtins() {
        let registry = ProviderRegistry::new();
        registry.register(api("alpha")).await.expect("alpha");
        registry.register(api("beta")).await.expect("beta");

        let ids: Vec<String> = registry.list().iter().map(|p| p.id.clone()).collect();
        assert_eq!(&ids[14..], ["alpha", "beta"]);
        assert!(!registry.is_builtin("alpha"));
    }

    #[test]
    fn get_unknown_is_not_found() {
        let registry = ProviderRegistry::new();
        let err = registry.get("altavista").unwrap_err();
        assert!(matches!(err, SearchError::ProviderNotFound(id) if id == "altavista"));
    }

    #[tokio::test]
    async fn duplicate_id_leaves_registry_unchanged() {
        let registry = ProviderRegistry::new();
        let before = registry.list();

        let err = registry
            .register(api("web").with_description("impostor"))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::DuplicateProviderId(_)));

        let after = registry.list();
        assert_eq!(before.len(), after.len());
        assert_eq!(registry.get("web").expect("web").provider_type, ProviderType::Aggregate);
    }

    #[tokio::test]
    async fn missing_required_field_is_invalid_config() {
        let registry = ProviderRegistry::empty();

        let no_url = Provider::new("x", "X", ProviderType::Api);
        let err = registry.register(no_url).await.unwrap_err();
        assert!(matches!(err, SearchError::InvalidProviderConfig(ref m) if m.contains("base_url")));

        let graphql = Provider::new("g", "G", ProviderType::Graphql).with_base_url("https://g.example");
        let err = registry.register(graphql).await.unwrap_err();
        assert!(matches!(err, SearchError::InvalidProviderConfig(ref m) if m.contains("graphql_endpoint")));

        let blank = Provider::new("d", "D", ProviderType::Database)
            .with_base_url("https://d.example")
            .with_config("database_url", "  ");
        assert!(registry.register(blank).await.is_err());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn complete_typed_config_registers() {
        let registry = ProviderRegistry::empty();
        let provider = Provider::new("fs", "Files", ProviderType::Filesystem)
            .with_base_url("http://files.local")
            .with_config("filesystem_path", "/srv/docs");
        registry.register(provider).await.expect("register");

        let aggregate = Provider::new("agg", "Aggregate", ProviderType::Aggregate);
        registry.register(aggregate).await.expect("aggregate needs no url");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn settings_match_provider_type() {
        for provider_type in ProviderType::all() {
            let mut provider = Provider::new("p", "P", *provider_type).with_base_url("https://p.example");
            for key in provider_type.required_config_keys() {
                provider = provider.with_config(*key, "value");
            }
            let settings = ProviderSettings::from_provider(&provider).expect("settings");
            assert_eq!(settings.provider_type(), *provider_type);
        }
    }

    #[tokio::test]
    async fn registered_settings_are_kept_for_dispatch() {
        let registry = ProviderRegistry::empty();
        let provider = Provider::new("gql", "GQL", ProviderType::Graphql)
            .with_base_url("https://hasura.example.com")
            .with_config("graphql_endpoint", "https://hasura.example.com/v1/graphql");
        registry.register(provider).await.expect("register");

        let settings = registry.settings("gql").expect("settings");
        assert_eq!(settings.endpoint(), Some("https://hasura.example.com"));
        assert!(matches!(
            settings,
            ProviderSettings::Graphql { ref graphql_endpoint, .. }
                if graphql_endpoint == "https://hasura.example.com/v1/graphql"
        ));
        assert!(matches!(
            registry.settings("missing"),
            Err(SearchError::ProviderNotFound(_))
        ));
    }

    #[test]
    fn incomplete_builtins_are_dropped() {
        let registry = ProviderRegistry::with_builtins(vec![
            Provider::new("agg", "Agg", ProviderType::Aggregate),
            Provider::new("nourl", "No URL", ProviderType::Api),
        ]);
        assert!(registry.contains("agg"));
        assert!(!registry.contains("nourl"));
        assert_eq!(registry.settings("agg").expect("settings").endpoint(), None);
    }

    #[tokio::test]
    async fn credential_required_without_credential_fails_validation() {
        let registry = ProviderRegistry::empty().with_validator(validator());
        let provider = api("github_api").requiring_credential();
        let err = registry.register(provider).await.unwrap_err();
        assert!(matches!(err, SearchError::ValidationFailure(_)));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn rejected_credential_fails_validation() {
        let registry = ProviderRegistry::empty().with_validator(validator());
        let provider = api("github_api")
            .requiring_credential()
            .with_credential(Secret::new("bad"));
        let err = registry.register(provider).await.unwrap_err();
        assert!(matches!(err, SearchError::ValidationFailure(ref m) if m.contains("unknown key")));
        assert!(!err.to_string().contains("bad"));
    }

    #[tokio::test]
    async fn accepted_credential_registers() {
        let registry = ProviderRegistry::empty().with_validator(validator());
        let provider = api("github_api")
            .requiring_credential()
            .with_credential(Secret::new("good"));
        registry.register(provider).await.expect("register");
        assert!(registry.contains("github_api"));
    }

    #[tokio::test]
    async fn credential_required_without_validator_fails() {
        let registry = ProviderRegistry::empty();
        let provider = api("x").requiring_credential().with_credential(Secret::new("good"));
        assert!(matches!(
            registry.register(provider).await,
            Err(SearchError::ValidationFailure(_))
        ));
    }

    #[tokio::test]
    async fn store_is_notified_once() {
        let store = Arc::new(CountingStore::default());
        let registry = ProviderRegistry::empty().with_store(store.clone());
        let registration = registry.register(api("alpha")).await.expect("register");
        assert_eq!(registration.stored_id.as_deref(), Some("db-alpha"));
        assert!(registration.warnings.is_empty());
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn store_failure_is_a_warning_not_a_rollback() {
        let registry = ProviderRegistry::empty().with_store(Arc::new(BrokenStore));
        let registration = registry.register(api("alpha")).await.expect("register");
        assert!(!registration.is_persisted());
        assert_eq!(registration.warnings.len(), 1);
        assert!(registration.warnings[0].contains("disk full"));
        assert!(registry.contains("alpha"));
    }

    #[tokio::test]
    async fn store_receipt_warnings_reach_the_registration() {
        let registry = ProviderRegistry::empty().with_store(Arc::new(HalfWrittenStore));
        let registration = registry.register(api("alpha")).await.expect("register");
        assert_eq!(registration.stored_id.as_deref(), Some("alpha"));
        assert_eq!(registration.warnings, ["mirror unreachable"]);
    }

    #[tokio::test(start_paused = true)]
    async fn store_timeout_is_a_warning() {
        let registry = ProviderRegistry::empty()
            .with_store(Arc::new(HangingStore))
            .with_store_timeout(Duration::from_millis(50));
        let registration = registry.register(api("alpha")).await.expect("register");
        assert!(registration.warnings[0].contains("timed out"));
        assert!(registry.contains("alpha"));
    }

    #[tokio::test]
    async fn restore_skips_validation_and_store() {
        let store = Arc::new(CountingStore::default());
        let registry = ProviderRegistry::empty().with_store(store.clone());
        let provider = api("saved").requiring_credential();
        registry.restore(provider).expect("restore");
        assert!(registry.contains("saved"));
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
        assert!(matches!(
            registry.restore(api("saved")),
            Err(SearchError::DuplicateProviderId(_))
        ));
    }

    #[test]
    fn resolve_dedupes_and_keeps_order() {
        let registry = ProviderRegistry::new();
        let selected = registry
            .resolve(&["github", "web", "github"])
            .expect("resolve");
        let ids: Vec<&str> = selected.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["github", "web"]);
    }

    #[test]
    fn resolve_fails_on_unknown() {
        let registry = ProviderRegistry::new();
        let err = registry.resolve(&["web", "nope"]).unwrap_err();
        assert!(matches!(err, SearchError::ProviderNotFound(id) if id == "nope"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_registrations_of_one_id_yield_one_success() {
        let registry = Arc::new(ProviderRegistry::empty());
        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.register(api("same")).await })
            })
            .collect();

        let mut successes = 0;
        for task in tasks {
            match task.await.expect("join") {
                Ok(_) => successes += 1,
                Err(err) => assert!(matches!(err, SearchError::DuplicateProviderId(_))),
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(registry.len(), 1);
    }
}
