//! Clients for the host backend's provider endpoints.
//!
//! | Collaborator                 | Endpoint                          |
//! |------------------------------|-----------------------------------|
//! | [`RemoteClassifier`]         | `POST /api/detect-provider-type/` |
//! | [`RemoteCredentialChecker`]  | `POST /api/validate-api-key/`     |
//! | [`crate::store::HttpProviderStore`] | `POST /api/providers/`     |
//! | aggregate search             | `POST /api/search/`               |
//!
//! Every call is bounded by the client timeout.

use std::time::Duration;

use async_trait::async_trait;
use polysearch_engine::http::{build_client, describe_reqwest_error};
use polysearch_engine::{
    Classification, CredentialChecker, ProviderClassifier, ProviderType, SearchError, Secret,
    Validation,
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};

/// Path of the aggregate search endpoint, relative to the backend URL.
pub const SEARCH_PATH: &str = "api/search/";
/// Path of the provider collection endpoint.
pub const PROVIDERS_PATH: &str = "api/providers/";
/// Path of the detection endpoint.
pub const DETECT_PATH: &str = "api/detect-provider-type/";
/// Path of the credential validation endpoint.
pub const VALIDATE_PATH: &str = "api/validate-api-key/";

/// Shared HTTP client bound to one backend base URL.
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base: Url,
}

impl BackendClient {
    /// Create a client for the backend at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] for an unusable URL and
    /// [`AppError::Backend`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(base_url.trim())
            .map_err(|e| AppError::Config(format!("invalid backend url '{base_url}': {e}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = build_client(timeout, None).map_err(|e| AppError::Backend(e.to_string()))?;
        Ok(Self { client, base })
    }

    /// Absolute URL of `path` on the backend.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if the path cannot be joined.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| AppError::Config(format!("invalid backend path '{path}': {e}")))
    }

    /// The underlying HTTP client.
    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    /// POST `body` as JSON to `path`, returning the raw response.
    pub(crate) async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> std::result::Result<reqwest::Response, SearchError> {
        let url = self
            .endpoint(path)
            .map_err(|e| SearchError::Config(e.to_string()))?;
        self.client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| SearchError::Http(describe_reqwest_error(&e)))
    }
}

#[derive(Serialize)]
struct DetectBody<'a> {
    url: &'a str,
}

/// Classifies URLs by asking the backend.
#[derive(Debug, Clone)]
pub struct RemoteClassifier {
    backend: BackendClient,
}

impl RemoteClassifier {
    /// Create a classifier backed by `backend`.
    pub fn new(backend: BackendClient) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl ProviderClassifier for RemoteClassifier {
    async fn classify(&self, url: &Url) -> polysearch_engine::Result<Classification> {
        let response = self
            .backend
            .post_json(DETECT_PATH, &DetectBody { url: url.as_str() })
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Http(format!(
                "detection endpoint returned HTTP {}",
                status.as_u16()
            )));
        }
        response
            .json::<Classification>()
            .await
            .map_err(|e| SearchError::Parse(format!("invalid detection response: {e}")))
    }
}

#[derive(Serialize)]
struct ValidateBody<'a> {
    provider_type: ProviderType,
    base_url: Option<&'a str>,
    api_key: &'a str,
}

#[derive(Deserialize, Default)]
struct ValidateReply {
    #[serde(default)]
    message: Option<String>,
}

/// Checks credentials by asking the backend.
///
/// The verdict is the HTTP status (2xx is valid); the message comes from the
/// response body when it has one.
#[derive(Debug, Clone)]
pub struct RemoteCredentialChecker {
    backend: BackendClient,
}

impl RemoteCredentialChecker {
    /// Create a checker backed by `backend`.
    pub fn new(backend: BackendClient) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl CredentialChecker for RemoteCredentialChecker {
    async fn check(
        &self,
        provider_type: ProviderType,
        base_url: Option<&str>,
        credential: &Secret,
    ) -> polysearch_engine::Result<Validation> {
        let body = ValidateBody {
            provider_type,
            base_url,
            api_key: credential.expose(),
        };
        let response = self.backend.post_json(VALIDATE_PATH, &body).await?;
        let status = response.status();
        let reply = response.json::<ValidateReply>().await.unwrap_or_default();

        let validation = if status.is_success() {
            Validation::valid()
        } else {
            Validation::invalid(format!("backend rejected credential (HTTP {})", status.as_u16()))
        };
        Ok(match reply.message {
            Some(message) if !message.trim().is_empty() => validation.with_message(message),
            _ => validation,
        })
    }
}
