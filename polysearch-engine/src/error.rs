//! Error types for the polysearch-engine crate.
//!
//! Each variant carries a stable error code (SCREAMING_SNAKE_CASE) accessible
//! via [`SearchError::code()`]. Credentials never appear in error messages.

use crate::types::ProviderFailure;

/// Stable error codes for programmatic error handling.
pub mod error_codes {
    /// A selected or requested provider id is not registered.
    pub const PROVIDER_NOT_FOUND: &str = "PROVIDER_NOT_FOUND";
    /// A provider with the same id is already registered.
    pub const DUPLICATE_PROVIDER_ID: &str = "DUPLICATE_PROVIDER_ID";
    /// A type-required provider field is missing.
    pub const INVALID_PROVIDER_CONFIG: &str = "INVALID_PROVIDER_CONFIG";
    /// The credential check rejected the provider.
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
    /// Every selected provider failed.
    pub const TOTAL_DISPATCH_FAILURE: &str = "TOTAL_DISPATCH_FAILURE";
    /// The search request itself is malformed.
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
    /// An operation exceeded its deadline.
    pub const TIMEOUT: &str = "TIMEOUT";
    /// Transport-level HTTP failure.
    pub const HTTP_ERROR: &str = "HTTP_ERROR";
    /// A response could not be decoded.
    pub const PARSE_ERROR: &str = "PARSE_ERROR";
    /// Invalid engine configuration.
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";
    /// The persistence collaborator failed.
    pub const PERSISTENCE_FAILED: &str = "PERSISTENCE_FAILED";
}

/// Errors produced by the registry, dispatch engine, and collaborators.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The provider id is not present in the registry.
    #[error("[{}] provider not found: {}", error_codes::PROVIDER_NOT_FOUND, .0)]
    ProviderNotFound(String),

    /// A provider with this id is already registered.
    #[error("[{}] duplicate provider id: {}", error_codes::DUPLICATE_PROVIDER_ID, .0)]
    DuplicateProviderId(String),

    /// Required configuration for the provider type is missing.
    #[error("[{}] {}", error_codes::INVALID_PROVIDER_CONFIG, .0)]
    InvalidProviderConfig(String),

    /// The provider's credential was rejected or could not be checked.
    #[error("[{}] {}", error_codes::VALIDATION_FAILED, .0)]
    ValidationFailure(String),

    /// Every selected provider failed; carries each provider's reason.
    #[error("[{}] all providers failed: {}", error_codes::TOTAL_DISPATCH_FAILURE, join_failures(.0))]
    TotalDispatchFailure(Vec<ProviderFailure>),

    /// The request is malformed (empty query, no providers).
    #[error("[{}] {}", error_codes::INVALID_REQUEST, .0)]
    InvalidRequest(String),

    /// An operation timed out.
    #[error("[{}] timed out: {}", error_codes::TIMEOUT, .0)]
    Timeout(String),

    /// An HTTP request failed.
    #[error("[{}] HTTP error: {}", error_codes::HTTP_ERROR, .0)]
    Http(String),

    /// A response body could not be parsed.
    #[error("[{}] parse error: {}", error_codes::PARSE_ERROR, .0)]
    Parse(String),

    /// Invalid engine configuration.
    #[error("[{}] config error: {}", error_codes::CONFIG_INVALID, .0)]
    Config(String),

    /// The persistence collaborator failed to store a provider.
    #[error("[{}] persistence error: {}", error_codes::PERSISTENCE_FAILED, .0)]
    Persistence(String),
}

impl SearchError {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ProviderNotFound(_) => error_codes::PROVIDER_NOT_FOUND,
            Self::DuplicateProviderId(_) => error_codes::DUPLICATE_PROVIDER_ID,
            Self::InvalidProviderConfig(_) => error_codes::INVALID_PROVIDER_CONFIG,
            Self::ValidationFailure(_) => error_codes::VALIDATION_FAILED,
            Self::TotalDispatchFailure(_) => error_codes::TOTAL_DISPATCH_FAILURE,
            Self::InvalidRequest(_) => error_codes::INVALID_REQUEST,
            Self::Timeout(_) => error_codes::TIMEOUT,
            Self::Http(_) => error_codes::HTTP_ERROR,
            Self::Parse(_) => error_codes::PARSE_ERROR,
            Self::Config(_) => error_codes::CONFIG_INVALID,
            Self::Persistence(_) => error_codes::PERSISTENCE_FAILED,
        }
    }

    /// Returns true for request-construction errors that abort a call
    /// before any provider is contacted.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            Self::ProviderNotFound(_)
                | Self::DuplicateProviderId(_)
                | Self::InvalidProviderConfig(_)
                | Self::InvalidRequest(_)
        )
    }
}

fn join_failures(failures: &[ProviderFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Convenience type alias for polysearch-engine results.
pub type Result<T> = std::result::Result<T, SearchError>;
