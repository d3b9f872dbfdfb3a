//! # polysearch-engine
//!
//! Federated search core: one query fanned out to many heterogeneous
//! providers, partial failures tolerated, results merged into one ranked list.
//!
//! ## Design
//!
//! - [`ProviderRegistry`] holds built-in and user-added providers; adding a
//!   provider checks type-required fields and validates credentials
//! - [`FilterSchema`] resolves each provider's effective filters from
//!   catalog defaults and caller overrides
//! - [`DispatchEngine`] calls every selected provider concurrently with a
//!   per-provider timeout and an optional overall deadline, then merges
//!   results through [`dispatch::ranking`]
//! - [`ProviderDetector`] suggests a provider type for a URL, falling back
//!   to `web` when classification fails or times out
//! - [`ProviderValidator`] checks credentials and never errors
//!
//! ## Security
//!
//! - Credentials are redacted from `Debug`/`Display` and never logged
//! - Queries are logged only at trace level

pub mod adapter;
pub mod adapters;
pub mod catalog;
pub mod config;
pub mod detect;
pub mod dispatch;
pub mod error;
pub mod filters;
pub mod http;
pub mod registry;
pub mod spans;
pub mod types;
pub mod validate;

pub use adapter::{AdapterCall, AdapterSet, ProviderAdapter};
pub use adapters::HttpJsonAdapter;
pub use catalog::ProviderTemplate;
pub use config::{DetectorConfig, DispatchConfig, ValidatorConfig};
pub use detect::{
    Classification, DetectionResult, FallbackReason, HeuristicClassifier, ProviderClassifier,
    ProviderDetector,
};
pub use dispatch::DispatchEngine;
pub use error::{Result, SearchError};
pub use filters::{FilterDescriptor, FilterDomain, FilterMap, FilterSchema, FilterValue, SchemaKey};
pub use registry::{ProviderRegistry, ProviderSettings, ProviderStore, Registration, StoreReceipt};
pub use types::{
    DispatchStatus, FailureKind, Provider, ProviderFailure, ProviderType, SearchRequest,
    SearchResponse, SearchResult, Secret, SortKey, TimeRange,
};
pub use validate::{CredentialChecker, HttpCredentialChecker, ProviderValidator, Validation};
