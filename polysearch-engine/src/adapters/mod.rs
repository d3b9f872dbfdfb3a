//! Provider adapter implementations.
//!
//! Each module provides a struct implementing [`crate::adapter::ProviderAdapter`].

pub mod http_json;

pub use http_json::HttpJsonAdapter;
