//! # polysearch
//!
//! One query, many providers. This crate wires [`polysearch_engine`] to
//! configuration, local and backend persistence, and the host backend's
//! detection and validation endpoints. The `polysearch` binary is a thin CLI
//! over [`App`].

pub mod app;
pub mod backend;
pub mod config;
pub mod error;
pub mod paths;
pub mod store;

pub use app::App;
pub use config::{PolysearchConfig, SecretRef};
pub use error::{AppError, Result};
pub use polysearch_engine as engine;
pub use store::{HttpProviderStore, MirroredStore, StoredProvider, TomlProviderStore};
