//! Application configuration: TOML schema, secret references, and atomic
//! persistence.

pub mod persist;
pub mod types;

pub use persist::{load_or_default, read_config, save_config};
pub use types::{BackendConfig, PolysearchConfig, SecretRef, StorageConfig};
