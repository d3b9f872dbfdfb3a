//! Application directory paths.
//!
//! Uses the [`dirs`] crate for platform-appropriate resolution.
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | Config | `~/Library/Application Support/polysearch/` | `~/.config/polysearch/` |
//! | Data | `~/Library/Application Support/polysearch/` | `~/.local/share/polysearch/` |
//!
//! Overrides for tests and custom deployments:
//! - `POLYSEARCH_CONFIG_DIR` overrides [`config_dir`]
//! - `POLYSEARCH_DATA_DIR` overrides [`data_dir`]

use std::path::PathBuf;

/// Application config directory.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("POLYSEARCH_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("polysearch"))
        .unwrap_or_else(|| PathBuf::from("/tmp/polysearch-config"))
}

/// Application data directory.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("POLYSEARCH_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("polysearch"))
        .unwrap_or_else(|| PathBuf::from("/tmp/polysearch-data"))
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// User-added providers (`data_dir()/providers.toml`).
#[must_use]
pub fn providers_file() -> PathBuf {
    data_dir().join("providers.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_live_in_their_dirs() {
        assert!(config_file().starts_with(config_dir()));
        assert!(providers_file().starts_with(data_dir()));
        assert_eq!(
            providers_file().file_name().and_then(|n| n.to_str()),
            Some("providers.toml")
        );
    }
}
