//! Atomic config file operations.
//!
//! Reading, writing, and backing up TOML files with atomic write guarantees
//! (temp file → fsync → rename). The provider store reuses the same writer.

use std::io::Write;
use std::path::Path;

use super::types::PolysearchConfig;
use crate::error::{AppError, Result};

/// Read a config file from disk, deserialize and validate it.
///
/// # Errors
/// Returns [`AppError::Config`] if the file cannot be read, parsed or validated.
pub fn read_config(path: &Path) -> Result<PolysearchConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        AppError::Config(format!(
            "failed to read config file '{}': {e}",
            path.display()
        ))
    })?;
    let config: PolysearchConfig = toml::from_str(&contents).map_err(|e| {
        AppError::Config(format!(
            "failed to parse config file '{}': {e}",
            path.display()
        ))
    })?;
    config.validate()?;
    Ok(config)
}

/// Read the config at `path`, or the defaults if the file does not exist.
///
/// # Errors
/// Same as [`read_config`] when the file exists.
pub fn load_or_default(path: &Path) -> Result<PolysearchConfig> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(PolysearchConfig::default());
    }
    read_config(path)
}

/// Validate, back up the previous file, and write `config` atomically.
///
/// # Errors
/// Returns [`AppError::Config`] on validation, serialization, backup or write failure.
pub fn save_config(path: &Path, config: &PolysearchConfig) -> Result<()> {
    config.validate()?;
    let toml_str = toml::to_string_pretty(config)
        .map_err(|e| AppError::Config(format!("failed to serialize config: {e}")))?;
    backup_config(path)?;
    write_toml_text_atomic(path, &toml_str).map_err(AppError::Config)
}

/// Write TOML text atomically (temp file → fsync → rename).
///
/// Errors are returned as plain messages so callers can wrap them in their
/// own error variant.
pub fn write_toml_text_atomic(path: &Path, toml_text: &str) -> std::result::Result<(), String> {
    let tmp_path = path.with_extension("toml.tmp");

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            format!(
                "failed to create directory '{}': {e}",
                parent.display()
            )
        })?;
    }

    let mut file = std::fs::File::create(&tmp_path)
        .map_err(|e| format!("failed to create temp file '{}': {e}", tmp_path.display()))?;

    file.write_all(toml_text.as_bytes())
        .map_err(|e| format!("failed to write temp file: {e}"))?;

    file.sync_all()
        .map_err(|e| format!("failed to sync temp file: {e}"))?;

    std::fs::rename(&tmp_path, path).map_err(|e| {
        format!(
            "failed to rename '{}' to '{}': {e}",
            tmp_path.display(),
            path.display()
        )
    })
}

/// Back up a file by copying it to `{path}.backup`.
///
/// Returns `Ok(())` if the source file doesn't exist (nothing to back up).
///
/// # Errors
/// Returns [`AppError::Config`] if the copy fails.
pub fn backup_config(path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }

    let backup_path = path.with_extension("toml.backup");
    std::fs::copy(path, &backup_path).map_err(|e| {
        AppError::Config(format!(
            "failed to backup '{}' to '{}': {e}",
            path.display(),
            backup_path.display()
        ))
    })?;
    Ok(())
}
