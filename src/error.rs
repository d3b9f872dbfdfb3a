//! Error types for the polysearch application crate.
//!
//! Each variant carries a stable error code (SCREAMING_SNAKE_CASE) that is
//! included in the Display output and accessible via [`AppError::code()`].
//! Engine failures keep the engine's own code.

use polysearch_engine::SearchError;

/// Stable error codes for application-level failures.
pub mod error_codes {
    /// Invalid, unreadable, or unwritable configuration.
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";

    /// The local provider store could not be read or written.
    pub const STORE_FAILED: &str = "STORE_FAILED";

    /// The host backend answered with an error or could not be reached.
    pub const BACKEND_FAILED: &str = "BACKEND_FAILED";

    /// A secret reference could not be resolved.
    pub const SECRET_UNRESOLVED: &str = "SECRET_UNRESOLVED";
}

/// Errors produced while bootstrapping and running the application.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Invalid, unreadable, or unwritable configuration.
    #[error("[{}] {}", error_codes::CONFIG_INVALID, .0)]
    Config(String),

    /// The local provider store failed.
    #[error("[{}] {}", error_codes::STORE_FAILED, .0)]
    Store(String),

    /// The host backend failed.
    #[error("[{}] {}", error_codes::BACKEND_FAILED, .0)]
    Backend(String),

    /// A secret reference could not be resolved.
    #[error("[{}] {}", error_codes::SECRET_UNRESOLVED, .0)]
    Secret(String),

    /// The search engine rejected an operation.
    #[error(transparent)]
    Engine(#[from] SearchError),
}

impl AppError {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => error_codes::CONFIG_INVALID,
            Self::Store(_) => error_codes::STORE_FAILED,
            Self::Backend(_) => error_codes::BACKEND_FAILED,
            Self::Secret(_) => error_codes::SECRET_UNRESOLVED,
            Self::Engine(err) => err.code(),
        }
    }
}

/// Convenience alias used throughout the application crate.
pub type Result<T> = std::result::Result<T, AppError>;
