//! Error types for the core domain

use thiserror::Error;

/// Result type alias using [`CoreError`]
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while constructing core domain values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid hook kind: {0}")]
    InvalidHookKind(String),

    #[error("Invalid migration name: {0}")]
    InvalidMigrationName(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
