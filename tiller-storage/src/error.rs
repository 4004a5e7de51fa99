//! Storage error types

use thiserror::Error;
use tiller_interfaces::SessionError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Storage-related errors
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// Statement failures reported by the session
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A row did not have the expected shape
    #[error("Failed to decode {entity} row: {message}")]
    Decode { entity: &'static str, message: String },

    /// A generated role already exists outside development mode
    #[error("Generated role {role} already exists; a production run never reuses a generated role")]
    RoleConflict { role: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    pub(crate) fn decode(entity: &'static str, message: impl Into<String>) -> Self {
        StorageError::Decode {
            entity,
            message: message.into(),
        }
    }

    /// Get error code for reporting
    pub fn error_code(&self) -> &'static str {
        match self {
            StorageError::Session(SessionError::ConnectionFailed(_)) => "CONNECTION_ERROR",
            StorageError::Session(SessionError::TransactionFailed(_)) => "TRANSACTION_ERROR",
            StorageError::Session(_) => "QUERY_ERROR",
            StorageError::Decode { .. } => "DECODE_ERROR",
            StorageError::RoleConflict { .. } => "ROLE_CONFLICT",
            StorageError::ConfigError(_) => "CONFIG_ERROR",
        }
    }
}
