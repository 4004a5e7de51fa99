//! Error types for migration runs

use thiserror::Error;
use tiller_core::HookKind;
use tiller_interfaces::{LoadError, SessionError};
use tiller_storage::StorageError;

/// Result type for engine operations
pub type ExecutionResult<T> = std::result::Result<T, ExecutionError>;

/// Terminal errors of a migration run
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// Invalid options or migration set, raised before any database mutation
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to load migration: {0}")]
    Load(#[from] LoadError),

    /// A generated role already exists outside development mode
    #[error("Generated role {role} already exists; refusing to reuse it outside development mode")]
    RoleConflict { role: String },

    #[error("Hook {hook} of migration '{migration}' failed: {message}")]
    HookFailed {
        migration: String,
        hook: HookKind,
        message: String,
    },

    #[error("Bookkeeping failed: {0}")]
    Bookkeeping(StorageError),

    #[error("Database session error: {0}")]
    Session(#[from] SessionError),
}

impl From<StorageError> for ExecutionError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::RoleConflict { role } => Self::RoleConflict { role },
            other => Self::Bookkeeping(other),
        }
    }
}

impl ExecutionError {
    /// Process exit status for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            ExecutionError::Configuration(_) => 2,
            ExecutionError::RoleConflict { .. } => 3,
            ExecutionError::HookFailed { .. } => 4,
            ExecutionError::Load(_) => 5,
            ExecutionError::Bookkeeping(_) | ExecutionError::Session(_) => 1,
        }
    }

    pub(crate) fn hook_failed(migration: &str, hook: HookKind, message: impl ToString) -> Self {
        Self::HookFailed {
            migration: migration.to_string(),
            hook,
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_exit_codes_are_distinct() {
        let errors = [
            ExecutionError::Configuration("both modes".to_string()),
            ExecutionError::RoleConflict { role: "r".to_string() },
            ExecutionError::hook_failed("m", HookKind::Action, "boom"),
            ExecutionError::Load(LoadError::NotFound(PathBuf::from("x"))),
            ExecutionError::Session(SessionError::Closed),
        ];
        let codes: Vec<u8> = errors.iter().map(|e| e.exit_code()).collect();
        assert_eq!(codes, vec![2, 3, 4, 5, 1]);
    }

    #[test]
    fn test_role_conflict_is_lifted_from_storage() {
        let err = ExecutionError::from(StorageError::RoleConflict {
            role: "tiller_migration_m".to_string(),
        });
        assert!(matches!(err, ExecutionError::RoleConflict { ref role } if role == "tiller_migration_m"));

        let err = ExecutionError::from(StorageError::from(SessionError::QueryFailed("x".to_string())));
        assert!(matches!(err, ExecutionError::Bookkeeping(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_hook_failure_message() {
        let err = ExecutionError::hook_failed("add users table", HookKind::Action, "relation exists");
        assert_eq!(
            err.to_string(),
            "Hook action of migration 'add users table' failed: relation exists"
        );
    }
}
