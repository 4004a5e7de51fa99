//! Backup restore interface

use async_trait::async_trait;
use thiserror::Error;
use tiller_core::RestoreRequest;

/// Why a restore attempt failed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RestoreError {
    /// The restore tool could not be started
    #[error("Failed to start {program}: {message}")]
    Spawn { program: String, message: String },

    /// The restore tool ran and reported failure
    #[error("Restore exited with {status}: {stderr}")]
    Exited { status: String, stderr: String },
}

/// Outcome of a restore attempt.
///
/// Restore is best effort, so failure is an outcome rather than an error
/// the caller has to propagate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored,
    Failed(RestoreError),
}

impl RestoreOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RestoreOutcome::Restored)
    }
}

/// Restores a backup file into a target database
#[async_trait]
pub trait RestoreService: Send + Sync {
    async fn restore(&self, request: &RestoreRequest, target: &str) -> RestoreOutcome;
}
