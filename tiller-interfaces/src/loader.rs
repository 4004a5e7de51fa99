//! Migration loader interface

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::descriptor::MigrationDescriptor;

/// Errors raised while loading a migration descriptor
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("Migration not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Migration {path} is missing required field '{field}'")]
    MissingField { path: PathBuf, field: String },
}

/// Produces migration descriptors from caller-supplied paths
#[async_trait]
pub trait MigrationLoader: Send + Sync {
    /// Load the descriptor at `path`. Called afresh for every phase.
    async fn load(&self, path: &Path) -> Result<MigrationDescriptor, LoadError>;
}
