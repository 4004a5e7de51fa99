//! Migration loaders
//!
//! [`SqlDirectoryLoader`] reads migrations written as YAML and SQL files.
//! [`StaticMigrationLoader`] serves descriptors defined in code.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tiller_core::HookKind;
use tiller_interfaces::{LoadError, MigrationDescriptor, MigrationLoader};
use tracing::debug;

use crate::sql_hook::SqlHook;

/// Metadata file of a directory migration
pub const MIGRATION_FILE: &str = "migration.yaml";

/// On-disk migration definition
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct MigrationFile {
    name: Option<String>,
    description: Option<String>,
    managed_users: Option<bool>,
    #[serde(default)]
    transaction: bool,
    cluster: Option<String>,
    action: Option<String>,
    always: Option<String>,
    teardown: Option<String>,
}

impl MigrationFile {
    fn inline(&self, kind: HookKind) -> Option<&String> {
        match kind {
            HookKind::Cluster => self.cluster.as_ref(),
            HookKind::Action => self.action.as_ref(),
            HookKind::Always => self.always.as_ref(),
            HookKind::Teardown => self.teardown.as_ref(),
        }
    }
}

/// Loads migrations from the filesystem.
///
/// A path is either a directory holding `migration.yaml` plus optional
/// `cluster.sql`, `action.sql`, `always.sql` and `teardown.sql`, or a single
/// YAML file with the hook SQL inline. A `.sql` file takes precedence over
/// inline SQL for the same hook.
#[derive(Debug, Clone, Default)]
pub struct SqlDirectoryLoader;

impl SqlDirectoryLoader {
    pub fn new() -> Self {
        Self
    }

    async fn read(path: &Path) -> Result<String, LoadError> {
        tokio::fs::read_to_string(path).await.map_err(|e| LoadError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    async fn read_optional(path: &Path) -> Result<Option<String>, LoadError> {
        match tokio::fs::try_exists(path).await {
            Ok(true) => Self::read(path).await.map(Some),
            Ok(false) => Ok(None),
            Err(e) => Err(LoadError::Io {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    fn parse(path: &Path, content: &str) -> Result<MigrationFile, LoadError> {
        if content.trim().is_empty() {
            return Ok(MigrationFile::default());
        }
        serde_yaml::from_str(content).map_err(|e| LoadError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl MigrationLoader for SqlDirectoryLoader {
    async fn load(&self, path: &Path) -> Result<MigrationDescriptor, LoadError> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|_| LoadError::NotFound(path.to_path_buf()))?;

        let (file_path, directory) = if metadata.is_dir() {
            (path.join(MIGRATION_FILE), Some(path))
        } else {
            (path.to_path_buf(), None)
        };

        let file = Self::parse(&file_path, &Self::read(&file_path).await?)?;

        let name = file
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| LoadError::MissingField {
                path: file_path.clone(),
                field: "name".to_string(),
            })?;

        let mut descriptor = MigrationDescriptor::new(name);
        if let Some(description) = &file.description {
            descriptor = descriptor.with_description(description);
        }
        if let Some(managed_users) = file.managed_users {
            descriptor = descriptor.with_managed_users(managed_users);
        }

        for kind in HookKind::all() {
            let from_file = match directory {
                Some(dir) => Self::read_optional(&dir.join(format!("{}.sql", kind))).await?,
                None => None,
            };
            let sql = from_file.or_else(|| file.inline(*kind).cloned());

            if let Some(sql) = sql.filter(|s| !s.trim().is_empty()) {
                descriptor = descriptor.with_hook(*kind, Arc::new(SqlHook::new(sql).transactional(file.transaction)));
            }
        }

        debug!("Loaded migration '{}' from {}", descriptor.name, path.display());
        Ok(descriptor)
    }
}

type DescriptorFactory = Arc<dyn Fn() -> MigrationDescriptor + Send + Sync>;

/// Serves code-defined migrations registered under a path.
///
/// Each `load` calls the factory again, so descriptors are never shared
/// between phases.
#[derive(Clone, Default)]
pub struct StaticMigrationLoader {
    factories: HashMap<PathBuf, DescriptorFactory>,
}

impl StaticMigrationLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(mut self, path: impl Into<PathBuf>, factory: F) -> Self
    where
        F: Fn() -> MigrationDescriptor + Send + Sync + 'static,
    {
        self.factories.insert(path.into(), Arc::new(factory));
        self
    }
}

impl std::fmt::Debug for StaticMigrationLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticMigrationLoader")
            .field("paths", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[async_trait]
impl MigrationLoader for StaticMigrationLoader {
    async fn load(&self, path: &Path) -> Result<MigrationDescriptor, LoadError> {
        self.factories
            .get(path)
            .map(|factory| factory())
            .ok_or_else(|| LoadError::NotFound(path.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_directory_migration() {
        let dir = TempDir::new().unwrap();
        let migration = dir.path().join("001-users");
        std::fs::create_dir(&migration).unwrap();
        std::fs::write(
            migration.join(MIGRATION_FILE),
            "name: add users table\ndescription: |\n  Users\n\n  and their roles\nmanaged_users: false\n",
        )
        .unwrap();
        std::fs::write(migration.join("action.sql"), "CREATE TABLE users (id int);").unwrap();
        std::fs::write(migration.join("teardown.sql"), "  \n").unwrap();

        let descriptor = SqlDirectoryLoader::new().load(&migration).await.unwrap();
        assert_eq!(descriptor.name, "add users table");
        assert_eq!(descriptor.description.as_deref(), Some("Users\nand their roles"));
        assert!(!descriptor.managed_users());
        assert_eq!(descriptor.defined_hooks(), vec![HookKind::Action]);
        assert_eq!(
            descriptor.action.as_ref().and_then(|h| h.describe()).as_deref(),
            Some("CREATE TABLE users (id int);")
        );
    }

    #[tokio::test]
    async fn test_load_single_file_migration() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("002-audit.yaml");
        std::fs::write(
            &path,
            "name: audit\ntransaction: true\ncluster: CREATE EXTENSION IF NOT EXISTS pgcrypto\nalways: SELECT 1\n",
        )
        .unwrap();

        let descriptor = SqlDirectoryLoader::new().load(&path).await.unwrap();
        assert_eq!(descriptor.defined_hooks(), vec![HookKind::Cluster, HookKind::Always]);
        assert!(descriptor.managed_users());
    }

    #[tokio::test]
    async fn test_missing_name_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("003.yaml");
        std::fs::write(&path, "action: SELECT 1\n").unwrap();

        let err = SqlDirectoryLoader::new().load(&path).await.unwrap_err();
        assert!(matches!(err, LoadError::MissingField { ref field, .. } if field == "name"));
    }

    #[tokio::test]
    async fn test_unknown_fields_and_missing_paths() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("004.yaml");
        std::fs::write(&path, "name: x\nactoin: SELECT 1\n").unwrap();

        let loader = SqlDirectoryLoader::new();
        assert!(matches!(loader.load(&path).await, Err(LoadError::Parse { .. })));
        assert!(matches!(
            loader.load(&dir.path().join("missing")).await,
            Err(LoadError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_static_loader_builds_fresh_descriptors() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let loader = StaticMigrationLoader::new().register("m1", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            MigrationDescriptor::new("m1")
        });

        loader.load(Path::new("m1")).await.unwrap();
        loader.load(Path::new("m1")).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(matches!(loader.load(Path::new("m2")).await, Err(LoadError::NotFound(_))));
    }
}
