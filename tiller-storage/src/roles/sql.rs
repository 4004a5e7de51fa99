//! SQL implementation of the role lifecycle

use async_trait::async_trait;
use serde_json::json;
use tiller_core::{quote_identifier, RoleNames};
use tiller_interfaces::Session;
use tracing::{debug, info};

use super::RoleManager;
use crate::error::{StorageError, StorageResult};
use crate::state::bool_column;

/// Role manager issuing PostgreSQL role statements
#[derive(Debug, Clone, Default)]
pub struct SqlRoleManager;

impl SqlRoleManager {
    pub fn new() -> Self {
        Self
    }

    /// Statement creating the migration role
    pub fn create_migration_role(role: &str) -> String {
        format!("CREATE ROLE {} WITH SUPERUSER NOLOGIN", quote_identifier(role))
    }

    /// Statement creating the service role
    pub fn create_service_role(role: &str) -> String {
        format!(
            "CREATE ROLE {} WITH NOSUPERUSER NOINHERIT NOLOGIN NOCREATEDB NOCREATEROLE NOREPLICATION NOBYPASSRLS",
            quote_identifier(role)
        )
    }

    /// Statements removing a role and everything it owns
    pub fn drop_role(role: &str) -> [String; 2] {
        let quoted = quote_identifier(role);
        [format!("DROP OWNED BY {} CASCADE", quoted), format!("DROP ROLE {}", quoted)]
    }
}

#[async_trait]
impl RoleManager for SqlRoleManager {
    async fn role_exists(&self, session: &dyn Session, role: &str) -> StorageResult<bool> {
        let rows = session
            .execute(
                "SELECT EXISTS (SELECT 1 FROM pg_catalog.pg_roles WHERE rolname = $1) AS present",
                &[json!(role)],
            )
            .await?;
        bool_column("pg_roles", &rows, "present")
    }

    async fn ensure_roles(&self, session: &dyn Session, roles: &RoleNames, dev_mode: bool) -> StorageResult<()> {
        let mut missing = Vec::new();

        for (role, statement) in [
            (&roles.migration, Self::create_migration_role(&roles.migration)),
            (&roles.service, Self::create_service_role(&roles.service)),
        ] {
            if !self.role_exists(session, role).await? {
                missing.push((role, statement));
            } else if dev_mode {
                debug!("Reusing existing role {} in development mode", role);
            } else {
                return Err(StorageError::RoleConflict { role: role.clone() });
            }
        }

        for (role, statement) in missing {
            session.execute(&statement, &[]).await?;
            info!("Created role {}", role);
        }

        Ok(())
    }

    async fn teardown_roles(&self, session: &dyn Session, roles: &RoleNames) -> StorageResult<()> {
        for role in roles.iter() {
            if !self.role_exists(session, role).await? {
                continue;
            }
            for statement in Self::drop_role(role) {
                session.execute(&statement, &[]).await?;
            }
            info!("Dropped role {} and everything it owned", role);
        }
        Ok(())
    }
}
