//! Generated role lifecycle
//!
//! Each migration gets a superuser-equivalent migration role, which runs the
//! hook bodies and therefore owns every object they create, and a restricted
//! service role. Ownership makes development teardown a matter of dropping
//! everything the migration role owns.

mod sql;

pub use sql::SqlRoleManager;

use async_trait::async_trait;
use tiller_core::RoleNames;
use tiller_interfaces::Session;

use crate::error::StorageResult;

/// Role lifecycle operations
#[async_trait]
pub trait RoleManager: Send + Sync {
    /// Whether a role exists on the server
    async fn role_exists(&self, session: &dyn Session, role: &str) -> StorageResult<bool>;

    /// Create both generated roles.
    ///
    /// Outside development mode an existing role is a conflict and nothing
    /// is created. In development mode existing roles are reused.
    async fn ensure_roles(&self, session: &dyn Session, roles: &RoleNames, dev_mode: bool) -> StorageResult<()>;

    /// Drop everything owned by each existing role, then the role itself
    async fn teardown_roles(&self, session: &dyn Session, roles: &RoleNames) -> StorageResult<()>;

    /// Run subsequent statements as the migration role
    async fn activate(&self, session: &dyn Session, roles: &RoleNames) -> StorageResult<()> {
        session.set_active_identity(&roles.migration).await?;
        Ok(())
    }

    /// Return to the connection identity
    async fn deactivate(&self, session: &dyn Session) -> StorageResult<()> {
        session.reset_active_identity().await?;
        Ok(())
    }
}
