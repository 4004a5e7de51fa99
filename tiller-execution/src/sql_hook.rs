//! Hook bodies written in SQL

use async_trait::async_trait;
use tiller_core::quote_identifier;
use tiller_interfaces::{HookBody, HookContext, HookError, Session};
use tracing::warn;

const MIGRATION_ROLE_PLACEHOLDER: &str = "{{migration_role}}";
const SERVICE_ROLE_PLACEHOLDER: &str = "{{service_role}}";

/// A hook body consisting of raw SQL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlHook {
    sql: String,
    transactional: bool,
}

impl SqlHook {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            transactional: false,
        }
    }

    /// Wrap the body in `BEGIN`/`COMMIT`
    pub fn transactional(mut self, transactional: bool) -> Self {
        self.transactional = transactional;
        self
    }

    /// The SQL with role placeholders replaced by quoted role names
    pub fn render(&self, context: &HookContext) -> String {
        self.sql
            .replace(MIGRATION_ROLE_PLACEHOLDER, &quote_identifier(&context.roles.migration))
            .replace(SERVICE_ROLE_PLACEHOLDER, &quote_identifier(&context.roles.service))
    }
}

#[async_trait]
impl HookBody for SqlHook {
    async fn run(&self, session: &dyn Session, context: &HookContext) -> Result<(), HookError> {
        let sql = self.render(context);
        if !self.transactional {
            session.execute_unsafe(&sql).await?;
            return Ok(());
        }

        session.begin_transaction().await?;
        if let Err(e) = session.execute_unsafe(&sql).await {
            if let Err(rollback) = session.rollback_transaction().await {
                warn!("Rollback after failed {} hook failed: {}", context.hook, rollback);
            }
            return Err(e.into());
        }
        session.commit_transaction().await?;
        Ok(())
    }

    fn describe(&self) -> Option<String> {
        Some(self.sql.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiller_core::{HookKind, RoleNames, RunMode};
    use tiller_interfaces::SessionError;
    use tiller_storage::testing::MockDbSession;

    fn context() -> HookContext {
        HookContext {
            migration: "add users table".to_string(),
            hook: HookKind::Action,
            roles: RoleNames::for_migration("add users table"),
            mode: RunMode::Production,
            managed_users: true,
        }
    }

    #[test]
    fn test_role_placeholders_are_substituted() {
        let hook = SqlHook::new("GRANT SELECT ON users TO {{service_role}}; ALTER TABLE users OWNER TO {{migration_role}}");
        assert_eq!(
            hook.render(&context()),
            "GRANT SELECT ON users TO \"tiller_service_add_users_table\"; \
             ALTER TABLE users OWNER TO \"tiller_migration_add_users_table\""
        );
    }

    #[tokio::test]
    async fn test_plain_hook_runs_once() {
        let mut session = MockDbSession::new();
        session
            .expect_execute_unsafe()
            .withf(|sql: &str| sql == "CREATE TABLE users (id int)")
            .times(1)
            .returning(|_| Ok(vec![]));
        session.expect_begin_transaction().never();

        SqlHook::new("CREATE TABLE users (id int)")
            .run(&session, &context())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_transactional_hook_rolls_back_on_failure() {
        let mut session = MockDbSession::new();
        session.expect_begin_transaction().times(1).returning(|| Ok(()));
        session
            .expect_execute_unsafe()
            .times(1)
            .returning(|_| Err(SessionError::QueryFailed("syntax error".to_string())));
        session.expect_rollback_transaction().times(1).returning(|| Ok(()));
        session.expect_commit_transaction().never();

        let err = SqlHook::new("CREATE TABLE")
            .transactional(true)
            .run(&session, &context())
            .await
            .unwrap_err();
        assert_eq!(err, HookError::Session(SessionError::QueryFailed("syntax error".to_string())));
    }

    #[tokio::test]
    async fn test_transactional_hook_commits() {
        let mut session = MockDbSession::new();
        session.expect_begin_transaction().times(1).returning(|| Ok(()));
        session.expect_execute_unsafe().times(1).returning(|_| Ok(vec![]));
        session.expect_commit_transaction().times(1).returning(|| Ok(()));

        SqlHook::new("SELECT 1").transactional(true).run(&session, &context()).await.unwrap();
    }
}
