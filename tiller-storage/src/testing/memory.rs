//! In-memory database backend
//!
//! One [`InMemoryDatabase`] stands in for a database server: sessions opened
//! from it, the bookkeeping tables and the cluster's roles all share the same
//! state. Clones share that state too, so a test can hand one clone to the
//! engine and inspect another afterwards.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tiller_core::{legacy_hook_record, HookKind, MigrationHookRecord, MigrationRecord, RestoreRequest, RoleNames};
use tiller_interfaces::{
    RestoreOutcome, RestoreService, Row, Session, SessionError, SessionProvider, SessionResult,
};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::roles::{RoleManager, SqlRoleManager};
use crate::state::{LegacyPolicy, PurgeReport, StateStore};

/// A statement run through one of the in-memory sessions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedStatement {
    /// Sequence number of the session, starting at 1
    pub session: usize,
    /// Role the session was acting as
    pub identity: Option<String>,
    pub sql: String,
}

/// Identity switches, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityEvent {
    Set { session: usize, role: String },
    Reset { session: usize },
}

#[derive(Debug, Default)]
struct MemoryState {
    schema_ready: bool,
    migrations: Vec<MigrationRecord>,
    hooks: Vec<MigrationHookRecord>,
    roles: BTreeSet<String>,
    statements: Vec<ExecutedStatement>,
    identity_events: Vec<IdentityEvent>,
    sessions_opened: usize,
    sessions_closed: usize,
    recreate_count: usize,
    fail_on: Option<String>,
}

impl MemoryState {
    fn require_schema(&self) -> StorageResult<()> {
        if self.schema_ready {
            Ok(())
        } else {
            Err(SessionError::QueryFailed("relation \"migration\" does not exist".to_string()).into())
        }
    }

    /// Bookkeeping operations are named `<method> <migration>` for matching
    fn fail_point(&self, operation: &str) -> StorageResult<()> {
        match &self.fail_on {
            Some(pattern) if operation.contains(pattern.as_str()) => {
                Err(SessionError::QueryFailed(format!("{} failed", operation)).into())
            }
            _ => Ok(()),
        }
    }

    fn log(&mut self, session: usize, identity: Option<String>, sql: impl Into<String>) -> SessionResult<()> {
        let sql = sql.into();
        if let Some(pattern) = &self.fail_on {
            if sql.contains(pattern.as_str()) {
                return Err(SessionError::QueryFailed(format!("statement failed: {}", sql)));
            }
        }
        self.statements.push(ExecutedStatement { session, identity, sql });
        Ok(())
    }
}

/// Shared in-memory database server
#[derive(Debug, Clone)]
pub struct InMemoryDatabase {
    state: Arc<Mutex<MemoryState>>,
    legacy: LegacyPolicy,
}

impl Default for InMemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDatabase {
    /// Empty database whose legacy records are attributed to `localhost`
    pub fn new() -> Self {
        Self::with_legacy_policy(LegacyPolicy::for_host("localhost"))
    }

    pub fn with_legacy_policy(legacy: LegacyPolicy) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            legacy,
        }
    }

    /// A view of the same server that synthesizes legacy records for another host
    pub fn for_host(&self, host_name: impl Into<String>) -> Self {
        Self {
            state: self.state.clone(),
            legacy: LegacyPolicy::new(self.legacy.cutover, host_name),
        }
    }

    /// Make every statement or bookkeeping operation containing `pattern` fail
    pub async fn fail_on(&self, pattern: impl Into<String>) {
        self.state.lock().await.fail_on = Some(pattern.into());
    }

    pub async fn clear_failure(&self) {
        self.state.lock().await.fail_on = None;
    }

    pub async fn seed_role(&self, role: impl Into<String>) {
        self.state.lock().await.roles.insert(role.into());
    }

    /// Insert a registry row with an explicit creation time
    pub async fn seed_migration(&self, name: impl Into<String>, created_at: DateTime<Utc>) {
        let mut state = self.state.lock().await;
        state.schema_ready = true;
        state.migrations.push(MigrationRecord {
            migration_id: Uuid::new_v4(),
            name: name.into(),
            filename: None,
            description: None,
            created_at,
        });
    }

    pub async fn seed_hook(&self, record: MigrationHookRecord) {
        let mut state = self.state.lock().await;
        state.schema_ready = true;
        state.hooks.push(record);
    }

    pub async fn statements(&self) -> Vec<ExecutedStatement> {
        self.state.lock().await.statements.clone()
    }

    /// SQL text of every executed statement
    pub async fn sql_log(&self) -> Vec<String> {
        self.state.lock().await.statements.iter().map(|s| s.sql.clone()).collect()
    }

    pub async fn identity_events(&self) -> Vec<IdentityEvent> {
        self.state.lock().await.identity_events.clone()
    }

    pub async fn migration_records(&self) -> Vec<MigrationRecord> {
        self.state.lock().await.migrations.clone()
    }

    pub async fn hook_records(&self) -> Vec<MigrationHookRecord> {
        self.state.lock().await.hooks.clone()
    }

    pub async fn hook_record(&self, name: &str, hook: HookKind) -> Option<MigrationHookRecord> {
        self.state
            .lock()
            .await
            .hooks
            .iter()
            .find(|h| h.name == name && h.hook == hook)
            .cloned()
    }

    pub async fn roles(&self) -> BTreeSet<String> {
        self.state.lock().await.roles.clone()
    }

    pub async fn sessions_opened(&self) -> usize {
        self.state.lock().await.sessions_opened
    }

    pub async fn sessions_closed(&self) -> usize {
        self.state.lock().await.sessions_closed
    }

    pub async fn recreate_count(&self) -> usize {
        self.state.lock().await.recreate_count
    }

    pub async fn schema_ready(&self) -> bool {
        self.state.lock().await.schema_ready
    }
}

/// Session over the shared in-memory state
struct MemorySession {
    id: usize,
    state: Arc<Mutex<MemoryState>>,
    identity: Mutex<Option<String>>,
    closed: AtomicBool,
}

impl MemorySession {
    fn ensure_open(&self) -> SessionResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }

    async fn run(&self, sql: &str) -> SessionResult<Vec<Row>> {
        self.ensure_open()?;
        let identity = self.identity.lock().await.clone();
        self.state.lock().await.log(self.id, identity, sql)?;
        Ok(Vec::new())
    }

    async fn control(&self, sql: &str) -> SessionResult<()> {
        self.run(sql).await.map(|_| ()).map_err(|e| match e {
            SessionError::QueryFailed(message) => SessionError::TransactionFailed(message),
            other => other,
        })
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn execute(&self, statement: &str, _params: &[serde_json::Value]) -> SessionResult<Vec<Row>> {
        self.run(statement).await
    }

    async fn execute_unsafe(&self, statement: &str) -> SessionResult<Vec<Row>> {
        self.run(statement).await
    }

    async fn begin_transaction(&self) -> SessionResult<()> {
        self.control("BEGIN").await
    }

    async fn commit_transaction(&self) -> SessionResult<()> {
        self.control("COMMIT").await
    }

    async fn rollback_transaction(&self) -> SessionResult<()> {
        self.control("ROLLBACK").await
    }

    async fn set_active_identity(&self, role: &str) -> SessionResult<()> {
        self.ensure_open()?;
        let mut state = self.state.lock().await;
        if !state.roles.contains(role) {
            return Err(SessionError::QueryFailed(format!("role \"{}\" does not exist", role)));
        }
        state.identity_events.push(IdentityEvent::Set {
            session: self.id,
            role: role.to_string(),
        });
        *self.identity.lock().await = Some(role.to_string());
        Ok(())
    }

    async fn reset_active_identity(&self) -> SessionResult<()> {
        self.ensure_open()?;
        self.state
            .lock()
            .await
            .identity_events
            .push(IdentityEvent::Reset { session: self.id });
        *self.identity.lock().await = None;
        Ok(())
    }

    async fn close(&self) -> SessionResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.state.lock().await.sessions_closed += 1;
        }
        Ok(())
    }
}

#[async_trait]
impl SessionProvider for InMemoryDatabase {
    async fn open(&self) -> SessionResult<Box<dyn Session>> {
        let id = {
            let mut state = self.state.lock().await;
            state.sessions_opened += 1;
            state.sessions_opened
        };
        Ok(Box::new(MemorySession {
            id,
            state: self.state.clone(),
            identity: Mutex::new(None),
            closed: AtomicBool::new(false),
        }))
    }

    async fn recreate_database(&self) -> SessionResult<()> {
        let mut state = self.state.lock().await;
        // Roles live on the cluster and survive the database
        state.schema_ready = false;
        state.migrations.clear();
        state.hooks.clear();
        state.recreate_count += 1;
        Ok(())
    }

    fn target(&self) -> String {
        "memory://tiller".to_string()
    }
}

#[async_trait]
impl StateStore for InMemoryDatabase {
    async fn ensure_schema(&self, _session: &dyn Session) -> StorageResult<()> {
        let mut state = self.state.lock().await;
        state.fail_point("ensure_schema")?;
        state.schema_ready = true;
        Ok(())
    }

    async fn find_migration(&self, _session: &dyn Session, name: &str) -> StorageResult<Option<MigrationRecord>> {
        let state = self.state.lock().await;
        state.require_schema()?;
        state.fail_point(&format!("find_migration {}", name))?;
        Ok(state.migrations.iter().find(|m| m.name == name).cloned())
    }

    async fn find_hook(
        &self,
        _session: &dyn Session,
        name: &str,
        hook: HookKind,
    ) -> StorageResult<Option<MigrationHookRecord>> {
        let state = self.state.lock().await;
        state.require_schema()?;
        state.fail_point(&format!("find_hook {}", name))?;

        if let Some(record) = state.hooks.iter().find(|h| h.name == name && h.hook == hook) {
            return Ok(Some(record.clone()));
        }

        let Some(migration) = state.migrations.iter().find(|m| m.name == name) else {
            return Ok(None);
        };
        let hook_rows = state.hooks.iter().filter(|h| h.name == name).count();
        Ok(legacy_hook_record(
            migration,
            hook_rows,
            hook,
            self.legacy.cutover,
            &self.legacy.host_name,
        ))
    }

    async fn any_hook_recorded(&self, _session: &dyn Session, name: &str) -> StorageResult<bool> {
        let state = self.state.lock().await;
        state.require_schema()?;
        state.fail_point(&format!("any_hook_recorded {}", name))?;
        Ok(state.hooks.iter().any(|h| h.name == name) || state.migrations.iter().any(|m| m.name == name))
    }

    async fn any_dev_hook_recorded(&self, _session: &dyn Session, name: &str) -> StorageResult<bool> {
        let state = self.state.lock().await;
        state.require_schema()?;
        state.fail_point(&format!("any_dev_hook_recorded {}", name))?;
        Ok(state.hooks.iter().any(|h| h.name == name && h.dev))
    }

    async fn record_migration(
        &self,
        _session: &dyn Session,
        name: &str,
        filename: Option<&str>,
        description: Option<&str>,
    ) -> StorageResult<()> {
        let mut state = self.state.lock().await;
        state.require_schema()?;
        state.fail_point(&format!("record_migration {}", name))?;
        if !state.migrations.iter().any(|m| m.name == name) {
            state.migrations.push(MigrationRecord {
                migration_id: Uuid::new_v4(),
                name: name.to_string(),
                filename: filename.map(str::to_string),
                description: description.map(str::to_string),
                created_at: Utc::now(),
            });
        }
        Ok(())
    }

    async fn record_hook(
        &self,
        _session: &dyn Session,
        hook: HookKind,
        name: &str,
        dev: bool,
        hostname: &str,
        revision: i32,
    ) -> StorageResult<()> {
        let mut state = self.state.lock().await;
        state.require_schema()?;
        state.fail_point(&format!("record_hook {}", name))?;
        if !state.migrations.iter().any(|m| m.name == name) {
            return Err(SessionError::QueryFailed(format!(
                "insert on migration_hook violates foreign key: no migration named \"{}\"",
                name
            ))
            .into());
        }

        match state.hooks.iter_mut().find(|h| h.name == name && h.hook == hook) {
            Some(existing) => existing.hostname = hostname.to_string(),
            None => state.hooks.push(MigrationHookRecord {
                hook,
                name: name.to_string(),
                dev,
                hostname: hostname.to_string(),
                revision,
                created_at: Utc::now(),
            }),
        }
        Ok(())
    }

    async fn purge_dev_state(&self, _session: &dyn Session) -> StorageResult<PurgeReport> {
        let mut state = self.state.lock().await;
        state.require_schema()?;
        state.fail_point("purge_dev_state")?;

        let before = state.hooks.len();
        state.hooks.retain(|h| !h.dev);
        let hooks_removed = (before - state.hooks.len()) as u64;

        let cutover = self.legacy.cutover;
        let remaining: BTreeSet<String> = state.hooks.iter().map(|h| h.name.clone()).collect();
        let before = state.migrations.len();
        state
            .migrations
            .retain(|m| m.created_at < cutover || remaining.contains(&m.name));
        let migrations_removed = (before - state.migrations.len()) as u64;

        Ok(PurgeReport {
            hooks_removed,
            migrations_removed,
        })
    }
}

#[async_trait]
impl RoleManager for InMemoryDatabase {
    async fn role_exists(&self, _session: &dyn Session, role: &str) -> StorageResult<bool> {
        Ok(self.state.lock().await.roles.contains(role))
    }

    async fn ensure_roles(&self, session: &dyn Session, roles: &RoleNames, dev_mode: bool) -> StorageResult<()> {
        let missing: Vec<(&String, String)> = {
            let state = self.state.lock().await;
            let mut missing = Vec::new();
            for (role, statement) in [
                (&roles.migration, SqlRoleManager::create_migration_role(&roles.migration)),
                (&roles.service, SqlRoleManager::create_service_role(&roles.service)),
            ] {
                if !state.roles.contains(role.as_str()) {
                    missing.push((role, statement));
                } else if !dev_mode {
                    return Err(StorageError::RoleConflict { role: role.clone() });
                }
            }
            missing
        };

        for (role, statement) in missing {
            session.execute(&statement, &[]).await?;
            self.state.lock().await.roles.insert(role.clone());
        }
        Ok(())
    }

    async fn teardown_roles(&self, session: &dyn Session, roles: &RoleNames) -> StorageResult<()> {
        for role in roles.iter() {
            if !self.role_exists(session, role).await? {
                continue;
            }
            for statement in SqlRoleManager::drop_role(role) {
                session.execute(&statement, &[]).await?;
            }
            self.state.lock().await.roles.remove(role);
        }
        Ok(())
    }
}

/// Restore service with a fixed outcome that remembers its requests
#[derive(Debug, Clone)]
pub struct StubRestore {
    outcome: RestoreOutcome,
    requests: Arc<Mutex<Vec<(RestoreRequest, String)>>>,
}

impl StubRestore {
    pub fn succeeding() -> Self {
        Self::with_outcome(RestoreOutcome::Restored)
    }

    pub fn with_outcome(outcome: RestoreOutcome) -> Self {
        Self {
            outcome,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every `(request, target)` pair seen so far
    pub async fn requests(&self) -> Vec<(RestoreRequest, String)> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl RestoreService for StubRestore {
    async fn restore(&self, request: &RestoreRequest, target: &str) -> RestoreOutcome {
        self.requests.lock().await.push((request.clone(), target.to_string()));
        self.outcome.clone()
    }
}
