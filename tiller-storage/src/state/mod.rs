//! Persisted state store
//!
//! The engine keeps its bookkeeping inside the target database: a registry
//! with one row per migration and a ledger with one row per
//! `(migration, hook)` pair. Every write is an insert-if-absent, so a run
//! interrupted at any point can simply be repeated.

mod sql;

pub use sql::SqlStateStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tiller_core::{default_legacy_cutover, HookKind, MigrationHookRecord, MigrationRecord};
use tiller_interfaces::{Row, Session};

use crate::error::{StorageError, StorageResult};

/// Schema that holds the bookkeeping tables
pub const DEFAULT_BOOKKEEPING_SCHEMA: &str = "tiller";

/// How records that predate hook-level tracking are interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyPolicy {
    /// Migration records created before this instant are legacy
    pub cutover: DateTime<Utc>,
    /// Host name attributed to synthesized legacy hook records
    pub host_name: String,
}

impl LegacyPolicy {
    pub fn new(cutover: DateTime<Utc>, host_name: impl Into<String>) -> Self {
        Self {
            cutover,
            host_name: host_name.into(),
        }
    }

    /// Default cutover, attributed to the given host
    pub fn for_host(host_name: impl Into<String>) -> Self {
        Self::new(default_legacy_cutover(), host_name)
    }
}

/// Rows removed by [`StateStore::purge_dev_state`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub hooks_removed: u64,
    pub migrations_removed: u64,
}

/// Bookkeeping store operations.
///
/// Failures propagate unchanged; the store never retries.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Idempotently create the bookkeeping schema, tables and constraints
    async fn ensure_schema(&self, session: &dyn Session) -> StorageResult<()>;

    async fn find_migration(&self, session: &dyn Session, name: &str) -> StorageResult<Option<MigrationRecord>>;

    /// Find the ledger row for `(name, hook)`, applying the legacy rule when
    /// the migration has no ledger rows at all
    async fn find_hook(
        &self,
        session: &dyn Session,
        name: &str,
        hook: HookKind,
    ) -> StorageResult<Option<MigrationHookRecord>>;

    /// Whether the migration has any recorded state (ledger rows or a registry row)
    async fn any_hook_recorded(&self, session: &dyn Session, name: &str) -> StorageResult<bool>;

    /// Whether any ledger row of the migration was written in development mode
    async fn any_dev_hook_recorded(&self, session: &dyn Session, name: &str) -> StorageResult<bool>;

    /// Insert the registry row unless it already exists
    async fn record_migration(
        &self,
        session: &dyn Session,
        name: &str,
        filename: Option<&str>,
        description: Option<&str>,
    ) -> StorageResult<()>;

    /// Insert the ledger row unless `(name, hook)` already exists
    async fn record_hook(
        &self,
        session: &dyn Session,
        hook: HookKind,
        name: &str,
        dev: bool,
        hostname: &str,
        revision: i32,
    ) -> StorageResult<()>;

    /// Delete dev ledger rows, then registry rows created after the legacy
    /// cutover that no longer have any ledger rows
    async fn purge_dev_state(&self, session: &dyn Session) -> StorageResult<PurgeReport>;
}

pub(crate) fn decode_row<T: serde::de::DeserializeOwned>(entity: &'static str, row: Row) -> StorageResult<T> {
    serde_json::from_value(serde_json::Value::Object(row)).map_err(|e| StorageError::decode(entity, e.to_string()))
}

pub(crate) fn bool_column(entity: &'static str, rows: &[Row], column: &str) -> StorageResult<bool> {
    rows.first()
        .and_then(|row| row.get(column))
        .and_then(|value| value.as_bool())
        .ok_or_else(|| StorageError::decode(entity, format!("expected boolean column '{}'", column)))
}

pub(crate) fn int_column(entity: &'static str, rows: &[Row], column: &str) -> StorageResult<i64> {
    rows.first()
        .and_then(|row| row.get(column))
        .and_then(|value| value.as_i64())
        .ok_or_else(|| StorageError::decode(entity, format!("expected integer column '{}'", column)))
}
