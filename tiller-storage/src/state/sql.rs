//! SQL implementation of the state store

use async_trait::async_trait;
use serde_json::json;
use tiller_core::{legacy_hook_record, quote_identifier, HookKind, MigrationHookRecord, MigrationRecord};
use tiller_interfaces::Session;
use tracing::{debug, info};
use uuid::Uuid;

use super::{bool_column, decode_row, int_column, LegacyPolicy, PurgeReport, StateStore, DEFAULT_BOOKKEEPING_SCHEMA};
use crate::error::StorageResult;

/// State store backed by two tables in the target database
#[derive(Debug, Clone)]
pub struct SqlStateStore {
    schema: String,
    legacy: LegacyPolicy,
}

impl SqlStateStore {
    /// Create a store using the given bookkeeping schema
    pub fn new(schema: impl Into<String>, legacy: LegacyPolicy) -> Self {
        Self {
            schema: schema.into(),
            legacy,
        }
    }

    /// Create a store in the default `tiller` schema
    pub fn with_legacy_policy(legacy: LegacyPolicy) -> Self {
        Self::new(DEFAULT_BOOKKEEPING_SCHEMA, legacy)
    }

    fn migration_table(&self) -> String {
        format!("{}.migration", quote_identifier(&self.schema))
    }

    fn hook_table(&self) -> String {
        format!("{}.migration_hook", quote_identifier(&self.schema))
    }

    /// Statements run by [`StateStore::ensure_schema`], in order.
    ///
    /// Needs PostgreSQL 9.6 or later (`ADD COLUMN IF NOT EXISTS`). Migration
    /// ids are generated here rather than with `gen_random_uuid()`, which is
    /// only built in from PostgreSQL 13.
    pub fn schema_statements(&self) -> Vec<String> {
        let migration = self.migration_table();
        let hook = self.hook_table();

        vec![
            format!("CREATE SCHEMA IF NOT EXISTS {}", quote_identifier(&self.schema)),
            format!(
                r#"CREATE TABLE IF NOT EXISTS {migration} (
    migration_id uuid PRIMARY KEY,
    name text NOT NULL,
    filename text,
    description text,
    created_at timestamptz NOT NULL DEFAULT now(),
    CONSTRAINT migration_name_key UNIQUE (name)
)"#
            ),
            format!(
                r#"CREATE TABLE IF NOT EXISTS {hook} (
    hook text NOT NULL,
    name text NOT NULL,
    dev boolean NOT NULL DEFAULT false,
    hostname text NOT NULL,
    created_at timestamptz NOT NULL DEFAULT now(),
    CONSTRAINT migration_hook_pkey PRIMARY KEY (name, hook),
    CONSTRAINT migration_hook_name_fkey FOREIGN KEY (name)
        REFERENCES {migration} (name) ON DELETE CASCADE
)"#
            ),
            // Rows that predate the column belong to the legacy revision
            format!("ALTER TABLE {hook} ADD COLUMN IF NOT EXISTS revision integer NOT NULL DEFAULT 0"),
        ]
    }

    async fn count_hooks(&self, session: &dyn Session, name: &str) -> StorageResult<i64> {
        let rows = session
            .execute(
                &format!("SELECT count(*) AS hook_count FROM {} WHERE name = $1", self.hook_table()),
                &[json!(name)],
            )
            .await?;
        int_column("migration_hook", &rows, "hook_count")
    }
}

#[async_trait]
impl StateStore for SqlStateStore {
    async fn ensure_schema(&self, session: &dyn Session) -> StorageResult<()> {
        for statement in self.schema_statements() {
            session.execute(&statement, &[]).await?;
        }
        debug!("Bookkeeping schema ready: {}", self.schema);
        Ok(())
    }

    async fn find_migration(&self, session: &dyn Session, name: &str) -> StorageResult<Option<MigrationRecord>> {
        let rows = session
            .execute(
                &format!(
                    "SELECT migration_id, name, filename, description, created_at FROM {} WHERE name = $1",
                    self.migration_table()
                ),
                &[json!(name)],
            )
            .await?;

        rows.into_iter().next().map(|row| decode_row("migration", row)).transpose()
    }

    async fn find_hook(
        &self,
        session: &dyn Session,
        name: &str,
        hook: HookKind,
    ) -> StorageResult<Option<MigrationHookRecord>> {
        let rows = session
            .execute(
                &format!(
                    "SELECT hook, name, dev, hostname, revision, created_at FROM {} WHERE name = $1 AND hook = $2",
                    self.hook_table()
                ),
                &[json!(name), json!(hook.as_str())],
            )
            .await?;

        if let Some(row) = rows.into_iter().next() {
            return decode_row("migration_hook", row).map(Some);
        }

        let Some(migration) = self.find_migration(session, name).await? else {
            return Ok(None);
        };

        let hook_rows = self.count_hooks(session, name).await?;
        let synthesized = legacy_hook_record(
            &migration,
            hook_rows.max(0) as usize,
            hook,
            self.legacy.cutover,
            &self.legacy.host_name,
        );
        if synthesized.is_some() {
            debug!("Treating legacy migration '{}' as having run its {} hook", name, hook);
        }
        Ok(synthesized)
    }

    async fn any_hook_recorded(&self, session: &dyn Session, name: &str) -> StorageResult<bool> {
        let rows = session
            .execute(
                &format!(
                    "SELECT EXISTS (SELECT 1 FROM {} WHERE name = $1) OR EXISTS (SELECT 1 FROM {} WHERE name = $1) AS found",
                    self.hook_table(),
                    self.migration_table()
                ),
                &[json!(name)],
            )
            .await?;
        bool_column("migration_hook", &rows, "found")
    }

    async fn any_dev_hook_recorded(&self, session: &dyn Session, name: &str) -> StorageResult<bool> {
        let rows = session
            .execute(
                &format!(
                    "SELECT EXISTS (SELECT 1 FROM {} WHERE name = $1 AND dev) AS found",
                    self.hook_table()
                ),
                &[json!(name)],
            )
            .await?;
        bool_column("migration_hook", &rows, "found")
    }

    async fn record_migration(
        &self,
        session: &dyn Session,
        name: &str,
        filename: Option<&str>,
        description: Option<&str>,
    ) -> StorageResult<()> {
        session
            .execute(
                &format!(
                    "INSERT INTO {} (migration_id, name, filename, description) VALUES ($1::uuid, $2, $3, $4) \
                     ON CONFLICT (name) DO NOTHING",
                    self.migration_table()
                ),
                &[json!(Uuid::new_v4().to_string()), json!(name), json!(filename), json!(description)],
            )
            .await?;
        Ok(())
    }

    async fn record_hook(
        &self,
        session: &dyn Session,
        hook: HookKind,
        name: &str,
        dev: bool,
        hostname: &str,
        revision: i32,
    ) -> StorageResult<()> {
        // An existing key only has its host refreshed
        session
            .execute(
                &format!(
                    "INSERT INTO {} (hook, name, dev, hostname, revision) VALUES ($1, $2, $3, $4, $5) \
                     ON CONFLICT (name, hook) DO UPDATE SET hostname = EXCLUDED.hostname",
                    self.hook_table()
                ),
                &[json!(hook.as_str()), json!(name), json!(dev), json!(hostname), json!(revision)],
            )
            .await?;
        Ok(())
    }

    async fn purge_dev_state(&self, session: &dyn Session) -> StorageResult<PurgeReport> {
        let hooks = session
            .execute(
                &format!("DELETE FROM {} WHERE dev RETURNING name", self.hook_table()),
                &[],
            )
            .await?;

        let migrations = session
            .execute(
                &format!(
                    "DELETE FROM {migration} m WHERE m.created_at >= $1::timestamptz \
                     AND NOT EXISTS (SELECT 1 FROM {hook} h WHERE h.name = m.name) RETURNING m.name",
                    migration = self.migration_table(),
                    hook = self.hook_table()
                ),
                &[json!(self.legacy.cutover.to_rfc3339())],
            )
            .await?;

        let report = PurgeReport {
            hooks_removed: hooks.len() as u64,
            migrations_removed: migrations.len() as u64,
        };
        info!(
            "Purged dev state: {} hook records, {} migration records",
            report.hooks_removed, report.migrations_removed
        );
        Ok(report)
    }
}
