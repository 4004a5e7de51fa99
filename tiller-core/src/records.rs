//! Persisted bookkeeping records
//!
//! Two records live inside the target database: one row per applied
//! migration and one row per `(migration, hook)` pair that has run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::hook::HookKind;

/// Revision stamped on hook rows written by this engine
pub const BOOKKEEPING_REVISION: i32 = 1;

/// Revision of rows that predate hook-level tracking, and of rows synthesized
/// for legacy migrations
pub const LEGACY_REVISION: i32 = 0;

/// Migrations recorded before this instant without any hook rows are treated
/// as fully applied
pub const DEFAULT_LEGACY_CUTOVER: &str = "2021-01-01T00:00:00Z";

/// Hooks assumed to have run for a legacy migration record
pub const LEGACY_HOOKS: &[HookKind] = &[HookKind::Cluster, HookKind::Action, HookKind::Always];

/// Parse the default legacy cutover
pub fn default_legacy_cutover() -> DateTime<Utc> {
    parse_timestamp(DEFAULT_LEGACY_CUTOVER).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Parse an RFC 3339 timestamp into UTC
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, CoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| CoreError::InvalidTimestamp(format!("{}: {}", value, e)))
}

/// A row of the migration registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub migration_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MigrationRecord {
    /// Whether the record predates the legacy cutover
    pub fn predates(&self, cutover: DateTime<Utc>) -> bool {
        self.created_at < cutover
    }
}

/// A row of the hook ledger, keyed by `(name, hook)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationHookRecord {
    pub hook: HookKind,
    pub name: String,
    pub dev: bool,
    pub hostname: String,
    pub revision: i32,
    pub created_at: DateTime<Utc>,
}

impl MigrationHookRecord {
    /// Synthesize the record a legacy migration is assumed to have
    pub fn legacy(migration: &MigrationRecord, hook: HookKind, hostname: impl Into<String>) -> Self {
        Self {
            hook,
            name: migration.name.clone(),
            dev: false,
            hostname: hostname.into(),
            revision: LEGACY_REVISION,
            created_at: migration.created_at,
        }
    }

    /// Whether the record was produced by the legacy rule set
    pub fn is_legacy(&self) -> bool {
        self.revision == LEGACY_REVISION
    }
}

/// Apply the legacy compatibility rule.
///
/// A migration recorded before `cutover` that has no hook rows at all is
/// treated as if its cluster, action and always hooks already ran in
/// production on this host.
pub fn legacy_hook_record(
    migration: &MigrationRecord,
    hook_rows: usize,
    hook: HookKind,
    cutover: DateTime<Utc>,
    hostname: &str,
) -> Option<MigrationHookRecord> {
    if hook_rows == 0 && migration.predates(cutover) && LEGACY_HOOKS.contains(&hook) {
        Some(MigrationHookRecord::legacy(migration, hook, hostname))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(created_at: DateTime<Utc>) -> MigrationRecord {
        MigrationRecord {
            migration_id: Uuid::new_v4(),
            name: "add users table".to_string(),
            filename: Some("001-add-users.yaml".to_string()),
            description: None,
            created_at,
        }
    }

    #[test]
    fn test_default_cutover_parses() {
        assert_eq!(default_legacy_cutover(), Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap());
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_legacy_rule_applies_before_cutover() {
        let cutover = default_legacy_cutover();
        let old = record(Utc.with_ymd_and_hms(2020, 3, 1, 12, 0, 0).unwrap());

        let synthesized = legacy_hook_record(&old, 0, HookKind::Action, cutover, "db-host").unwrap();
        assert!(!synthesized.dev);
        assert_eq!(synthesized.hostname, "db-host");
        assert!(synthesized.is_legacy());

        assert!(legacy_hook_record(&old, 0, HookKind::Teardown, cutover, "db-host").is_none());
        assert!(legacy_hook_record(&old, 2, HookKind::Action, cutover, "db-host").is_none());
    }

    #[test]
    fn test_legacy_rule_ignores_recent_records() {
        let recent = record(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap());
        assert!(legacy_hook_record(&recent, 0, HookKind::Cluster, default_legacy_cutover(), "db-host").is_none());
    }

    #[test]
    fn test_hook_record_deserializes_from_row() {
        let row = serde_json::json!({
            "hook": "cluster",
            "name": "add users table",
            "dev": true,
            "hostname": "host-a",
            "revision": 1,
            "created_at": "2024-05-01T10:00:00+00:00"
        });
        let parsed: MigrationHookRecord = serde_json::from_value(row).unwrap();
        assert_eq!(parsed.hook, HookKind::Cluster);
        assert!(parsed.dev);
        assert!(!parsed.is_legacy());
    }
}
