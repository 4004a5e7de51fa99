//! Run options consumed by the scheduler

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::records::default_legacy_cutover;

/// Invocation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Iterative local development: dev-tagged hooks are torn down and re-applied
    Development,
    /// Every hook runs at most once
    Production,
}

impl RunMode {
    pub fn is_development(&self) -> bool {
        matches!(self, RunMode::Development)
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Development => write!(f, "development"),
            RunMode::Production => write!(f, "production"),
        }
    }
}

/// Dry-run projection mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DryRunMode {
    /// Execute hook bodies normally
    #[default]
    Off,
    /// Log intended hook bodies without executing or recording anything
    Dry,
    /// Record every hook as applied without executing any body
    DryComplete,
}

/// Which parts of a backup to restore
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreScope {
    #[default]
    Full,
    SchemaOnly,
    DataOnly,
}

/// A request to restore a backup before migrating
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreRequest {
    pub file: PathBuf,
    #[serde(default)]
    pub scope: RestoreScope,
}

impl RestoreRequest {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            scope: RestoreScope::Full,
        }
    }

    pub fn with_scope(mut self, scope: RestoreScope) -> Self {
        self.scope = scope;
        self
    }
}

/// Fully validated options for a single engine run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub mode: RunMode,
    /// Only tear down dev state (development mode only)
    pub teardown_only: bool,
    pub dry_run: DryRunMode,
    pub restore: Option<RestoreRequest>,
    /// Identity of the executing host, recorded on every hook row
    pub host_name: String,
    pub legacy_cutover: DateTime<Utc>,
}

impl RunOptions {
    /// Create options for the given mode and host
    pub fn new(mode: RunMode, host_name: impl Into<String>) -> Self {
        Self {
            mode,
            teardown_only: false,
            dry_run: DryRunMode::Off,
            restore: None,
            host_name: host_name.into(),
            legacy_cutover: default_legacy_cutover(),
        }
    }

    pub fn with_teardown_only(mut self, teardown_only: bool) -> Self {
        self.teardown_only = teardown_only;
        self
    }

    pub fn with_dry_run(mut self, dry_run: DryRunMode) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_restore(mut self, restore: Option<RestoreRequest>) -> Self {
        self.restore = restore;
        self
    }

    pub fn with_legacy_cutover(mut self, cutover: DateTime<Utc>) -> Self {
        self.legacy_cutover = cutover;
        self
    }

    pub fn is_dev(&self) -> bool {
        self.mode.is_development()
    }

    pub fn is_dry(&self) -> bool {
        self.dry_run == DryRunMode::Dry
    }

    pub fn is_dry_complete(&self) -> bool {
        self.dry_run == DryRunMode::DryComplete
    }
}
