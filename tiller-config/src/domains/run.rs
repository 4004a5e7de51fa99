//! Run mode configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tiller_core::{
    parse_timestamp, DryRunMode, RestoreRequest, RestoreScope, RunMode, RunOptions, DEFAULT_LEGACY_CUTOVER,
};

use crate::error::ConfigResult;
use crate::validation::{validate_exclusive, validate_required_string, Validatable};

/// How a single invocation behaves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Development mode: dev-tagged hooks are torn down and re-applied
    pub dev: bool,
    pub production: bool,
    /// Only tear down development state
    pub teardown: bool,
    /// Log intended hook bodies without running them
    pub dry: bool,
    /// Record every hook as applied without running it
    pub dry_complete: bool,

    /// Backup restored into a freshly recreated database before migrating
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restore_file: Option<PathBuf>,
    pub schema_only: bool,
    pub data_only: bool,

    /// Overrides the detected host name recorded on hook rows
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,

    /// Migration records created before this RFC 3339 instant predate hook tracking
    pub legacy_cutover: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            dev: false,
            production: false,
            teardown: false,
            dry: false,
            dry_complete: false,
            restore_file: None,
            schema_only: false,
            data_only: false,
            host_name: None,
            legacy_cutover: DEFAULT_LEGACY_CUTOVER.to_string(),
        }
    }
}

impl RunConfig {
    pub fn mode(&self) -> Option<RunMode> {
        match (self.dev, self.production) {
            (true, false) => Some(RunMode::Development),
            (false, true) => Some(RunMode::Production),
            _ => None,
        }
    }

    pub fn dry_run(&self) -> DryRunMode {
        if self.dry_complete {
            DryRunMode::DryComplete
        } else if self.dry {
            DryRunMode::Dry
        } else {
            DryRunMode::Off
        }
    }

    pub fn restore(&self) -> Option<RestoreRequest> {
        let scope = if self.schema_only {
            RestoreScope::SchemaOnly
        } else if self.data_only {
            RestoreScope::DataOnly
        } else {
            RestoreScope::Full
        };
        self.restore_file
            .as_ref()
            .map(|file| RestoreRequest::new(file.clone()).with_scope(scope))
    }

    /// Build engine options, using `detected_host` unless a host name is configured
    pub fn to_options(&self, detected_host: &str) -> ConfigResult<RunOptions> {
        self.validate()?;

        let mode = self
            .mode()
            .ok_or_else(|| self.validation_error("exactly one of dev or production must be set"))?;
        let cutover = parse_timestamp(&self.legacy_cutover).map_err(|e| self.validation_error(e.to_string()))?;
        let host = self.host_name.as_deref().unwrap_or(detected_host);
        validate_required_string(host, "host_name", self.domain_name())?;

        Ok(RunOptions::new(mode, host)
            .with_teardown_only(self.teardown)
            .with_dry_run(self.dry_run())
            .with_restore(self.restore())
            .with_legacy_cutover(cutover))
    }
}

impl Validatable for RunConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.mode().is_none() {
            return Err(self.validation_error("exactly one of dev or production must be set"));
        }
        if self.teardown && !self.dev {
            return Err(self.validation_error("teardown is only allowed in dev mode"));
        }

        validate_exclusive((self.dry, "dry"), (self.dry_complete, "dry_complete"), self.domain_name())?;
        validate_exclusive((self.schema_only, "schema_only"), (self.data_only, "data_only"), self.domain_name())?;
        validate_exclusive(
            (self.teardown, "teardown"),
            (self.restore_file.is_some(), "restore_file"),
            self.domain_name(),
        )?;

        if (self.schema_only || self.data_only) && self.restore_file.is_none() {
            return Err(self.validation_error("schema_only and data_only require restore_file"));
        }
        if let Some(host) = &self.host_name {
            validate_required_string(host, "host_name", self.domain_name())?;
        }
        parse_timestamp(&self.legacy_cutover).map_err(|e| self.validation_error(e.to_string()))?;

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "run"
    }
}
