//! Dry-run projector
//!
//! Sits between a positive decision and the hook body. In `dry` mode the
//! body is described instead of executed and nothing is recorded; in
//! `dry-complete` mode the body is skipped and bookkeeping is written as if
//! it had succeeded.

use tiller_core::{DryRunMode, HookKind};
use tiller_interfaces::HookBody;
use tracing::info;

/// What to do with a hook that the decision engine selected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    Execute,
    /// Log the intended action; no side effects
    Describe,
    /// Record as applied without running
    MarkComplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DryRunProjector {
    mode: DryRunMode,
}

impl DryRunProjector {
    pub fn new(mode: DryRunMode) -> Self {
        Self { mode }
    }

    pub fn projection(&self) -> Projection {
        match self.mode {
            DryRunMode::Off => Projection::Execute,
            DryRunMode::Dry => Projection::Describe,
            DryRunMode::DryComplete => Projection::MarkComplete,
        }
    }

    /// Whether the decision engine must run every hook
    pub fn forces_run(&self) -> bool {
        self.mode == DryRunMode::DryComplete
    }

    /// Whether drop/create, restore and role changes may happen
    pub fn allows_server_changes(&self) -> bool {
        self.mode == DryRunMode::Off
    }

    /// Whether bookkeeping may be written
    pub fn records_state(&self) -> bool {
        self.mode != DryRunMode::Dry
    }

    /// Log what a hook would do
    pub fn describe(&self, migration: &str, hook: HookKind, body: Option<&dyn HookBody>, as_role: Option<&str>) {
        let identity = as_role.unwrap_or("connection identity");
        match body.and_then(|b| b.describe()) {
            Some(text) => info!("[dry] {} {} as {}:\n{}", migration, hook, identity, text.trim_end()),
            None if body.is_some() => info!("[dry] {} {} as {}", migration, hook, identity),
            None => info!("[dry] {} {}: managed role changes only", migration, hook),
        }
    }

    /// Log a structural step that is being skipped
    pub fn skip_step(&self, step: &str) {
        info!("[{}] skipping {}", self.label(), step);
    }

    fn label(&self) -> &'static str {
        match self.mode {
            DryRunMode::Off => "run",
            DryRunMode::Dry => "dry",
            DryRunMode::DryComplete => "dry-complete",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_by_mode() {
        let off = DryRunProjector::new(DryRunMode::Off);
        assert_eq!(off.projection(), Projection::Execute);
        assert!(off.allows_server_changes() && off.records_state() && !off.forces_run());

        let dry = DryRunProjector::new(DryRunMode::Dry);
        assert_eq!(dry.projection(), Projection::Describe);
        assert!(!dry.allows_server_changes() && !dry.records_state() && !dry.forces_run());

        let complete = DryRunProjector::new(DryRunMode::DryComplete);
        assert_eq!(complete.projection(), Projection::MarkComplete);
        assert!(!complete.allows_server_changes() && complete.records_state() && complete.forces_run());
    }
}
