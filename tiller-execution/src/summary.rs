//! Run summary returned by the scheduler

use std::fmt;
use tiller_core::HookKind;
use tiller_interfaces::RestoreOutcome;
use tiller_storage::PurgeReport;
use uuid::Uuid;

use crate::decision::{RunReason, SkipReason};

/// What happened to one `(migration, hook)` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    Executed(RunReason),
    /// Described only (dry mode)
    Projected(RunReason),
    /// Recorded without running (dry-complete mode)
    MarkedComplete,
    Skipped(SkipReason),
}

impl fmt::Display for HookOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookOutcome::Executed(reason) => write!(f, "executed ({})", reason),
            HookOutcome::Projected(reason) => write!(f, "projected ({})", reason),
            HookOutcome::MarkedComplete => write!(f, "marked complete"),
            HookOutcome::Skipped(reason) => write!(f, "skipped ({})", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookReport {
    pub phase: &'static str,
    pub migration: String,
    pub hook: HookKind,
    pub outcome: HookOutcome,
}

/// Result of a complete run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub hooks: Vec<HookReport>,
    pub restore: Option<RestoreOutcome>,
    pub purge: Option<PurgeReport>,
    pub database_recreated: bool,
}

impl RunSummary {
    pub(crate) fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            hooks: Vec::new(),
            restore: None,
            purge: None,
            database_recreated: false,
        }
    }

    pub(crate) fn push(&mut self, phase: &'static str, migration: &str, hook: HookKind, outcome: HookOutcome) {
        self.hooks.push(HookReport {
            phase,
            migration: migration.to_string(),
            hook,
            outcome,
        });
    }

    /// Outcomes for one migration and hook, in order
    pub fn outcomes(&self, migration: &str, hook: HookKind) -> Vec<HookOutcome> {
        self.hooks
            .iter()
            .filter(|r| r.migration == migration && r.hook == hook)
            .map(|r| r.outcome)
            .collect()
    }

    pub fn executed(&self) -> impl Iterator<Item = &HookReport> {
        self.hooks
            .iter()
            .filter(|r| matches!(r.outcome, HookOutcome::Executed(_)))
    }

    pub fn executed_count(&self) -> usize {
        self.executed().count()
    }

    pub fn skipped_count(&self) -> usize {
        self.hooks
            .iter()
            .filter(|r| matches!(r.outcome, HookOutcome::Skipped(_)))
            .count()
    }
}
