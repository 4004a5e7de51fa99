//! Hook decision engine
//!
//! [`decide`] is a pure function over the persisted history of a
//! `(migration, hook)` pair and the current invocation. It returns a tagged
//! reason in both directions so every branch can be logged and tested on its
//! own.

use std::fmt;
use tiller_core::{HookKind, MigrationHookRecord};

/// Everything the decision depends on
#[derive(Debug, Clone, Copy)]
pub struct DecisionInput<'a> {
    pub hook: HookKind,
    /// Persisted record for this `(migration, hook)`, legacy rule applied
    pub record: Option<&'a MigrationHookRecord>,
    /// Run only if the migration has recorded state (teardown gating)
    pub if_exists: bool,
    /// Re-run a recorded cluster hook when its objects are missing on this host
    pub if_no_migration_user: bool,
    pub dev_mode: bool,
    pub dry_complete: bool,
    /// Whether there is anything executable for this hook
    pub has_body: bool,
    /// The hook has no body of its own, only the managed role step
    pub role_step_only: bool,
    pub has_teardown: bool,
    pub any_migration_found: bool,
    pub any_dev_hook_found: bool,
    pub managed_users: bool,
    pub migration_role_exists: bool,
    pub host_name: &'a str,
}

/// Why a hook runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunReason {
    FirstRun,
    DevReapply,
    DevTeardown,
    ClusterRoleMissing,
    ClusterHostChanged,
    Always,
    DryComplete,
}

/// Why a hook is skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoBody,
    AlreadyApplied,
    NothingToTearDown,
}

/// Outcome of [`decide`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Run(RunReason),
    Skip(SkipReason),
}

impl fmt::Display for RunReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RunReason::FirstRun => "never recorded",
            RunReason::DevReapply => "recorded in development mode, re-applying",
            RunReason::DevTeardown => "development state present, tearing down",
            RunReason::ClusterRoleMissing => "migration role missing on this server",
            RunReason::ClusterHostChanged => "recorded on a different host",
            RunReason::Always => "always hook",
            RunReason::DryComplete => "marking complete",
        };
        f.write_str(text)
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::NoBody => "no body",
            SkipReason::AlreadyApplied => "already applied",
            SkipReason::NothingToTearDown => "nothing to tear down",
        };
        f.write_str(text)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Run(reason) => write!(f, "run ({})", reason),
            Decision::Skip(reason) => write!(f, "skip ({})", reason),
        }
    }
}

/// Decide whether a hook runs on this invocation
pub fn decide(input: &DecisionInput<'_>) -> Decision {
    if input.dry_complete {
        return Decision::Run(RunReason::DryComplete);
    }
    if !input.has_body {
        return Decision::Skip(SkipReason::NoBody);
    }
    if input.hook == HookKind::Always {
        return Decision::Run(RunReason::Always);
    }
    // Role creation alone is never recorded, so it follows the server state
    if input.hook == HookKind::Cluster && input.role_step_only {
        return if input.migration_role_exists {
            Decision::Skip(SkipReason::AlreadyApplied)
        } else {
            Decision::Run(RunReason::ClusterRoleMissing)
        };
    }

    let Some(record) = input.record else {
        if input.if_exists {
            return teardown_decision(input);
        }
        return Decision::Run(RunReason::FirstRun);
    };

    if record.dev && input.dev_mode && input.has_teardown {
        return Decision::Run(RunReason::DevReapply);
    }

    if input.if_exists {
        return teardown_decision(input);
    }

    if input.hook == HookKind::Cluster && input.if_no_migration_user {
        if input.managed_users && !input.migration_role_exists {
            return Decision::Run(RunReason::ClusterRoleMissing);
        }
        if !input.managed_users && record.hostname != input.host_name {
            return Decision::Run(RunReason::ClusterHostChanged);
        }
    }

    Decision::Skip(SkipReason::AlreadyApplied)
}

fn teardown_decision(input: &DecisionInput<'_>) -> Decision {
    if input.any_migration_found && input.any_dev_hook_found {
        Decision::Run(RunReason::DevTeardown)
    } else {
        Decision::Skip(SkipReason::NothingToTearDown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiller_core::{parse_timestamp, BOOKKEEPING_REVISION};

    fn record(hook: HookKind, dev: bool, hostname: &str) -> MigrationHookRecord {
        MigrationHookRecord {
            hook,
            name: "add users table".to_string(),
            dev,
            hostname: hostname.to_string(),
            revision: BOOKKEEPING_REVISION,
            created_at: parse_timestamp("2024-03-01T00:00:00Z").unwrap(),
        }
    }

    fn input(hook: HookKind, record: Option<&MigrationHookRecord>) -> DecisionInput<'_> {
        DecisionInput {
            hook,
            record,
            if_exists: false,
            if_no_migration_user: false,
            dev_mode: false,
            dry_complete: false,
            has_body: true,
            role_step_only: false,
            has_teardown: false,
            any_migration_found: record.is_some(),
            any_dev_hook_found: false,
            managed_users: true,
            migration_role_exists: true,
            host_name: "host-a",
        }
    }

    #[test]
    fn test_first_run() {
        assert_eq!(decide(&input(HookKind::Action, None)), Decision::Run(RunReason::FirstRun));
    }

    #[test]
    fn test_recorded_hook_is_skipped() {
        let rec = record(HookKind::Action, false, "host-a");
        assert_eq!(
            decide(&input(HookKind::Action, Some(&rec))),
            Decision::Skip(SkipReason::AlreadyApplied)
        );
    }

    #[test]
    fn test_missing_body_wins_over_every_rule() {
        let mut i = input(HookKind::Action, None);
        i.has_body = false;
        assert_eq!(decide(&i), Decision::Skip(SkipReason::NoBody));

        i.hook = HookKind::Always;
        assert_eq!(decide(&i), Decision::Skip(SkipReason::NoBody));
    }

    #[test]
    fn test_always_runs_even_when_recorded() {
        let rec = record(HookKind::Always, false, "host-a");
        assert_eq!(decide(&input(HookKind::Always, Some(&rec))), Decision::Run(RunReason::Always));
    }

    #[test]
    fn test_dev_reapply_requires_teardown_and_dev_mode() {
        let rec = record(HookKind::Action, true, "host-a");
        let mut i = input(HookKind::Action, Some(&rec));
        i.dev_mode = true;
        assert_eq!(decide(&i), Decision::Skip(SkipReason::AlreadyApplied));

        i.has_teardown = true;
        assert_eq!(decide(&i), Decision::Run(RunReason::DevReapply));

        i.dev_mode = false;
        assert_eq!(decide(&i), Decision::Skip(SkipReason::AlreadyApplied));
    }

    #[test]
    fn test_teardown_gating() {
        let mut i = input(HookKind::Teardown, None);
        i.if_exists = true;
        i.dev_mode = true;
        assert_eq!(decide(&i), Decision::Skip(SkipReason::NothingToTearDown));

        i.any_migration_found = true;
        assert_eq!(decide(&i), Decision::Skip(SkipReason::NothingToTearDown));

        i.any_dev_hook_found = true;
        assert_eq!(decide(&i), Decision::Run(RunReason::DevTeardown));
    }

    #[test]
    fn test_cluster_reruns_when_role_missing() {
        let rec = record(HookKind::Cluster, false, "host-a");
        let mut i = input(HookKind::Cluster, Some(&rec));
        i.if_no_migration_user = true;
        assert_eq!(decide(&i), Decision::Skip(SkipReason::AlreadyApplied));

        i.migration_role_exists = false;
        assert_eq!(decide(&i), Decision::Run(RunReason::ClusterRoleMissing));

        // Without the modifier a missing role is not a reason to run
        i.if_no_migration_user = false;
        assert_eq!(decide(&i), Decision::Skip(SkipReason::AlreadyApplied));
    }

    #[test]
    fn test_cluster_reruns_on_new_host_without_managed_users() {
        let rec = record(HookKind::Cluster, false, "host-a");
        let mut i = input(HookKind::Cluster, Some(&rec));
        i.if_no_migration_user = true;
        i.managed_users = false;
        i.migration_role_exists = false;
        assert_eq!(decide(&i), Decision::Skip(SkipReason::AlreadyApplied));

        i.host_name = "host-b";
        assert_eq!(decide(&i), Decision::Run(RunReason::ClusterHostChanged));
    }

    #[test]
    fn test_host_change_only_matters_for_cluster() {
        let rec = record(HookKind::Action, false, "host-a");
        let mut i = input(HookKind::Action, Some(&rec));
        i.if_no_migration_user = true;
        i.managed_users = false;
        i.host_name = "host-b";
        assert_eq!(decide(&i), Decision::Skip(SkipReason::AlreadyApplied));
    }

    #[test]
    fn test_role_only_cluster_step_follows_server_state() {
        let mut i = input(HookKind::Cluster, None);
        i.role_step_only = true;
        assert_eq!(decide(&i), Decision::Skip(SkipReason::AlreadyApplied));

        i.migration_role_exists = false;
        assert_eq!(decide(&i), Decision::Run(RunReason::ClusterRoleMissing));
    }

    #[test]
    fn test_dry_complete_forces_run() {
        let rec = record(HookKind::Action, false, "host-a");
        let mut i = input(HookKind::Action, Some(&rec));
        i.dry_complete = true;
        i.has_body = false;
        assert_eq!(decide(&i), Decision::Run(RunReason::DryComplete));
    }

    #[test]
    fn test_decision_display() {
        assert_eq!(Decision::Run(RunReason::FirstRun).to_string(), "run (never recorded)");
        assert_eq!(Decision::Skip(SkipReason::AlreadyApplied).to_string(), "skip (already applied)");
    }
}
