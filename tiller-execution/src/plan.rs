//! Phase plan
//!
//! The list of phases is fixed per mode. Hook-group phases apply each group
//! to every migration, in caller order, before the next group starts.

use tiller_core::{HookKind, RunOptions};

/// How one hook is treated within a hook-group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookSpec {
    pub kind: HookKind,
    /// Run only when the migration has recorded development state
    pub if_exists: bool,
    /// Write bookkeeping after the hook succeeds
    pub remember_change: bool,
    /// Re-run a recorded cluster hook whose server-level objects are missing
    pub if_no_migration_user: bool,
}

impl HookSpec {
    pub const fn new(kind: HookKind) -> Self {
        Self {
            kind,
            if_exists: false,
            remember_change: false,
            if_no_migration_user: false,
        }
    }

    pub const fn if_exists(mut self) -> Self {
        self.if_exists = true;
        self
    }

    pub const fn remember_change(mut self) -> Self {
        self.remember_change = true;
        self
    }

    pub const fn if_no_migration_user(mut self) -> Self {
        self.if_no_migration_user = true;
        self
    }
}

/// Hook specifications applied together to one migration
pub type HookGroup = Vec<HookSpec>;

/// A scheduler stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    DropCreateIfRestoring,
    RestoreIfRequested,
    SetupSchema,
    ClusterMigrate(Vec<HookGroup>),
    DatabaseMigrate(Vec<HookGroup>),
    DevTeardown(Vec<HookGroup>),
    PurgeDevState,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::DropCreateIfRestoring => "drop_create_if_restoring",
            Phase::RestoreIfRequested => "restore_if_requested",
            Phase::SetupSchema => "setup_schema",
            Phase::ClusterMigrate(_) => "cluster_migrate",
            Phase::DatabaseMigrate(_) => "database_migrate",
            Phase::DevTeardown(_) => "dev_teardown",
            Phase::PurgeDevState => "purge_dev_state",
        }
    }

    /// Hook-groups of the phase; empty for structural phases
    pub fn hook_groups(&self) -> &[HookGroup] {
        match self {
            Phase::ClusterMigrate(groups) | Phase::DatabaseMigrate(groups) | Phase::DevTeardown(groups) => groups,
            _ => &[],
        }
    }
}

/// Phases for a run with the given options
pub fn build_plan(options: &RunOptions) -> Vec<Phase> {
    let teardown = HookSpec::new(HookKind::Teardown).if_exists();

    if options.is_dev() && options.teardown_only {
        return vec![
            Phase::SetupSchema,
            Phase::DevTeardown(vec![vec![teardown]]),
            Phase::PurgeDevState,
        ];
    }

    let mut cluster_groups = Vec::new();
    if options.is_dev() {
        cluster_groups.push(vec![teardown]);
    }
    cluster_groups.push(vec![HookSpec::new(HookKind::Cluster)
        .remember_change()
        .if_no_migration_user()]);

    vec![
        Phase::DropCreateIfRestoring,
        Phase::RestoreIfRequested,
        Phase::SetupSchema,
        Phase::ClusterMigrate(cluster_groups),
        Phase::DatabaseMigrate(vec![
            vec![HookSpec::new(HookKind::Action).remember_change()],
            vec![HookSpec::new(HookKind::Always).remember_change()],
        ]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiller_core::RunMode;

    fn names(plan: &[Phase]) -> Vec<&'static str> {
        plan.iter().map(Phase::name).collect()
    }

    #[test]
    fn test_production_plan() {
        let plan = build_plan(&RunOptions::new(RunMode::Production, "h"));
        assert_eq!(
            names(&plan),
            vec![
                "drop_create_if_restoring",
                "restore_if_requested",
                "setup_schema",
                "cluster_migrate",
                "database_migrate"
            ]
        );

        let cluster = plan[3].hook_groups();
        assert_eq!(cluster.len(), 1);
        assert_eq!(cluster[0][0].kind, HookKind::Cluster);
        assert!(cluster[0][0].remember_change && cluster[0][0].if_no_migration_user);

        let database = plan[4].hook_groups();
        assert_eq!(database[0][0].kind, HookKind::Action);
        assert_eq!(database[1][0].kind, HookKind::Always);
    }

    #[test]
    fn test_development_plan_tears_down_before_cluster() {
        let plan = build_plan(&RunOptions::new(RunMode::Development, "h"));
        let cluster = plan[3].hook_groups();
        assert_eq!(cluster.len(), 2);
        assert_eq!(cluster[0][0], HookSpec::new(HookKind::Teardown).if_exists());
        assert_eq!(cluster[1][0].kind, HookKind::Cluster);
    }

    #[test]
    fn test_teardown_plan() {
        let plan = build_plan(&RunOptions::new(RunMode::Development, "h").with_teardown_only(true));
        assert_eq!(names(&plan), vec!["setup_schema", "dev_teardown", "purge_dev_state"]);
        assert!(!plan[1].hook_groups()[0][0].remember_change);
    }
}
