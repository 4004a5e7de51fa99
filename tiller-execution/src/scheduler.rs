//! Phase scheduler
//!
//! [`MigrationEngine`] walks the phase plan strictly sequentially. Within a
//! hook-group phase every migration gets a fresh session, so session-scoped
//! settings such as an active role never leak from one migration into the
//! next. The first failure aborts the run; bookkeeping written before it
//! stays committed.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tiller_core::{HookKind, MigrationHookRecord, RoleNames, RunOptions, LEGACY_HOOKS};
use tiller_interfaces::{
    HookBody, HookContext, MigrationDescriptor, MigrationLoader, RestoreService, Session, SessionProvider,
};
use tiller_storage::{RoleManager, StateStore, StorageError};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::decision::{decide, Decision, DecisionInput};
use crate::error::{ExecutionError, ExecutionResult};
use crate::plan::{build_plan, HookGroup, HookSpec, Phase};
use crate::projector::{DryRunProjector, Projection};
use crate::summary::{HookOutcome, RunSummary};

/// Runs migrations against a target database
pub struct MigrationEngine {
    sessions: Arc<dyn SessionProvider>,
    store: Arc<dyn StateStore>,
    roles: Arc<dyn RoleManager>,
    restore: Arc<dyn RestoreService>,
    loader: Arc<dyn MigrationLoader>,
}

/// State shared by every step of one run
struct RunContext<'a> {
    options: &'a RunOptions,
    projector: DryRunProjector,
    summary: RunSummary,
}

impl MigrationEngine {
    pub fn new(
        sessions: Arc<dyn SessionProvider>,
        store: Arc<dyn StateStore>,
        roles: Arc<dyn RoleManager>,
        restore: Arc<dyn RestoreService>,
        loader: Arc<dyn MigrationLoader>,
    ) -> Self {
        Self {
            sessions,
            store,
            roles,
            restore,
            loader,
        }
    }

    /// Apply `migrations`, in the given order, according to `options`
    pub async fn run(&self, options: &RunOptions, migrations: &[PathBuf]) -> ExecutionResult<RunSummary> {
        let run_id = Uuid::new_v4();
        let span = info_span!("migrate", run_id = %run_id, mode = %options.mode);
        self.run_phases(run_id, options, migrations).instrument(span).await
    }

    async fn run_phases(
        &self,
        run_id: Uuid,
        options: &RunOptions,
        migrations: &[PathBuf],
    ) -> ExecutionResult<RunSummary> {
        validate_options(options)?;
        self.preflight(migrations).await?;

        let mut run = RunContext {
            options,
            projector: DryRunProjector::new(options.dry_run),
            summary: RunSummary::new(run_id),
        };

        let plan = build_plan(options);
        info!(
            "Running {} migrations in {} mode ({} phases)",
            migrations.len(),
            options.mode,
            plan.len()
        );

        for phase in &plan {
            let span = info_span!("phase", phase = phase.name());
            self.run_phase(&mut run, phase, migrations).instrument(span).await?;
        }

        info!(
            "Migration run complete: {} hooks executed, {} skipped",
            run.summary.executed_count(),
            run.summary.skipped_count()
        );
        Ok(run.summary)
    }

    /// Load every migration once so that missing fields and duplicate names
    /// are reported before anything touches the database
    async fn preflight(&self, migrations: &[PathBuf]) -> ExecutionResult<()> {
        let mut names = HashSet::new();
        for path in migrations {
            let descriptor = self.loader.load(path).await?;
            if !names.insert(descriptor.name.clone()) {
                return Err(ExecutionError::Configuration(format!(
                    "Duplicate migration name '{}' in {}",
                    descriptor.name,
                    path.display()
                )));
            }
        }
        Ok(())
    }

    async fn run_phase(&self, run: &mut RunContext<'_>, phase: &Phase, migrations: &[PathBuf]) -> ExecutionResult<()> {
        debug!("Entering phase {}", phase.name());
        match phase {
            Phase::DropCreateIfRestoring => self.drop_create_if_restoring(run).await,
            Phase::RestoreIfRequested => {
                self.restore_if_requested(run).await;
                Ok(())
            }
            Phase::SetupSchema => self.setup_schema().await,
            Phase::PurgeDevState => self.purge_dev_state(run).await,
            Phase::ClusterMigrate(groups) | Phase::DatabaseMigrate(groups) | Phase::DevTeardown(groups) => {
                for group in groups {
                    for path in migrations {
                        self.run_migration(run, phase.name(), group, path).await?;
                    }
                }
                Ok(())
            }
        }
    }

    async fn drop_create_if_restoring(&self, run: &mut RunContext<'_>) -> ExecutionResult<()> {
        if run.options.restore.is_none() {
            return Ok(());
        }
        if !run.projector.allows_server_changes() {
            run.projector.skip_step("drop and create of the target database");
            return Ok(());
        }

        info!("Recreating the target database before restore");
        self.sessions.recreate_database().await?;
        run.summary.database_recreated = true;
        Ok(())
    }

    async fn restore_if_requested(&self, run: &mut RunContext<'_>) {
        let Some(request) = &run.options.restore else {
            return;
        };
        if !run.projector.allows_server_changes() {
            run.projector.skip_step("restore");
            return;
        }

        let outcome = self.restore.restore(request, &self.sessions.target()).await;
        if outcome.is_success() {
            info!("Restored {}", request.file.display());
        } else {
            warn!("Restore of {} failed, continuing: {:?}", request.file.display(), outcome);
        }
        run.summary.restore = Some(outcome);
    }

    async fn setup_schema(&self) -> ExecutionResult<()> {
        let session = self.sessions.open().await?;
        let result = self.store.ensure_schema(session.as_ref()).await.map_err(ExecutionError::from);
        finish_session(session, result).await
    }

    async fn purge_dev_state(&self, run: &mut RunContext<'_>) -> ExecutionResult<()> {
        if !run.projector.records_state() {
            run.projector.skip_step("purge of development state");
            return Ok(());
        }

        let session = self.sessions.open().await?;
        let result = self.store.purge_dev_state(session.as_ref()).await.map_err(ExecutionError::from);
        let report = finish_session(session, result).await?;
        run.summary.purge = Some(report);
        Ok(())
    }

    /// Apply one hook-group to one migration over a fresh session
    async fn run_migration(
        &self,
        run: &mut RunContext<'_>,
        phase: &'static str,
        group: &HookGroup,
        path: &Path,
    ) -> ExecutionResult<()> {
        let descriptor = self.loader.load(path).await?;
        let session = self.sessions.open().await?;
        let result = self
            .run_group(run, phase, group, &descriptor, path, session.as_ref())
            .await;
        finish_session(session, result).await
    }

    async fn run_group(
        &self,
        run: &mut RunContext<'_>,
        phase: &'static str,
        group: &HookGroup,
        descriptor: &MigrationDescriptor,
        path: &Path,
        session: &dyn Session,
    ) -> ExecutionResult<()> {
        let roles = RoleNames::for_migration(&descriptor.name);
        let migration_role_exists = self.roles.role_exists(session, &roles.migration).await?;

        for spec in group {
            let step = HookStep {
                descriptor,
                path,
                spec,
                roles: &roles,
                migration_role_exists,
            };
            let outcome = self.run_hook(run, session, &step).await?;
            run.summary.push(phase, &descriptor.name, spec.kind, outcome);
        }
        Ok(())
    }

    async fn run_hook(&self, run: &RunContext<'_>, session: &dyn Session, step: &HookStep<'_>) -> ExecutionResult<HookOutcome> {
        let name = step.descriptor.name.as_str();
        let kind = step.spec.kind;
        let managed_users = step.descriptor.managed_users();

        let record = self.store.find_hook(session, name, kind).await?;
        let any_migration_found = self.store.any_hook_recorded(session, name).await?;
        let any_dev_hook_found = self.store.any_dev_hook_recorded(session, name).await?;

        let decision = decide(&DecisionInput {
            hook: kind,
            record: record.as_ref(),
            if_exists: step.spec.if_exists,
            if_no_migration_user: step.spec.if_no_migration_user,
            dev_mode: run.options.is_dev(),
            dry_complete: run.projector.forces_run(),
            has_body: step.has_body(),
            role_step_only: step.role_step_only(),
            has_teardown: step.descriptor.teardown.is_some() || managed_users,
            any_migration_found,
            any_dev_hook_found,
            managed_users,
            migration_role_exists: step.migration_role_exists,
            host_name: &run.options.host_name,
        });
        debug!("{} {}: {}", name, kind, decision);

        let reason = match decision {
            Decision::Skip(reason) => return Ok(HookOutcome::Skipped(reason)),
            Decision::Run(reason) => reason,
        };

        let context = HookContext {
            migration: name.to_string(),
            hook: kind,
            roles: step.roles.clone(),
            mode: run.options.mode,
            managed_users,
        };

        let outcome = match run.projector.projection() {
            Projection::Describe => {
                let as_role = (managed_users && !kind.runs_as_connection_identity()).then_some(step.roles.migration.as_str());
                run.projector
                    .describe(name, kind, step.descriptor.hook(kind).map(|b| b.as_ref()), as_role);
                return Ok(HookOutcome::Projected(reason));
            }
            Projection::MarkComplete => HookOutcome::MarkedComplete,
            Projection::Execute => {
                info!("Running {} hook of '{}' ({})", kind, name, reason);
                self.execute(run, session, step, &context).await?;
                HookOutcome::Executed(reason)
            }
        };

        if step.spec.remember_change && !step.role_step_only() {
            self.remember(run, session, step, record.as_ref()).await?;
        }
        Ok(outcome)
    }

    /// Run a hook body along with the managed role steps around it
    async fn execute(
        &self,
        run: &RunContext<'_>,
        session: &dyn Session,
        step: &HookStep<'_>,
        context: &HookContext,
    ) -> ExecutionResult<()> {
        let name = step.descriptor.name.as_str();
        let kind = step.spec.kind;
        let managed = context.managed_users;
        let body = step.descriptor.hook(kind);

        match kind {
            HookKind::Cluster => {
                if managed {
                    self.roles
                        .ensure_roles(session, step.roles, run.options.is_dev())
                        .await
                        .map_err(|e| role_error(name, kind, e))?;
                }
                run_body(body, session, context).await
            }
            HookKind::Teardown => {
                run_body(body, session, context).await?;
                if managed && run.options.is_dev() {
                    self.roles
                        .teardown_roles(session, step.roles)
                        .await
                        .map_err(|e| role_error(name, kind, e))?;
                }
                Ok(())
            }
            HookKind::Action | HookKind::Always => {
                if !managed {
                    return run_body(body, session, context).await;
                }

                self.roles
                    .activate(session, step.roles)
                    .await
                    .map_err(|e| role_error(name, kind, e))?;
                let result = run_body(body, session, context).await;
                let reset = self.roles.deactivate(session).await;

                match (result, reset) {
                    (Err(e), Err(reset_err)) => {
                        warn!("Failed to reset session identity after {} hook failure: {}", kind, reset_err);
                        Err(e)
                    }
                    (Err(e), Ok(())) => Err(e),
                    (Ok(()), reset) => reset.map_err(|e| role_error(name, kind, e)),
                }
            }
        }
    }

    /// Write bookkeeping for a hook that ran or was marked complete
    async fn remember(
        &self,
        run: &RunContext<'_>,
        session: &dyn Session,
        step: &HookStep<'_>,
        record: Option<&MigrationHookRecord>,
    ) -> ExecutionResult<()> {
        let name = step.descriptor.name.as_str();
        let filename = step
            .path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned());

        self.store
            .record_migration(session, name, filename.as_deref(), step.descriptor.description.as_deref())
            .await?;

        if record.is_some_and(MigrationHookRecord::is_legacy) {
            self.preserve_legacy_history(session, name).await?;
        }

        self.store
            .record_hook(
                session,
                step.spec.kind,
                name,
                run.options.is_dev(),
                &run.options.host_name,
                tiller_core::BOOKKEEPING_REVISION,
            )
            .await?;
        Ok(())
    }

    /// Persist synthesized legacy records before the first real ledger row
    /// ends the legacy rule for this migration
    async fn preserve_legacy_history(&self, session: &dyn Session, name: &str) -> ExecutionResult<()> {
        let mut legacy = Vec::new();
        for kind in LEGACY_HOOKS {
            if let Some(record) = self.store.find_hook(session, name, *kind).await? {
                if record.is_legacy() {
                    legacy.push(record);
                }
            }
        }

        for record in legacy {
            self.store
                .record_hook(session, record.hook, name, record.dev, &record.hostname, record.revision)
                .await?;
        }
        Ok(())
    }
}

/// One hook of one migration within a hook-group
struct HookStep<'a> {
    descriptor: &'a MigrationDescriptor,
    path: &'a Path,
    spec: &'a HookSpec,
    roles: &'a RoleNames,
    migration_role_exists: bool,
}

impl HookStep<'_> {
    /// Managed users give cluster and teardown an implicit role step
    fn has_body(&self) -> bool {
        self.descriptor.hook(self.spec.kind).is_some() || self.role_step_only()
    }

    fn role_step_only(&self) -> bool {
        self.descriptor.hook(self.spec.kind).is_none()
            && self.descriptor.managed_users()
            && matches!(self.spec.kind, HookKind::Cluster | HookKind::Teardown)
    }
}

fn validate_options(options: &RunOptions) -> ExecutionResult<()> {
    if options.teardown_only && !options.is_dev() {
        return Err(ExecutionError::Configuration(
            "teardown is only available in development mode".to_string(),
        ));
    }
    if options.host_name.trim().is_empty() {
        return Err(ExecutionError::Configuration("host name must not be empty".to_string()));
    }
    Ok(())
}

async fn run_body(
    body: Option<&Arc<dyn HookBody>>,
    session: &dyn Session,
    context: &HookContext,
) -> ExecutionResult<()> {
    let Some(body) = body else {
        return Ok(());
    };
    body.run(session, context)
        .await
        .map_err(|e| ExecutionError::hook_failed(&context.migration, context.hook, e))
}

fn role_error(migration: &str, hook: HookKind, err: StorageError) -> ExecutionError {
    match err {
        StorageError::RoleConflict { role } => ExecutionError::RoleConflict { role },
        other => ExecutionError::hook_failed(migration, hook, other),
    }
}

/// Close the session, keeping the step's own result when both fail
async fn finish_session<T>(session: Box<dyn Session>, result: ExecutionResult<T>) -> ExecutionResult<T> {
    let closed = session.close().await;
    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e.into()),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close_err)) => {
            warn!("Failed to close session after error: {}", close_err);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiller_core::RunMode;

    #[test]
    fn test_teardown_requires_development_mode() {
        let options = RunOptions::new(RunMode::Production, "h").with_teardown_only(true);
        let err = validate_options(&options).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_empty_host_name_is_rejected() {
        assert!(validate_options(&RunOptions::new(RunMode::Production, " ")).is_err());
        assert!(validate_options(&RunOptions::new(RunMode::Development, "h")).is_ok());
    }
}
