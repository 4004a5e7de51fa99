//! Backup restore through `pg_restore`

use async_trait::async_trait;
use std::ffi::OsString;
use tiller_core::{RestoreRequest, RestoreScope};
use tiller_interfaces::{RestoreError, RestoreOutcome, RestoreService};
use tokio::process::Command;
use tracing::{info, warn};

/// Runs `pg_restore` against the target database
#[derive(Debug, Clone)]
pub struct PgRestore {
    program: String,
}

impl Default for PgRestore {
    fn default() -> Self {
        Self::new("pg_restore")
    }
}

impl PgRestore {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }

    /// Command line arguments for a request
    pub fn build_args(request: &RestoreRequest, target: &str) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["--dbname".into(), target.into()];
        match request.scope {
            RestoreScope::Full => {}
            RestoreScope::SchemaOnly => args.push("--schema-only".into()),
            RestoreScope::DataOnly => args.push("--data-only".into()),
        }
        args.push(request.file.clone().into_os_string());
        args
    }
}

#[async_trait]
impl RestoreService for PgRestore {
    async fn restore(&self, request: &RestoreRequest, target: &str) -> RestoreOutcome {
        info!("Restoring {} with {}", request.file.display(), self.program);

        let output = match Command::new(&self.program)
            .args(Self::build_args(request, target))
            .output()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                return RestoreOutcome::Failed(RestoreError::Spawn {
                    program: self.program.clone(),
                    message: e.to_string(),
                })
            }
        };

        if output.status.success() {
            RestoreOutcome::Restored
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!("{} failed: {}", self.program, stderr);
            RestoreOutcome::Failed(RestoreError::Exited {
                status: output.status.to_string(),
                stderr,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restore_args_by_scope() {
        let request = RestoreRequest::new("/backups/app.dump");
        assert_eq!(
            PgRestore::build_args(&request, "postgres://db/app"),
            vec![
                OsString::from("--dbname"),
                OsString::from("postgres://db/app"),
                OsString::from("/backups/app.dump")
            ]
        );

        let schema_only = request.clone().with_scope(RestoreScope::SchemaOnly);
        assert!(PgRestore::build_args(&schema_only, "t").contains(&OsString::from("--schema-only")));

        let data_only = request.with_scope(RestoreScope::DataOnly);
        assert!(PgRestore::build_args(&data_only, "t").contains(&OsString::from("--data-only")));
    }

    #[tokio::test]
    async fn test_missing_program_is_a_failed_outcome() {
        let restore = PgRestore::new("tiller-no-such-restore-binary");
        let outcome = restore.restore(&RestoreRequest::new("x.dump"), "postgres://db/app").await;
        assert!(matches!(outcome, RestoreOutcome::Failed(RestoreError::Spawn { .. })));
    }
}
