//! Tiller Execution Engine
//!
//! This crate decides which migration hooks run and runs them:
//!
//! - [`decide`] - the hook decision engine, returning a tagged reason
//! - [`build_plan`] - the fixed phase list for a run mode
//! - [`MigrationEngine`] - the phase scheduler
//! - [`DryRunProjector`] - dry and dry-complete interception
//! - [`SqlDirectoryLoader`] / [`StaticMigrationLoader`] - migration loaders

pub mod decision;
pub mod error;
pub mod loader;
pub mod plan;
pub mod projector;
pub mod scheduler;
pub mod sql_hook;
pub mod summary;

// Re-export main types
pub use decision::{decide, Decision, DecisionInput, RunReason, SkipReason};
pub use error::{ExecutionError, ExecutionResult};
pub use loader::{SqlDirectoryLoader, StaticMigrationLoader, MIGRATION_FILE};
pub use plan::{build_plan, HookGroup, HookSpec, Phase};
pub use projector::{DryRunProjector, Projection};
pub use scheduler::MigrationEngine;
pub use sql_hook::SqlHook;
pub use summary::{HookOutcome, HookReport, RunSummary};
