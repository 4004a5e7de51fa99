//! # Tiller Interfaces
//!
//! Capability traits consumed by the migration engine.
//!
//! The engine never talks to a database driver, a restore tool or a
//! migration file format directly. Each of those collaborators is expressed
//! here as a trait so that the scheduler can be driven by PostgreSQL in
//! production and by an in-memory backend in tests.
//!
//! ## Main Interfaces
//!
//! - [`Session`] - A single database session that runs statements
//! - [`SessionProvider`] - Opens fresh sessions and recreates the target database
//! - [`HookBody`] - The executable body of a migration lifecycle hook
//! - [`MigrationLoader`] - Produces a [`MigrationDescriptor`] from a path
//! - [`RestoreService`] - Restores a backup into the target database

pub mod descriptor;
pub mod hook;
pub mod loader;
pub mod restore;
pub mod session;

// Re-export commonly used types
pub use descriptor::MigrationDescriptor;
pub use hook::{HookBody, HookContext, HookError};
pub use loader::{LoadError, MigrationLoader};
pub use restore::{RestoreError, RestoreOutcome, RestoreService};
pub use session::{Row, Session, SessionError, SessionProvider, SessionResult};
