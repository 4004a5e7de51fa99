//! Bookkeeping storage and role lifecycle for Tiller
//!
//! This crate owns everything the engine persists or mutates on the
//! database server outside of hook bodies:
//!
//! - the two bookkeeping tables (migration registry and hook ledger)
//! - the generated per-migration roles
//! - the PostgreSQL session transport and backup restore (feature `postgres`)

pub mod error;
pub mod roles;
pub mod state;

// PostgreSQL implementation (feature-gated)
#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export core types for convenience
pub use error::{StorageError, StorageResult};
pub use roles::{RoleManager, SqlRoleManager};
pub use state::{LegacyPolicy, PurgeReport, SqlStateStore, StateStore, DEFAULT_BOOKKEEPING_SCHEMA};

#[cfg(feature = "postgres")]
pub use postgres::{PgRestore, PgSession, PgSessionProvider, PgSettings, SearchPath};
