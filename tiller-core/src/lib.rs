//! Core domain models and types for Tiller
//!
//! This crate contains the fundamental types used throughout the
//! migration engine. It has minimal dependencies and defines the
//! domain language of the application: hook kinds, run options,
//! generated role names and the persisted bookkeeping records.

pub mod error;
pub mod hook;
pub mod options;
pub mod records;
pub mod roles;
pub mod text;

// Re-export commonly used types at the crate root
pub use error::{CoreError, Result};
pub use hook::HookKind;
pub use options::{DryRunMode, RestoreRequest, RestoreScope, RunMode, RunOptions};
pub use records::{
    default_legacy_cutover, legacy_hook_record, parse_timestamp, MigrationHookRecord, MigrationRecord,
    BOOKKEEPING_REVISION, DEFAULT_LEGACY_CUTOVER, LEGACY_HOOKS, LEGACY_REVISION,
};
pub use roles::RoleNames;
pub use text::{normalize_description, quote_identifier};
