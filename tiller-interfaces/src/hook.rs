//! Hook body interface

use async_trait::async_trait;
use thiserror::Error;
use tiller_core::{HookKind, RoleNames, RunMode};

use crate::session::{Session, SessionError};

/// Errors raised by a hook body
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HookError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("{0}")]
    Failed(String),
}

/// Context handed to every hook body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookContext {
    pub migration: String,
    pub hook: HookKind,
    pub roles: RoleNames,
    pub mode: RunMode,
    pub managed_users: bool,
}

/// The executable body of a lifecycle hook
#[async_trait]
pub trait HookBody: Send + Sync {
    /// Run the hook against the session
    async fn run(&self, session: &dyn Session, context: &HookContext) -> Result<(), HookError>;

    /// Human-readable projection of what the hook would do, shown in dry runs
    fn describe(&self) -> Option<String> {
        None
    }
}
