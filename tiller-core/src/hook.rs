//! Lifecycle hook kinds a migration may define

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// A named lifecycle callback of a migration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookKind {
    /// Server-level objects (roles, extensions), established once per host
    Cluster,
    /// The per-database schema or data change
    Action,
    /// Re-executed on every run after all actions have been applied
    Always,
    /// Development-mode cleanup of everything the migration created
    Teardown,
}

impl HookKind {
    /// Get the string representation stored in the hook ledger
    pub fn as_str(&self) -> &'static str {
        match self {
            HookKind::Cluster => "cluster",
            HookKind::Action => "action",
            HookKind::Always => "always",
            HookKind::Teardown => "teardown",
        }
    }

    /// Get all hook kinds
    pub fn all() -> &'static [HookKind] {
        &[HookKind::Cluster, HookKind::Action, HookKind::Always, HookKind::Teardown]
    }

    /// Whether the hook body runs under the ambient connection identity
    /// rather than the generated migration role.
    pub fn runs_as_connection_identity(&self) -> bool {
        matches!(self, HookKind::Cluster | HookKind::Teardown)
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for HookKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cluster" => Ok(HookKind::Cluster),
            "action" => Ok(HookKind::Action),
            "always" => Ok(HookKind::Always),
            "teardown" => Ok(HookKind::Teardown),
            _ => Err(CoreError::InvalidHookKind(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_kind_parsing() {
        assert_eq!("cluster".parse::<HookKind>().unwrap(), HookKind::Cluster);
        assert_eq!(" Action ".parse::<HookKind>().unwrap(), HookKind::Action);
        assert!("rollback".parse::<HookKind>().is_err());

        for kind in HookKind::all() {
            assert_eq!(kind.as_str().parse::<HookKind>().unwrap(), *kind);
        }
    }

    #[test]
    fn test_connection_identity_hooks() {
        assert!(HookKind::Cluster.runs_as_connection_identity());
        assert!(HookKind::Teardown.runs_as_connection_identity());
        assert!(!HookKind::Action.runs_as_connection_identity());
        assert!(!HookKind::Always.runs_as_connection_identity());
    }
}
