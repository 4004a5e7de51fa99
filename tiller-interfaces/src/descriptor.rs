//! Loaded migration descriptors

use std::fmt;
use std::sync::Arc;
use tiller_core::{normalize_description, HookKind};

use crate::hook::HookBody;

/// An in-memory migration, as produced by a [`crate::MigrationLoader`].
///
/// Descriptors are immutable once loaded and are loaded afresh for every
/// phase.
#[derive(Clone, Default)]
pub struct MigrationDescriptor {
    /// Unique identity key of the migration
    pub name: String,
    pub description: Option<String>,
    pub cluster: Option<Arc<dyn HookBody>>,
    pub action: Option<Arc<dyn HookBody>>,
    pub always: Option<Arc<dyn HookBody>>,
    pub teardown: Option<Arc<dyn HookBody>>,
    /// Automatic role lifecycle; absent means enabled
    pub managed_users: Option<bool>,
}

impl MigrationDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the description, normalizing its lines
    pub fn with_description(mut self, description: &str) -> Self {
        let normalized = normalize_description(description);
        self.description = if normalized.is_empty() { None } else { Some(normalized) };
        self
    }

    pub fn with_hook(mut self, kind: HookKind, body: Arc<dyn HookBody>) -> Self {
        match kind {
            HookKind::Cluster => self.cluster = Some(body),
            HookKind::Action => self.action = Some(body),
            HookKind::Always => self.always = Some(body),
            HookKind::Teardown => self.teardown = Some(body),
        }
        self
    }

    pub fn with_managed_users(mut self, managed_users: bool) -> Self {
        self.managed_users = Some(managed_users);
        self
    }

    /// The body attached to a hook kind, if any
    pub fn hook(&self, kind: HookKind) -> Option<&Arc<dyn HookBody>> {
        match kind {
            HookKind::Cluster => self.cluster.as_ref(),
            HookKind::Action => self.action.as_ref(),
            HookKind::Always => self.always.as_ref(),
            HookKind::Teardown => self.teardown.as_ref(),
        }
    }

    /// Whether the generated roles are managed for this migration
    pub fn managed_users(&self) -> bool {
        self.managed_users != Some(false)
    }

    /// Hook kinds with an attached body
    pub fn defined_hooks(&self) -> Vec<HookKind> {
        HookKind::all().iter().copied().filter(|kind| self.hook(*kind).is_some()).collect()
    }
}

impl fmt::Debug for MigrationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("hooks", &self.defined_hooks())
            .field("managed_users", &self.managed_users())
            .finish()
    }
}
