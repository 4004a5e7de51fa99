//! Deterministic generated role names
//!
//! Every migration owns two server-level roles: a migration role that runs
//! hook bodies (and therefore owns the objects they create) and a restricted
//! service role meant to be granted access. Both names are derived from the
//! migration name alone so they can be recomputed on every run without any
//! persisted state.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Prefix of the role that executes hook bodies
pub const MIGRATION_ROLE_PREFIX: &str = "tiller_migration_";

/// Prefix of the restricted service role
pub const SERVICE_ROLE_PREFIX: &str = "tiller_service_";

/// PostgreSQL truncates identifiers longer than this many bytes
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

const DIGEST_SUFFIX_LENGTH: usize = 8;

/// The pair of generated role names for one migration
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleNames {
    /// Superuser-equivalent role used while running hook bodies
    pub migration: String,
    /// Restricted role without inheritance or special capabilities
    pub service: String,
}

impl RoleNames {
    /// Derive both role names from a migration name
    pub fn for_migration(migration_name: &str) -> Self {
        let normalized = normalize_role_suffix(migration_name);
        Self {
            migration: compose(MIGRATION_ROLE_PREFIX, &normalized),
            service: compose(SERVICE_ROLE_PREFIX, &normalized),
        }
    }

    /// Both names, migration role first
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        [self.migration.as_str(), self.service.as_str()].into_iter()
    }
}

/// Normalize a migration name into the role name suffix.
///
/// Embedded newlines are stripped, the result is trimmed and lowercased, and
/// hyphens and whitespace become underscores.
pub fn normalize_role_suffix(migration_name: &str) -> String {
    let stripped: String = migration_name.chars().filter(|c| *c != '\n' && *c != '\r').collect();

    stripped
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c.is_whitespace() { '_' } else { c })
        .collect()
}

fn compose(prefix: &str, normalized: &str) -> String {
    let full = format!("{}{}", prefix, normalized);
    if full.len() <= MAX_IDENTIFIER_LENGTH {
        return full;
    }

    // Distinct long names must not collapse onto the same truncated identifier
    let digest = hex::encode(Sha256::digest(normalized.as_bytes()));
    let suffix = &digest[..DIGEST_SUFFIX_LENGTH];

    let mut cut = MAX_IDENTIFIER_LENGTH - DIGEST_SUFFIX_LENGTH - 1;
    while !full.is_char_boundary(cut) {
        cut -= 1;
    }

    format!("{}_{}", &full[..cut], suffix)
}
